//! Query path: turn a natural-language query into ranked line ranges.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::index_state::{CodeChunk, IndexState};
use crate::config::clamp_top_k;
use crate::error::IndexResult;

/// The `top_k` chunks most similar to `query`, best first.
///
/// `top_k` is clamped into the supported range. Hits whose document cannot be
/// mapped back to a chunk are logged and skipped, so fewer than `top_k`
/// chunks may come back. Cancellation stops result assembly early and returns
/// what was collected so far.
pub async fn find_top_chunks(
    index: &IndexState,
    query: &str,
    top_k: usize,
    cancel: &CancellationToken,
) -> IndexResult<Vec<CodeChunk>> {
    let top_k = clamp_top_k(top_k);
    if index.store.is_empty() {
        return Ok(Vec::new());
    }

    let hits = index.store.similarity_search(query, top_k).await?;
    debug!("Query matched {} document(s)", hits.len());

    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        if cancel.is_cancelled() {
            debug!("Query cancelled after {} result(s)", results.len());
            break;
        }
        match CodeChunk::try_from(&hit.document) {
            Ok(chunk) => results.push(chunk),
            Err(e) => warn!("Skipping unusable search hit: {}", e),
        }
    }
    Ok(results)
}
