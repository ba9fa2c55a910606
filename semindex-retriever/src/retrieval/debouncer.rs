//! Coalesces bursts of file change notifications into single reindex calls.
//!
//! Every notification restarts the quiet-period timer. When the timer runs
//! out, the union of all paths seen since the last flush is handed to the
//! [`ChangeSink`] in one call. Nothing is flushed while changes keep arriving.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Receiver of debounced change sets
#[async_trait]
pub trait ChangeSink: Send + Sync {
    async fn files_changed(&self, paths: Vec<PathBuf>);
}

#[derive(Debug, Clone, Copy)]
pub struct ReindexDebouncer {
    quiet_period: Duration,
}

impl ReindexDebouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self { quiet_period }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Pump `events` into `sink` until the channel closes or `cancel` fires.
    ///
    /// Pending paths are flushed when the channel closes, but dropped on
    /// cancellation. The sink is awaited inline, so changes arriving during a
    /// reindex wait in the channel for the next round.
    pub async fn run<S>(
        &self,
        events: flume::Receiver<PathBuf>,
        sink: Arc<S>,
        cancel: CancellationToken,
    ) where
        S: ChangeSink + ?Sized,
    {
        let mut pending: HashSet<PathBuf> = HashSet::new();

        loop {
            if pending.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv_async() => match event {
                        Ok(path) => {
                            pending.insert(path);
                        }
                        Err(_) => break,
                    },
                }
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                event = tokio::time::timeout(self.quiet_period, events.recv_async()) => match event {
                    Ok(Ok(path)) => {
                        pending.insert(path);
                    }
                    Ok(Err(_)) => {
                        Self::flush(&mut pending, sink.as_ref()).await;
                        break;
                    }
                    Err(_) => Self::flush(&mut pending, sink.as_ref()).await,
                },
            }
        }

        debug!("Reindex debouncer stopped");
    }

    async fn flush<S: ChangeSink + ?Sized>(pending: &mut HashSet<PathBuf>, sink: &S) {
        if pending.is_empty() {
            return;
        }
        let paths: Vec<PathBuf> = pending.drain().sorted().collect();
        debug!("Flushing {} changed path(s)", paths.len());
        sink.files_changed(paths).await;
    }
}
