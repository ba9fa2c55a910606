use std::path::Path;

use super::index_state::CodeChunk;
use crate::config::IndexConfig;

/// Extensions of files that are never text worth embedding
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "tiff", "psd", "pdf", "zip", "gz",
    "tgz", "bz2", "xz", "7z", "rar", "tar", "jar", "war", "class", "exe", "dll", "so", "dylib",
    "a", "lib", "o", "obj", "bin", "dat", "wasm", "pyc", "pyo", "mp3", "mp4", "mov", "avi", "wav",
    "flac", "ogg", "webm", "woff", "woff2", "ttf", "otf", "eot", "sqlite", "db", "lock", "map",
];

/// Line-window chunking parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Lines per chunk
    pub chunk_lines: usize,
    /// Lines repeated at the start of the next chunk
    pub overlap_lines: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_lines: usize, overlap_lines: usize) -> Self {
        Self {
            chunk_lines,
            overlap_lines,
        }
    }

    /// Distance between the first lines of consecutive windows
    pub fn step(&self) -> usize {
        self.chunk_lines.saturating_sub(self.overlap_lines).max(1)
    }
}

impl From<&IndexConfig> for ChunkingConfig {
    fn from(config: &IndexConfig) -> Self {
        let config = config.clamped();
        Self::new(config.chunk_lines, config.chunk_overlap_lines)
    }
}

/// Splits file text into overlapping line windows
#[derive(Debug, Clone)]
pub struct ChunkingStrategy {
    config: ChunkingConfig,
}

impl ChunkingStrategy {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Chunk one file's content. See [`chunk_text`].
    pub fn chunk_content(&self, path: &Path, content: &str) -> Vec<CodeChunk> {
        let chunks = chunk_text(path, content, self.config.chunk_lines, self.config.overlap_lines);
        tracing::debug!(
            "Chunked {} into {} chunks ({} lines, step {})",
            path.display(),
            chunks.len(),
            self.config.chunk_lines,
            self.config.step()
        );
        chunks
    }

    /// Check if a file should be indexed based on its path
    pub fn should_index_file(&self, path: &Path) -> bool {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => !BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
            None => true,
        }
    }
}

/// Split `text` into windows of `chunk_lines` lines that advance by
/// `max(1, chunk_lines - overlap_lines)`.
///
/// Line endings are normalized first. Windows containing only whitespace are
/// dropped, and the last window is clipped at the final line. Ranges are
/// 0-based and inclusive.
pub fn chunk_text(
    path: &Path,
    text: &str,
    chunk_lines: usize,
    overlap_lines: usize,
) -> Vec<CodeChunk> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let chunk_lines = chunk_lines.max(1);
    let step = ChunkingConfig::new(chunk_lines, overlap_lines).step();
    let last_line = lines.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_lines - 1).min(last_line);
        let window = lines[start..=end].join("\n");
        if !window.trim().is_empty() {
            chunks.push(CodeChunk {
                path: path.to_path_buf(),
                start_line0: start,
                end_line0: end,
                text: window,
            });
        }
        if end == last_line {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn numbered_lines(count: usize) -> String {
        (0..count).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
    }

    fn ranges(chunks: &[CodeChunk]) -> Vec<(usize, usize)> {
        chunks.iter().map(|c| (c.start_line0, c.end_line0)).collect()
    }

    #[test]
    fn test_ten_line_file() {
        let path = PathBuf::from("/w/ten.txt");
        let chunks = chunk_text(&path, &numbered_lines(10), 5, 1);
        assert_eq!(ranges(&chunks), vec![(0, 4), (4, 8), (8, 9)]);
        assert_eq!(chunks[2].text, "line 8\nline 9");

        // A trailing newline does not add a phantom line
        let with_newline = format!("{}\n", numbered_lines(10));
        assert_eq!(ranges(&chunk_text(&path, &with_newline, 5, 1)), vec![(0, 4), (4, 8), (8, 9)]);
    }

    #[test]
    fn test_coverage_and_overlap() {
        let path = PathBuf::from("/w/big.rs");
        for (total, size, overlap) in [(250, 80, 20), (81, 80, 20), (400, 37, 0), (57, 20, 19)] {
            let chunks = chunk_text(&path, &numbered_lines(total), size, overlap);

            assert_eq!(chunks.first().unwrap().start_line0, 0);
            assert_eq!(chunks.last().unwrap().end_line0, total - 1);
            for pair in chunks.windows(2) {
                assert!(pair[0].start_line0 <= pair[0].end_line0);
                // No gaps, and exactly `overlap` shared lines between neighbours
                assert_eq!(pair[0].end_line0 + 1 - pair[1].start_line0, overlap);
            }
        }
    }

    #[test]
    fn test_line_endings_are_normalized() {
        let path = PathBuf::from("/w/dos.txt");
        let chunks = chunk_text(&path, "a\r\nb\rc\n", 20, 0);
        assert_eq!(ranges(&chunks), vec![(0, 2)]);
        assert_eq!(chunks[0].text, "a\nb\nc");
    }

    #[test]
    fn test_blank_windows_are_skipped() {
        let path = PathBuf::from("/w/sparse.txt");
        let mut text = vec!["fn a() {}".to_string()];
        text.extend(std::iter::repeat_n(String::new(), 10));
        text.push("fn b() {}".to_string());

        let chunks = chunk_text(&path, &text.join("\n"), 4, 0);
        // Windows [4,7] contain only blank lines
        assert_eq!(ranges(&chunks), vec![(0, 3), (8, 11)]);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let path = PathBuf::from("/w/empty.txt");
        assert!(chunk_text(&path, "", 80, 20).is_empty());
        assert!(chunk_text(&path, "   \n\t\n", 80, 20).is_empty());
    }

    #[test]
    fn test_overlap_not_smaller_than_window_still_advances() {
        let path = PathBuf::from("/w/x.txt");
        let chunks = chunk_text(&path, &numbered_lines(4), 2, 5);
        assert_eq!(ranges(&chunks), vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_strategy_uses_clamped_config() {
        let config = IndexConfig::default().with_chunk_lines(3).with_chunk_overlap_lines(1);
        let strategy = ChunkingStrategy::new(ChunkingConfig::from(&config));
        assert_eq!(strategy.config(), ChunkingConfig::new(20, 1));
    }

    #[test]
    fn test_should_index_file() {
        let strategy = ChunkingStrategy::new(ChunkingConfig::new(80, 20));

        assert!(strategy.should_index_file(Path::new("src/lib.rs")));
        assert!(strategy.should_index_file(Path::new("README.md")));
        assert!(strategy.should_index_file(Path::new("Makefile")));
        assert!(strategy.should_index_file(Path::new(".env.example")));

        assert!(!strategy.should_index_file(Path::new("binary.exe")));
        assert!(!strategy.should_index_file(Path::new("image.PNG")));
        assert!(!strategy.should_index_file(Path::new("Cargo.lock")));
    }
}
