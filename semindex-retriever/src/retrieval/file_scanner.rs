//! Workspace file enumeration.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use super::chunking_strategy::ChunkingStrategy;
use crate::error::{IndexError, IndexResult};
use crate::storage::CACHE_DIR_NAME;

/// Directories that never contain indexable sources
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "bower_components",
    "target",
    "dist",
    "build",
    "out",
    ".next",
    "__pycache__",
    ".venv",
    "venv",
    ".gradle",
    CACHE_DIR_NAME,
];

/// Whether any component of `path` is an excluded directory.
///
/// Pass paths relative to a workspace root; directories above the root do
/// not count.
pub fn is_excluded_path(path: &Path) -> bool {
    path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
    })
}

/// `path` relative to the first root that contains it
pub fn relative_to_roots<'a>(roots: &[PathBuf], path: &'a Path) -> Option<&'a Path> {
    roots.iter().find_map(|root| path.strip_prefix(root).ok())
}

/// Finds candidate files under a set of workspace roots
#[derive(Debug, Clone)]
pub struct FileScanner {
    roots: Vec<PathBuf>,
    respect_gitignore: bool,
    strategy: ChunkingStrategy,
}

impl FileScanner {
    pub fn new(roots: Vec<PathBuf>, respect_gitignore: bool, strategy: ChunkingStrategy) -> Self {
        Self {
            roots,
            respect_gitignore,
            strategy,
        }
    }

    /// Whether a single path would be picked up by [`FileScanner::scan`].
    /// Paths outside every root are rejected. Gitignore rules are only
    /// applied by the walk.
    pub fn accepts(&self, path: &Path) -> bool {
        relative_to_roots(&self.roots, path).is_some_and(|relative| !is_excluded_path(relative))
            && self.strategy.should_index_file(path)
    }

    /// List indexable files under every root, sorted.
    ///
    /// The walk checks `cancel` between entries and returns what it has found
    /// so far once cancellation is requested.
    pub async fn scan(&self, cancel: &CancellationToken) -> IndexResult<Vec<PathBuf>> {
        self.walk(self.roots.clone(), cancel).await
    }

    /// List indexable files below `dir`, which must lie inside a root.
    ///
    /// Used when a whole directory appears at once, e.g. after a rename.
    pub async fn scan_within(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> IndexResult<Vec<PathBuf>> {
        match relative_to_roots(&self.roots, dir) {
            Some(relative) if !is_excluded_path(relative) => {}
            _ => return Ok(Vec::new()),
        }
        let files = self.walk(vec![dir.to_path_buf()], cancel).await?;
        Ok(files.into_iter().filter(|path| self.accepts(path)).collect())
    }

    async fn walk(&self, dirs: Vec<PathBuf>, cancel: &CancellationToken) -> IndexResult<Vec<PathBuf>> {
        let scanner = self.clone();
        let cancel = cancel.clone();
        let first = dirs.first().cloned().unwrap_or_default();
        tokio::task::spawn_blocking(move || scanner.walk_blocking(&dirs, &cancel))
            .await
            .map_err(|e| IndexError::Enumeration {
                root: first,
                message: e.to_string(),
            })?
    }

    fn walk_blocking(&self, dirs: &[PathBuf], cancel: &CancellationToken) -> IndexResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for root in dirs {
            if !root.is_dir() {
                return Err(IndexError::Enumeration {
                    root: root.clone(),
                    message: "not a directory".to_string(),
                });
            }

            let walker = WalkBuilder::new(root)
                .hidden(false)
                .follow_links(false)
                .require_git(false)
                .git_ignore(self.respect_gitignore)
                .git_global(self.respect_gitignore)
                .git_exclude(self.respect_gitignore)
                .ignore(self.respect_gitignore)
                .filter_entry(|entry| {
                    !(entry.depth() > 0
                        && entry.file_type().is_some_and(|t| t.is_dir())
                        && entry
                            .file_name()
                            .to_str()
                            .is_some_and(|name| EXCLUDED_DIRS.contains(&name)))
                })
                .build();

            for entry in walker {
                if cancel.is_cancelled() {
                    tracing::info!("File enumeration cancelled after {} files", files.len());
                    return Ok(files);
                }
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::debug!("Skipping unreadable entry: {}", e);
                        continue;
                    }
                };
                if entry.file_type().is_some_and(|t| t.is_file())
                    && self.strategy.should_index_file(entry.path())
                {
                    files.push(entry.into_path());
                }
            }
        }

        files.sort();
        files.dedup();
        tracing::debug!("Enumerated {} candidate files", files.len());
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::chunking_strategy::ChunkingConfig;
    use tempfile::tempdir;

    fn scanner(root: &Path, respect_gitignore: bool) -> FileScanner {
        FileScanner::new(
            vec![root.to_path_buf()],
            respect_gitignore,
            ChunkingStrategy::new(ChunkingConfig::new(80, 20)),
        )
    }

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[tokio::test]
    async fn test_scan_skips_excluded_and_binary_files() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        write(root, "src/lib.rs", "pub fn a() {}");
        write(root, "README.md", "# readme");
        write(root, ".github/workflows/ci.yml", "on: push");
        write(root, ".git/config", "[core]");
        write(root, "node_modules/pkg/index.js", "module.exports = 1");
        write(root, "target/debug/out.rs", "fn x() {}");
        write(root, ".semindex/index.json", "{}");
        write(root, "logo.png", "binary");

        let files = scanner(root, true).scan(&CancellationToken::new()).await?;
        assert_eq!(
            relative(root, &files),
            vec![".github/workflows/ci.yml", "README.md", "src/lib.rs"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_gitignore_is_optional() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        write(root, ".gitignore", "generated/\n");
        write(root, "generated/api.rs", "fn generated() {}");
        write(root, "main.rs", "fn main() {}");

        let honored = scanner(root, true).scan(&CancellationToken::new()).await?;
        assert_eq!(relative(root, &honored), vec![".gitignore", "main.rs"]);

        let all = scanner(root, false).scan(&CancellationToken::new()).await?;
        assert_eq!(
            relative(root, &all),
            vec![".gitignore", "generated/api.rs", "main.rs"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_scan_stops_early() -> anyhow::Result<()> {
        let dir = tempdir()?;
        for i in 0..20 {
            write(dir.path(), &format!("f{i}.txt"), "x");
        }
        let cancel = CancellationToken::new();
        cancel.cancel();

        let files = scanner(dir.path(), true).scan(&cancel).await?;
        assert!(files.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let result = scanner(&dir.path().join("nope"), true)
            .scan(&CancellationToken::new())
            .await;
        assert!(matches!(result, Err(IndexError::Enumeration { .. })));
    }

    #[test]
    fn test_is_excluded_path() {
        assert!(is_excluded_path(Path::new("/w/.git/HEAD")));
        assert!(is_excluded_path(Path::new("/w/.semindex/index.json")));
        assert!(is_excluded_path(Path::new("/w/web/node_modules/x.js")));
        assert!(!is_excluded_path(Path::new("/w/src/targets.rs")));
    }

    #[test]
    fn test_accepts_ignores_directories_above_root() {
        let scanner = scanner(Path::new("/home/dev/build/project"), true);
        assert!(scanner.accepts(Path::new("/home/dev/build/project/src/lib.rs")));
        assert!(!scanner.accepts(Path::new("/home/dev/build/project/target/debug/x.rs")));
        assert!(!scanner.accepts(Path::new("/home/dev/build/project/logo.png")));
        assert!(!scanner.accepts(Path::new("/elsewhere/src/lib.rs")));
    }

    #[tokio::test]
    async fn test_root_inside_excluded_name_is_walked() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("build");
        write(&root, "src/lib.rs", "pub fn a() {}");
        write(&root, "target/out.rs", "fn generated() {}");

        let files = scanner(&root, true)
            .scan(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(files, vec![root.join("src/lib.rs")]);
    }

    #[tokio::test]
    async fn test_scan_within_lists_a_subdirectory() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        write(root, "lib/a.rs", "pub fn a() {}");
        write(root, "lib/nested/b.rs", "pub fn b() {}");
        write(root, "lib/target/out.rs", "fn generated() {}");
        write(root, "other.rs", "fn other() {}");
        let scanner = scanner(root, true);
        let cancel = CancellationToken::new();

        let files = scanner.scan_within(&root.join("lib"), &cancel).await?;
        assert_eq!(relative(root, &files), vec!["lib/a.rs", "lib/nested/b.rs"]);

        assert!(scanner.scan_within(&root.join("lib/target"), &cancel).await?.is_empty());
        let outside = tempdir()?;
        write(outside.path(), "x.rs", "fn x() {}");
        assert!(scanner.scan_within(outside.path(), &cancel).await?.is_empty());
        Ok(())
    }
}
