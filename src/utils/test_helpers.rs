//! Shared fixtures for unit and integration tests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;

static LOGGING_INIT: Once = Once::new();

/// Installs a test-writer subscriber once per process.
///
/// Honors `RUST_LOG`, defaulting to debug output for this crate only.
pub fn setup_test_logging() {
    LOGGING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bulk_flow_renamer=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok(); // Another test may have installed a subscriber already.
    });
}

/// Writes `(relative path, content)` pairs below `root`, creating folders as needed.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) -> io::Result<Vec<PathBuf>> {
    files
        .iter()
        .map(|(relative, content)| {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content)?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_tree_creates_nested_folders() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_tree(dir.path(), &[("a.txt", "1"), ("x/y/b.txt", "22")]).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(fs::read_to_string(dir.path().join("x/y/b.txt")).unwrap(), "22");
    }
}
