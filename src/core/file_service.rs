//! File-system access behind a trait so the app layer can be tested with fakes.

use super::{CoreError, DirectoryScanner, FileRecord, ScanOptions};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait FileService: Send + Sync {
    async fn list_files(&self, root: &Path, options: &ScanOptions) -> Result<Vec<FileRecord>, CoreError>;

    /// Copies `src` to `dst`, creating missing parent folders.
    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<(), CoreError>;

    /// Moves `src` to `dst`, creating missing parent folders.
    async fn move_file(&self, src: &Path, dst: &Path) -> Result<(), CoreError>;

    async fn path_exists(&self, path: &Path) -> bool;
}

/// The production file service on top of the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileService;

async fn ensure_parent(dst: &Path) -> Result<(), CoreError> {
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoreError::io(e, parent))?;
    }
    Ok(())
}

#[async_trait]
impl FileService for LocalFileService {
    async fn list_files(&self, root: &Path, options: &ScanOptions) -> Result<Vec<FileRecord>, CoreError> {
        let root: PathBuf = root.to_path_buf();
        let scanner = DirectoryScanner::new(options.clone());
        tokio::task::spawn_blocking(move || scanner.scan(&root)).await?
    }

    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<(), CoreError> {
        ensure_parent(dst).await?;
        tokio::fs::copy(src, dst)
            .await
            .map_err(|e| CoreError::io(e, src))?;
        Ok(())
    }

    async fn move_file(&self, src: &Path, dst: &Path) -> Result<(), CoreError> {
        ensure_parent(dst).await?;
        if let Err(e) = tokio::fs::rename(src, dst).await {
            // Renaming fails across devices; fall back to copy and remove.
            tracing::debug!("Rename {:?} -> {:?} failed ({}), copying instead", src, dst, e);
            tokio::fs::copy(src, dst)
                .await
                .map_err(|e| CoreError::io(e, src))?;
            tokio::fs::remove_file(src)
                .await
                .map_err(|e| CoreError::io(e, src))?;
        }
        Ok(())
    }

    async fn path_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_and_move_create_parents() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        std::fs::write(&src, "hello").unwrap();
        let service = LocalFileService;

        let copied = dir.path().join("out/nested/b.txt");
        service.copy_file(&src, &copied).await.unwrap();
        assert!(service.path_exists(&src).await);
        assert_eq!(std::fs::read_to_string(&copied).unwrap(), "hello");

        let moved = dir.path().join("moved/c.txt");
        service.move_file(&src, &moved).await.unwrap();
        assert!(!service.path_exists(&src).await);
        assert!(service.path_exists(&moved).await);
    }

    #[tokio::test]
    async fn test_list_files_runs_scanner() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.txt"), "").unwrap();
        let files = LocalFileService
            .list_files(dir.path(), &ScanOptions::default())
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].original_file_name(), "x.txt");
    }

    #[tokio::test]
    async fn test_copy_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let result = LocalFileService
            .copy_file(&dir.path().join("missing"), &dir.path().join("dst"))
            .await;
        assert!(matches!(result, Err(CoreError::Io(_, _))));
    }
}
