use super::{build_globset_from_patterns, CoreError, FileRecord};
use globset::GlobSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

/// How a source folder is listed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ScanOptions {
    pub recursive: bool,
    pub ignore_patterns: Vec<String>,
    /// Upper bound on the number of files across all folders of one scan.
    pub max_files: usize,
    /// Files already found in earlier folders of the same scan.
    #[serde(default)]
    pub already_found: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            ignore_patterns: Vec::new(),
            max_files: usize::MAX,
            already_found: 0,
        }
    }
}

pub struct DirectoryScanner {
    options: ScanOptions,
}

impl DirectoryScanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// Lists the files below `root` in file-name order.
    ///
    /// Fails without a partial result when a directory cannot be read or the
    /// file budget is exhausted.
    pub fn scan(&self, root: &Path) -> Result<Vec<FileRecord>, CoreError> {
        if !root.is_dir() {
            return Err(CoreError::NotADirectory(root.to_path_buf()));
        }
        let ignore = build_globset_from_patterns(&self.options.ignore_patterns)?;
        let max_depth = if self.options.recursive { usize::MAX } else { 1 };

        let mut records = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !Self::should_ignore(entry.path(), root, &ignore));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                CoreError::io(std::io::Error::from(e), path)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if self.options.already_found + records.len() >= self.options.max_files {
                tracing::warn!("Scan of {:?} stopped at the limit of {} files", root, self.options.max_files);
                return Err(CoreError::LimitExceeded {
                    limit: self.options.max_files,
                });
            }
            let size = entry
                .metadata()
                .map_err(|e| CoreError::io(std::io::Error::from(e), entry.path()))?
                .len();
            records.push(FileRecord::new(entry.path().to_path_buf(), root.to_path_buf(), size));
        }

        tracing::info!("Scanned {:?}: {} files", root, records.len());
        Ok(records)
    }

    fn should_ignore(path: &Path, root: &Path, ignore: &GlobSet) -> bool {
        ignore.is_match(path.strip_prefix(root).unwrap_or(path))
    }
}
