//! Performs the real copy or move for files that reached an output step.

use super::{CoreError, FileRecord, FileService};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AppliedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ApplyFailure {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub reason: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ApplyProgress {
    pub processed: usize,
    pub total: usize,
    pub current: PathBuf,
}

#[derive(Serialize, Clone, Debug)]
pub struct ApplyReport {
    pub mode: TransferMode,
    pub succeeded: Vec<AppliedFile>,
    pub failures: Vec<ApplyFailure>,
    /// Files that never reached an output step.
    pub skipped: Vec<ApplyFailure>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// A short text for the UI listing at most `max_failures` failures.
    pub fn summary(&self, max_failures: usize) -> String {
        let verb = match self.mode {
            TransferMode::Copy => "Copied",
            TransferMode::Move => "Moved",
        };
        let mut text = format!(
            "{verb} {} files ({} failed, {} skipped) in {} ms",
            self.succeeded.len(),
            self.failures.len(),
            self.skipped.len(),
            (self.finished_at - self.started_at).num_milliseconds()
        );
        for failure in self.failures.iter().take(max_failures) {
            text.push_str(&format!("\n{}: {}", failure.source.display(), failure.reason));
        }
        if self.failures.len() > max_failures {
            text.push_str(&format!("\n... and {} more", self.failures.len() - max_failures));
        }
        text
    }
}

async fn transfer<S>(service: &S, file: &FileRecord, destination: &Path, mode: TransferMode) -> Result<(), CoreError>
where
    S: FileService + ?Sized,
{
    if service.path_exists(destination).await {
        return Err(CoreError::DestinationExists(destination.to_path_buf()));
    }
    match mode {
        TransferMode::Copy => service.copy_file(&file.original_path, destination).await,
        TransferMode::Move => service.move_file(&file.original_path, destination).await,
    }
}

/// Transfers each routed file to `output_path / working_file_name`, one at a
/// time. Failures are collected and never stop the remaining files.
pub async fn apply<S, F>(service: &S, files: &[FileRecord], mode: TransferMode, mut on_progress: F) -> ApplyReport
where
    S: FileService + ?Sized,
    F: FnMut(ApplyProgress) + Send,
{
    let started_at = Local::now();
    let mut succeeded = Vec::new();
    let mut failures = Vec::new();
    let mut skipped = Vec::new();

    for (index, file) in files.iter().enumerate() {
        match file.destination() {
            None => skipped.push(ApplyFailure {
                source: file.original_path.clone(),
                destination: None,
                reason: "file did not reach an output step".to_string(),
            }),
            Some(destination) => match transfer(service, file, &destination, mode).await {
                Ok(()) => succeeded.push(AppliedFile {
                    source: file.original_path.clone(),
                    destination,
                }),
                Err(e) => {
                    tracing::error!("Failed to transfer {:?}: {}", file.original_path, e);
                    failures.push(ApplyFailure {
                        source: file.original_path.clone(),
                        destination: Some(destination),
                        reason: e.to_string(),
                    });
                }
            },
        }
        on_progress(ApplyProgress {
            processed: index + 1,
            total: files.len(),
            current: file.original_path.clone(),
        });
    }

    let report = ApplyReport {
        mode,
        succeeded,
        failures,
        skipped,
        started_at,
        finished_at: Local::now(),
    };
    tracing::info!(
        "Apply finished: {} ok, {} failed, {} skipped",
        report.succeeded.len(),
        report.failures.len(),
        report.skipped.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::PipelineExecutor;
    use crate::core::runner::RunnerRegistry;
    use crate::core::steps::StepConfig;
    use crate::core::LocalFileService;
    use std::fs;
    use tempfile::TempDir;

    fn routed_files(source: &TempDir, out: &TempDir, names: &[&str]) -> Vec<FileRecord> {
        let mut files: Vec<FileRecord> = names
            .iter()
            .map(|n| {
                let path = source.path().join(n);
                fs::write(&path, n).unwrap();
                FileRecord::new(path, source.path().to_path_buf(), n.len() as u64)
            })
            .collect();
        let registry = RunnerRegistry::builtin().unwrap();
        let out = out.path().to_string_lossy().to_string();
        let steps = vec![
            StepConfig::new("only txt", "filter_extension", [("extensions".to_string(), "txt".into())].into()),
            StepConfig::new("prefix", "rename_prefix", [("text".to_string(), "new_".into())].into()),
            StepConfig::new("out", "output_path", [("output_path".to_string(), out.into())].into()),
        ];
        PipelineExecutor::new(&registry).run(&mut files, &steps);
        files
    }

    #[tokio::test]
    async fn test_copy_routed_files_and_skip_others() {
        let source = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let files = routed_files(&source, &out, &["a.txt", "b.md"]);
        let mut progress = Vec::new();

        let report = apply(&LocalFileService, &files, TransferMode::Copy, |p| progress.push(p.processed)).await;

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.is_clean());
        assert_eq!(progress, vec![1, 2]);
        assert_eq!(fs::read_to_string(out.path().join("new_a.txt")).unwrap(), "a.txt");
        assert!(source.path().join("a.txt").exists());
        assert!(report.summary(3).starts_with("Copied 1 files (0 failed, 1 skipped)"));
    }

    #[tokio::test]
    async fn test_existing_destination_fails_without_overwrite() {
        let source = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(out.path().join("new_a.txt"), "keep").unwrap();
        let files = routed_files(&source, &out, &["a.txt", "b.txt"]);

        let report = apply(&LocalFileService, &files, TransferMode::Move, |_| {}).await;

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("already exists"));
        assert_eq!(fs::read_to_string(out.path().join("new_a.txt")).unwrap(), "keep");
        assert!(source.path().join("a.txt").exists());
        assert!(!source.path().join("b.txt").exists());
        assert!(out.path().join("new_b.txt").exists());
        assert!(report.summary(0).contains("... and 1 more"));
    }
}
