pub mod apply;
pub mod chain;
pub mod classify;
pub mod error;
pub mod file_service;
pub mod ignore;
pub mod pipeline;
pub mod record;
pub mod runner;
pub mod scanner;
pub mod steps;

pub use apply::{apply, ApplyProgress, ApplyReport, TransferMode};
pub use chain::{ChainError, FilterChain, RenameChain};
pub use classify::{classify, counts, ClassCounts, ViewMode};
pub use error::CoreError;
pub use file_service::{FileService, LocalFileService};
pub use ignore::build_globset_from_patterns;
pub use pipeline::{PipelineExecutor, PipelineReport, StepIssue};
pub use record::{FileFate, FileRecord, StepResult, WorkingName};
pub use runner::{RunnerDefinition, RunnerRegistry};
pub use scanner::{DirectoryScanner, ScanOptions};
pub use steps::{StepConfig, StepList};
