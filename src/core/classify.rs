//! Read-only views over an executed file list.

use crate::core::record::FileRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    #[default]
    All,
    ReachedOutput,
    CompletedFlow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassCounts {
    pub all: usize,
    pub reached_output: usize,
    pub completed_flow: usize,
}

fn reached_output(file: &FileRecord) -> bool {
    file.output_path().is_some()
}

/// A file nothing stopped: it is still flowing, ended at an output step, or
/// never ran any step.
fn completed_flow(file: &FileRecord) -> bool {
    match file.last_result() {
        None => true,
        Some(last) => last.continues || last.output_path.is_some(),
    }
}

impl ViewMode {
    pub fn matches(self, file: &FileRecord) -> bool {
        match self {
            ViewMode::All => true,
            ViewMode::ReachedOutput => reached_output(file),
            ViewMode::CompletedFlow => completed_flow(file),
        }
    }
}

pub fn classify(files: &[FileRecord], mode: ViewMode) -> Vec<&FileRecord> {
    files.iter().filter(|f| mode.matches(f)).collect()
}

pub fn counts(files: &[FileRecord]) -> ClassCounts {
    files.iter().fold(
        ClassCounts {
            all: files.len(),
            ..ClassCounts::default()
        },
        |mut counts, file| {
            counts.reached_output += usize::from(reached_output(file));
            counts.completed_flow += usize::from(completed_flow(file));
            counts
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::PipelineExecutor;
    use crate::core::runner::RunnerRegistry;
    use crate::core::steps::StepConfig;
    use std::path::Path;

    fn run(names: &[&str], steps: Vec<StepConfig>) -> Vec<FileRecord> {
        let registry = RunnerRegistry::builtin().unwrap();
        let mut files: Vec<FileRecord> = names.iter().map(|n| FileRecord::from_name(n, 1)).collect();
        PipelineExecutor::new(&registry).run(&mut files, &steps);
        files
    }

    fn step(runner_id: &str, key: &str, value: &str) -> StepConfig {
        StepConfig::new(runner_id, runner_id, [(key.to_string(), value.into())].into())
    }

    #[test]
    fn test_unexecuted_files_count_as_completed() {
        let files = run(&["a.txt", "b.txt"], Vec::new());
        assert_eq!(classify(&files, ViewMode::All).len(), 2);
        assert_eq!(classify(&files, ViewMode::CompletedFlow).len(), 2);
        assert!(classify(&files, ViewMode::ReachedOutput).is_empty());
    }

    #[test]
    fn test_reached_output_returns_exactly_routed_files() {
        let files = run(
            &["a.txt", "b.md", "c.txt"],
            vec![
                step("filter_extension", "extensions", "txt"),
                step("output_path", "output_path", r"D:\out"),
            ],
        );

        let routed: Vec<_> = classify(&files, ViewMode::ReachedOutput)
            .into_iter()
            .map(|f| f.original_file_name())
            .collect();
        assert_eq!(routed, vec!["a.txt", "c.txt"]);
        assert!(routed_paths_match(&files, Path::new(r"D:\out")));

        assert_eq!(
            counts(&files),
            ClassCounts {
                all: 3,
                reached_output: 2,
                completed_flow: 2,
            }
        );
    }

    fn routed_paths_match(files: &[FileRecord], expected: &Path) -> bool {
        classify(files, ViewMode::ReachedOutput)
            .iter()
            .all(|f| f.output_path() == Some(expected))
    }

    #[test]
    fn test_flowing_files_complete_but_do_not_reach_output() {
        let files = run(&["a.txt", "b.md"], vec![step("filter_extension", "extensions", "md")]);
        let completed = classify(&files, ViewMode::CompletedFlow);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].original_file_name(), "b.md");
        assert!(classify(&files, ViewMode::ReachedOutput).is_empty());
    }
}
