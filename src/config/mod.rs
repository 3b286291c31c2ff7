pub mod error;
pub mod flow;
pub mod settings;

pub use error::ConfigError;

use crate::core::{ScanOptions, TransferMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The version written into freshly created configuration files.
pub const CONFIG_VERSION: &str = "1.1.0";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub version: String,
    pub max_file_count: usize,
    pub warn_file_count: usize,
    pub transfer_mode: TransferMode,
    pub recursive_scan: bool,
    pub language: Language,
    pub ignore_patterns: Vec<String>,
    pub source_folders: Vec<PathBuf>,
    pub last_output_directory: Option<PathBuf>,
    pub window_size: (f64, f64),
    pub window_position: (f64, f64),
    pub open_output_after_apply: bool,
}

impl AppConfig {
    /// Scan options for one folder, given how many files earlier folders yielded.
    pub fn scan_options(&self, already_found: usize) -> ScanOptions {
        ScanOptions {
            recursive: self.recursive_scan,
            ignore_patterns: self.ignore_patterns.clone(),
            max_files: self.max_file_count,
            already_found,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let ignore_patterns = [".DS_Store", "Thumbs.db", "desktop.ini", "*.tmp", "~$*", ".git/"]
            .into_iter()
            .map(String::from)
            .collect();

        Self {
            version: CONFIG_VERSION.to_string(),
            max_file_count: 50_000,
            warn_file_count: 5_000,
            transfer_mode: TransferMode::Copy,
            recursive_scan: true,
            language: Language::En,
            ignore_patterns,
            source_folders: Vec::new(),
            last_output_directory: dirs::desktop_dir(),
            window_size: (1200.0, 800.0),
            window_position: (100.0, 100.0),
            open_output_after_apply: false,
        }
    }
}
