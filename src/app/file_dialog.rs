//! An abstraction layer for native file dialogs to enable testing.

use std::path::{Path, PathBuf};

/// The dialogs the application opens. Mocked in tests so no OS window appears.
pub trait DialogService: Send + Sync {
    /// Asks for a single folder, starting in `start_dir` when given.
    fn pick_folder(&self, title: &str, start_dir: Option<&Path>) -> Option<PathBuf>;

    /// Asks for a flow file to import.
    fn pick_flow_to_import(&self) -> Option<PathBuf>;

    /// Asks where to export the flow called `name`.
    fn export_flow_path(&self, name: &str) -> Option<PathBuf>;
}

/// The production implementation that uses the `rfd` crate to show native OS dialogs.
pub struct NativeDialogService;

impl DialogService for NativeDialogService {
    fn pick_folder(&self, title: &str, start_dir: Option<&Path>) -> Option<PathBuf> {
        let mut dialog = rfd::FileDialog::new().set_title(title);
        if let Some(dir) = start_dir {
            dialog = dialog.set_directory(dir);
        }
        dialog.pick_folder()
    }

    fn pick_flow_to_import(&self) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .add_filter("Flow", &["json"])
            .pick_file()
    }

    fn export_flow_path(&self, name: &str) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .add_filter("Flow", &["json"])
            .set_file_name(format!("{name}.json"))
            .save_file()
    }
}
