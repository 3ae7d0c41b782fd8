//! Native file dialogs via rfd.

use super::FilePicker;
use std::path::PathBuf;

const FILTER_NAME: &str = "Cross-stitch project";

/// Blocking native dialogs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RfdPicker;

impl FilePicker for RfdPicker {
    fn pick_import(&self) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Import Project")
            .add_filter(FILTER_NAME, &["zip"])
            .pick_file()
    }

    fn pick_export(&self, suggested_name: &str) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Export Project")
            .set_file_name(suggested_name)
            .add_filter(FILTER_NAME, &["zip"])
            .save_file()
    }
}
