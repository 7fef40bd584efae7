//! Path utilities for Vexa data directories.

use std::path::PathBuf;

/// Get the Vexa data directory (`<platform data dir>/vexa`).
///
/// Falls back to `./.vexa` when the platform has no data directory.
pub fn vexa_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("vexa"))
        .unwrap_or_else(|| PathBuf::from(".vexa"))
}

/// Get the directory for files produced by chat actions (generated CSVs).
pub fn downloads_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| vexa_data_dir().join("downloads"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_is_named_after_the_app() {
        assert!(vexa_data_dir().ends_with("vexa") || vexa_data_dir().ends_with(".vexa"));
    }
}
