// src/paths.rs
// Where ClipDrop keeps its own files when no --config-dir is given.

use std::path::PathBuf;

/// `%APPDATA%\ClipDrop` on Windows, `~/.local/share/clipdrop` on Linux.
pub fn default_config_dir() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
    #[cfg(target_os = "windows")]
    let name = "ClipDrop";
    #[cfg(not(target_os = "windows"))]
    let name = "clipdrop";
    base.join(name)
}

/// The user's Documents folder; asset, cache and tool folders live under
/// `{documents}/ClipDrop`.
pub fn documents_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Documents")))
        .unwrap_or_else(std::env::temp_dir)
}
