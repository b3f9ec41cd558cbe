use std::path::PathBuf;

/// Get the base directory for BatLayer data files
fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("batlayer"))
}

/// Get the base directory for BatLayer config files
fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("batlayer"))
}

/// Directory the running executable lives in. Icon sets are installed next to it.
pub fn install_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
}

/// Default root for icon sets, `<install-dir>/icons`
pub fn default_icon_root() -> PathBuf {
    install_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("icons")
}

/// Get the path to the log file
pub fn log_file_path() -> Option<PathBuf> {
    ensure_data_dir().map(|dir| dir.join("batlayer.log"))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.yaml"))
}

/// Ensure the data directory exists
pub fn ensure_data_dir() -> Option<PathBuf> {
    data_dir().and_then(|dir| {
        std::fs::create_dir_all(&dir).ok()?;
        Some(dir)
    })
}
