use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the public directory shared with the capture collaborator: `<exe_dir>/public/`
pub fn get_public_dir() -> PathBuf {
    get_exe_dir().join("public")
}

/// Returns the default screenshot location: `<exe_dir>/public/capture.png`
pub fn get_capture_path() -> PathBuf {
    get_public_dir().join("capture.png")
}

/// Returns the debug artifact directory: `<exe_dir>/public/debug-crops/`
pub fn get_debug_dir() -> PathBuf {
    get_public_dir().join("debug-crops")
}

/// Returns the persisted results document: `<exe_dir>/data/results.json`
pub fn get_results_path() -> PathBuf {
    get_exe_dir().join("data").join("results.json")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_public_dir())?;
    if let Some(parent) = get_results_path().parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
