use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

const TRAINED_DATA: &str = "eng.traineddata";

/// Returns the directory for locally installed Tesseract files
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pick-reader")
        .join("tesseract")
}

fn tesseract_in_path() -> bool {
    std::process::Command::new("tesseract")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Finds the Tesseract executable: the configured path first, then `PATH`,
/// then our local install directory.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        log::warn!(
            "Configured Tesseract {} not found, searching elsewhere",
            path.display()
        );
    }

    if tesseract_in_path() {
        return Ok(PathBuf::from("tesseract"));
    }

    let local_exe = get_tesseract_dir().join(if cfg!(windows) {
        "tesseract.exe"
    } else {
        "tesseract"
    });
    if local_exe.exists() {
        return Ok(local_exe);
    }

    Err(anyhow!(
        "Tesseract not found. Install tesseract-ocr, add it to PATH, or set \
         recognizer.tesseract_path in config.json"
    ))
}

/// Finds a tessdata directory holding `eng.traineddata`.
///
/// Returns `None` when only Tesseract's built-in default is available.
pub fn find_tessdata_dir(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.join(TRAINED_DATA).exists() {
            return Some(path.to_path_buf());
        }
        log::warn!("Configured tessdata {} has no {}", path.display(), TRAINED_DATA);
    }

    let local_tessdata = get_tesseract_dir().join("tessdata");
    if local_tessdata.join(TRAINED_DATA).exists() {
        return Some(local_tessdata);
    }

    // Check TESSDATA_PREFIX environment variable
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if p.join(TRAINED_DATA).exists() {
            return Some(p);
        }
        let p = p.join("tessdata");
        if p.join(TRAINED_DATA).exists() {
            return Some(p);
        }
    }

    None
}
