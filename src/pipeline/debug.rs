use image::GrayImage;
use std::path::{Path, PathBuf};

use crate::calibration::Label;

/// Diagnostic images, overwritten every cycle.
///
/// Layout: `{dir}/{label}.png` for the preprocessed crop and
/// `{dir}/slices/{label}_{n}.png` for slice `n` (1-based).
#[derive(Clone, Debug)]
pub struct DebugArtifacts {
    dir: PathBuf,
}

impl DebugArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn crop_path(&self, label: Label) -> PathBuf {
        self.dir.join(format!("{}.png", label))
    }

    pub fn slice_path(&self, label: Label, index: usize) -> PathBuf {
        self.dir
            .join("slices")
            .join(format!("{}_{}.png", label, index + 1))
    }

    pub fn save_crop(&self, label: Label, img: &GrayImage) {
        save(&self.crop_path(label), img, label);
    }

    pub fn save_slice(&self, label: Label, index: usize, img: &GrayImage) {
        save(&self.slice_path(label, index), img, label);
    }
}

fn save(path: &Path, img: &GrayImage, label: Label) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::warn!("[{}] debug: cannot create {}: {}", label, parent.display(), e);
            return;
        }
    }
    if let Err(e) = img.save(path) {
        log::warn!("[{}] debug: failed to save {}: {}", label, path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use tempfile::tempdir;

    #[test]
    fn test_artifact_layout() {
        let dir = tempdir().unwrap();
        let debug = DebugArtifacts::new(dir.path().join("debug-crops"));
        let img: GrayImage = ImageBuffer::from_pixel(4, 4, Luma([255]));

        debug.save_crop(Label::P3, &img);
        debug.save_slice(Label::P3, 0, &img);

        assert!(dir.path().join("debug-crops/P3.png").exists());
        assert!(dir.path().join("debug-crops/slices/P3_1.png").exists());
    }

    #[test]
    fn test_write_failure_is_ignored() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let debug = DebugArtifacts::new(blocker.join("debug-crops"));

        debug.save_crop(Label::P2, &ImageBuffer::from_pixel(1, 1, Luma([0])));
        assert!(!debug.crop_path(Label::P2).exists());
    }
}
