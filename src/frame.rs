use crate::camera::CameraSource;
use crate::error::CaptureError;
use crate::session::Snapshot;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

fn load_frames(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(rd) => {
            let mut paths: Vec<PathBuf> = rd
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.path())
                .collect();
            paths.sort();
            if paths.is_empty() {
                error!("no frames found in {}", dir.display());
            }
            paths
        }
        Err(e) => {
            error!("failed to read {}: {e}", dir.display());
            Vec::new()
        }
    }
}

/// Camera stand-in that serves still files from a directory in sorted
/// order, wrapping around at the end. File bytes are passed through as-is.
pub struct FrameDirCamera {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    index: usize,
    open: bool,
}

impl FrameDirCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frames: Vec::new(),
            index: 0,
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn next_frame(&mut self) -> Option<PathBuf> {
        if self.frames.is_empty() {
            None
        } else {
            let path = self.frames[self.index % self.frames.len()].clone();
            self.index = (self.index + 1) % self.frames.len();
            Some(path)
        }
    }
}

impl CameraSource for FrameDirCamera {
    fn request_access(&mut self) -> Result<(), CaptureError> {
        self.frames = load_frames(&self.dir);
        if self.frames.is_empty() {
            return Err(CaptureError::Permission(format!(
                "No frames available in {}.",
                self.dir.display()
            )));
        }
        debug!(dir = %self.dir.display(), count = self.frames.len(), "frame directory opened");
        self.open = true;
        Ok(())
    }

    fn snapshot(&mut self) -> Option<Snapshot> {
        if !self.open {
            return None;
        }
        let path = self.next_frame()?;
        match std::fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => {
                let format = ImageFormat::from_path(&path)
                    .ok()
                    .or_else(|| image::guess_format(&bytes).ok());
                Some(Snapshot::new(bytes, format))
            }
            Ok(_) => {
                warn!(path = %path.display(), "frame file is empty");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), "failed to read frame: {e}");
                None
            }
        }
    }

    fn release(&mut self) {
        if self.open {
            debug!(dir = %self.dir.display(), "frame directory released");
        }
        self.open = false;
        self.frames.clear();
        self.index = 0;
    }
}
