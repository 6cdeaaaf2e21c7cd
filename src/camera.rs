use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::session::Snapshot;
use image::{imageops, DynamicImage, ImageFormat};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
    Camera,
};
use std::io::Cursor;
use tracing::{debug, error, trace, warn};

/// The media capability a capture session drives.
pub trait CameraSource {
    /// Acquires the device. Errors are reported to the host as permission
    /// failures.
    fn request_access(&mut self) -> Result<(), CaptureError>;

    /// Returns the current frame as a still image, or `None` when no frame is
    /// ready yet.
    fn snapshot(&mut self) -> Option<Snapshot>;

    /// Stops the stream so another session can acquire the device.
    fn release(&mut self);
}

/// Native webcam producing JPEG stills.
pub struct NokhwaCamera {
    index: u32,
    width: u32,
    height: u32,
    mirrored: bool,
    camera: Option<Camera>,
}

impl NokhwaCamera {
    pub fn new(cfg: &CaptureConfig) -> Self {
        Self {
            index: cfg.camera_index,
            width: cfg.width,
            height: cfg.height,
            mirrored: cfg.mirrored,
            camera: None,
        }
    }

    fn open(&self) -> Option<Camera> {
        let index = CameraIndex::Index(self.index);
        for (w, h) in [(self.width, self.height), (640, 480)] {
            for fmt in [FrameFormat::MJPEG, FrameFormat::YUYV, FrameFormat::RAWRGB] {
                let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
                    CameraFormat::new_from(w, h, fmt, 30),
                ));
                if let Ok(c) = Camera::new(index.clone(), req) {
                    return Some(c);
                }
            }
        }
        let fallback = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        Camera::new(index, fallback).ok()
    }
}

impl CameraSource for NokhwaCamera {
    fn request_access(&mut self) -> Result<(), CaptureError> {
        if self.camera.is_some() {
            return Ok(());
        }
        let Some(mut cam) = self.open() else {
            error!(index = self.index, "failed to open camera");
            return Err(CaptureError::permission_denied());
        };
        if let Err(e) = cam.open_stream() {
            error!("failed to open camera stream: {e}");
            return Err(CaptureError::permission_denied());
        }
        debug!(format = ?cam.camera_format(), "camera stream opened");
        self.camera = Some(cam);
        Ok(())
    }

    fn snapshot(&mut self) -> Option<Snapshot> {
        let cam = self.camera.as_mut()?;
        let frame = match cam.frame() {
            Ok(f) => f,
            Err(e) => {
                warn!("failed to capture frame: {e}");
                return None;
            }
        };
        let mut img = match frame.decode_image::<RgbFormat>() {
            Ok(i) => i,
            Err(e) => {
                warn!("failed to decode frame: {e}");
                return None;
            }
        };
        if self.mirrored {
            imageops::flip_horizontal_in_place(&mut img);
        }
        let mut bytes = Vec::new();
        if let Err(e) =
            DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        {
            error!("failed to encode snapshot: {e}");
            return None;
        }
        trace!(len = bytes.len(), "snapshot encoded");
        Some(Snapshot::new(bytes, Some(ImageFormat::Jpeg)))
    }

    fn release(&mut self) {
        if let Some(mut cam) = self.camera.take() {
            if let Err(e) = cam.stop_stream() {
                error!("failed to stop camera stream: {e}");
            }
            debug!("camera released");
        }
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        self.release();
    }
}
