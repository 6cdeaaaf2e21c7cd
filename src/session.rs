use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Phase of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "value", rename_all = "snake_case")]
pub enum Stage {
    AwaitingPermission,
    /// Waiting for the pose with this 1-based index.
    Detecting(u32),
    /// Seconds left before the still is taken.
    CountingDown(u32),
    Captured,
    PermissionDenied,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::AwaitingPermission => write!(f, "awaiting permission"),
            Stage::Detecting(pose) => write!(f, "detecting pose {pose}"),
            Stage::CountingDown(secs) => write!(f, "counting down ({secs})"),
            Stage::Captured => write!(f, "captured"),
            Stage::PermissionDenied => write!(f, "permission denied"),
        }
    }
}

/// A still frame handed out by a camera. The bytes are opaque and passed
/// through to the host unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    bytes: Arc<[u8]>,
    format: Option<ImageFormat>,
}

impl Snapshot {
    pub fn new(bytes: Vec<u8>, format: Option<ImageFormat>) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the encoded format, `bin` when unknown.
    pub fn extension(&self) -> &'static str {
        self.format
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("bin")
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.bytes.len())
            .field("format", &self.format)
            .finish()
    }
}

/// The single active run of the capture flow.
///
/// Only the controller mutates a session. The captured image is stored if and
/// only if the stage is [`Stage::Captured`], and the pose index only moves
/// forward until a retake.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    id: u64,
    stage: Stage,
    pose_index: u32,
    pose_count: u32,
    captured_image: Option<Snapshot>,
    camera_ready: bool,
    error: Option<String>,
    snapshot_attempts: u32,
    restarted: bool,
}

impl CaptureSession {
    pub(crate) fn new(id: u64, pose_count: u32) -> Self {
        Self {
            id,
            stage: Stage::AwaitingPermission,
            pose_index: 1,
            pose_count,
            captured_image: None,
            camera_ready: false,
            error: None,
            snapshot_attempts: 0,
            restarted: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn pose_index(&self) -> u32 {
        self.pose_index
    }

    pub fn pose_count(&self) -> u32 {
        self.pose_count
    }

    pub fn captured_image(&self) -> Option<&Snapshot> {
        self.captured_image.as_ref()
    }

    pub fn camera_ready(&self) -> bool {
        self.camera_ready
    }

    /// Permission reason or capture failure message, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn snapshot_attempts(&self) -> u32 {
        self.snapshot_attempts
    }

    /// True once snapshot retries ran out; the session waits for cancel or a
    /// fresh start.
    pub fn capture_failed(&self) -> bool {
        self.stage == Stage::CountingDown(0) && self.error.is_some()
    }

    /// Whether `start` may replace this session.
    pub fn is_restartable(&self) -> bool {
        self.stage == Stage::PermissionDenied || self.capture_failed()
    }

    pub fn is_terminal(&self) -> bool {
        self.stage == Stage::PermissionDenied
    }

    /// Prompt shown to the applicant for the current stage.
    pub fn status(&self) -> String {
        if let Some(err) = &self.error {
            return err.clone();
        }
        match self.stage {
            Stage::AwaitingPermission => "Loading camera...".to_string(),
            Stage::Detecting(_) if self.restarted => "Restarting detection...".to_string(),
            Stage::Detecting(1) => "Detecting hand...".to_string(),
            Stage::Detecting(pose) => format!("Pose {} detected", pose - 1),
            Stage::CountingDown(_) => "Final pose detected, starting countdown...".to_string(),
            Stage::Captured => "Photo captured successfully!".to_string(),
            Stage::PermissionDenied => "Cannot access camera.".to_string(),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            stage: self.stage,
            pose_index: self.pose_index,
            pose_count: self.pose_count,
            status: self.status(),
            camera_ready: self.camera_ready,
            image_len: self.captured_image.as_ref().map(Snapshot::len),
            error: self.error.clone(),
        }
    }

    pub(crate) fn grant(&mut self) {
        self.camera_ready = true;
        self.stage = Stage::Detecting(1);
    }

    pub(crate) fn deny(&mut self, reason: String) {
        self.camera_ready = false;
        self.error = Some(reason);
        self.stage = Stage::PermissionDenied;
    }

    /// Moves to the next pose. Returns false when the last pose is done.
    pub(crate) fn advance_pose(&mut self) -> bool {
        self.restarted = false;
        if self.pose_index < self.pose_count {
            self.pose_index += 1;
            self.stage = Stage::Detecting(self.pose_index);
            true
        } else {
            false
        }
    }

    pub(crate) fn begin_countdown(&mut self, start: u32) {
        self.restarted = false;
        self.snapshot_attempts = 0;
        self.stage = Stage::CountingDown(start);
    }

    /// Decrements the countdown and returns the seconds left.
    pub(crate) fn tick_countdown(&mut self) -> u32 {
        let left = match self.stage {
            Stage::CountingDown(secs) => secs.saturating_sub(1),
            _ => return 0,
        };
        self.stage = Stage::CountingDown(left);
        left
    }

    pub(crate) fn record_attempt(&mut self) -> u32 {
        self.snapshot_attempts += 1;
        self.snapshot_attempts
    }

    pub(crate) fn capture(&mut self, image: Snapshot) {
        self.captured_image = Some(image);
        self.error = None;
        self.stage = Stage::Captured;
    }

    pub(crate) fn fail_capture(&mut self, message: String) {
        self.error = Some(message);
    }

    pub(crate) fn reset_for_retake(&mut self) {
        self.captured_image = None;
        self.error = None;
        self.snapshot_attempts = 0;
        self.pose_index = 1;
        self.restarted = true;
        self.stage = Stage::Detecting(1);
    }
}

/// Serializable projection of a session, without the image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub id: u64,
    pub stage: Stage,
    pub pose_index: u32,
    pub pose_count: u32,
    pub status: String,
    pub camera_ready: bool,
    pub image_len: Option<usize>,
    pub error: Option<String>,
}
