use crate::session::Stage;
use thiserror::Error;

/// Failures a capture session can report to its host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// Camera access was refused or no device is available.
    #[error("{0}")]
    Permission(String),
    /// The camera had no frame at the capture instant; retried locally.
    #[error("snapshot not ready (attempt {attempt})")]
    CaptureRetryable { attempt: u32 },
    /// The camera still had no frame after every retry.
    #[error("failed to capture photo after {attempts} attempts")]
    CaptureFatal { attempts: u32 },
    #[error("cannot {op} while {stage}")]
    InvalidTransition { op: &'static str, stage: Stage },
    #[error("no active capture session")]
    NoSession,
}

impl CaptureError {
    pub fn permission_denied() -> Self {
        Self::Permission("Cannot access camera. Please enable permission.".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("pose_count must be at least 1")]
    NoPoses,
    #[error("tick_ms must be at least 1")]
    ZeroTick,
    #[error("camera resolution {width}x{height} is invalid")]
    Resolution { width: u32, height: u32 },
}

/// Failures of the binary's host loops.
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture stalled while {0}")]
    Stalled(Stage),
}
