use crate::config::CaptureConfig;
use std::time::Duration;

/// Decides how a detection stage completes.
///
/// Returning a delay arms the stage timer; returning `None` leaves the stage
/// waiting for [`CaptureController::pose_confirmed`](crate::CaptureController::pose_confirmed).
pub trait PoseTrigger {
    fn arm(&mut self, pose: u32, cfg: &CaptureConfig) -> Option<Duration>;
}

/// Advances every pose after the configured dwell interval.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedDwell;

impl PoseTrigger for FixedDwell {
    fn arm(&mut self, _pose: u32, cfg: &CaptureConfig) -> Option<Duration> {
        Some(cfg.dwell())
    }
}

/// Waits for a detector to confirm each pose.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExternalTrigger;

impl PoseTrigger for ExternalTrigger {
    fn arm(&mut self, _pose: u32, _cfg: &CaptureConfig) -> Option<Duration> {
        None
    }
}
