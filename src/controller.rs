use crate::camera::CameraSource;
use crate::config::CaptureConfig;
use crate::error::{CaptureError, ConfigError};
use crate::event::{CaptureEvent, EventSink};
use crate::session::{CaptureSession, Snapshot, Stage};
use crate::trigger::{FixedDwell, PoseTrigger};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Dwell,
    Countdown,
    SnapshotRetry,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    id: u64,
    due: Instant,
    kind: TimerKind,
}

/// Drives one capture session at a time.
///
/// The controller never sleeps. Whoever owns it asks for
/// [`next_deadline`](Self::next_deadline) and calls [`poll`](Self::poll) once
/// that instant has passed. At most one timer is pending; leaving a stage
/// clears it, so a discarded session cannot be advanced by a late timer.
pub struct CaptureController<S: EventSink> {
    config: CaptureConfig,
    camera: Box<dyn CameraSource>,
    trigger: Box<dyn PoseTrigger>,
    sink: S,
    session: Option<CaptureSession>,
    timer: Option<Timer>,
    timer_seq: u64,
    session_seq: u64,
    camera_held: bool,
}

impl<S: EventSink> CaptureController<S> {
    pub fn new(
        config: CaptureConfig,
        camera: Box<dyn CameraSource>,
        sink: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            camera,
            trigger: Box::new(FixedDwell),
            sink,
            session: None,
            timer: None,
            timer_seq: 0,
            session_seq: 0,
            camera_held: false,
        })
    }

    pub fn with_trigger(mut self, trigger: Box<dyn PoseTrigger>) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Replaces the configuration. The running session keeps its pose count;
    /// new timings apply from the next armed timer.
    pub fn set_config(&mut self, config: CaptureConfig) -> Result<(), ConfigError> {
        config.validate()?;
        debug!(?config, "configuration updated");
        self.config = config;
        Ok(())
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.map(|t| t.due)
    }

    /// Opens a new session and requests the camera.
    pub fn start(&mut self, now: Instant) -> Result<Stage, CaptureError> {
        if let Some(session) = &self.session {
            if !session.is_restartable() {
                return Err(CaptureError::InvalidTransition {
                    op: "start",
                    stage: session.stage(),
                });
            }
            debug!(id = session.id(), "replacing finished session");
            self.discard();
        }

        self.session_seq += 1;
        let id = self.session_seq;
        info!(id, "capture session started");
        self.session = Some(CaptureSession::new(id, self.config.pose_count));
        self.emit_stage();

        match self.camera.request_access() {
            Ok(()) => {
                self.camera_held = true;
                if let Some(session) = self.session.as_mut() {
                    session.grant();
                }
                debug!(id, "camera access granted");
                self.emit_stage();
                self.arm_dwell(1, now);
                Ok(Stage::Detecting(1))
            }
            Err(err) => {
                let reason = match &err {
                    CaptureError::Permission(reason) => reason.clone(),
                    other => other.to_string(),
                };
                warn!(id, %reason, "camera access denied");
                self.camera.release();
                self.camera_held = false;
                if let Some(session) = self.session.as_mut() {
                    session.deny(reason.clone());
                }
                self.emit_stage();
                self.sink
                    .emit(CaptureEvent::Failed(CaptureError::Permission(reason.clone())));
                Err(CaptureError::Permission(reason))
            }
        }
    }

    /// Abandons a running session without producing an image.
    pub fn cancel(&mut self) -> Result<(), CaptureError> {
        let session = self.session.as_ref().ok_or(CaptureError::NoSession)?;
        if session.is_terminal() {
            return Err(CaptureError::InvalidTransition {
                op: "cancel",
                stage: session.stage(),
            });
        }
        info!(id = session.id(), stage = %session.stage(), "capture canceled");
        self.discard();
        self.sink.emit(CaptureEvent::Discarded);
        Ok(())
    }

    /// Drops whatever session exists. Safe to call at any time.
    pub fn close(&mut self) {
        if let Some(session) = &self.session {
            debug!(id = session.id(), "capture closed");
            self.discard();
            self.sink.emit(CaptureEvent::Discarded);
        } else {
            self.clear_timer();
            self.release_camera();
        }
    }

    /// Throws away the still and restarts detection from the first pose.
    pub fn retake(&mut self, now: Instant) -> Result<Stage, CaptureError> {
        let session = self.session.as_mut().ok_or(CaptureError::NoSession)?;
        if session.stage() != Stage::Captured {
            return Err(CaptureError::InvalidTransition {
                op: "retake",
                stage: session.stage(),
            });
        }
        session.reset_for_retake();
        info!(id = session.id(), "retaking photo");
        self.emit_stage();
        self.arm_dwell(1, now);
        Ok(Stage::Detecting(1))
    }

    /// Hands the still to the host and ends the session.
    pub fn confirm(&mut self) -> Result<Snapshot, CaptureError> {
        self.confirm_with(|image| Ok::<_, CaptureError>(image.clone()))
    }

    /// Runs `deliver` on the still and ends the session only if it succeeds.
    /// On failure the session stays `Captured` with its image and camera, so
    /// the host can deliver again or retake.
    pub fn confirm_with<T, E, F>(&mut self, deliver: F) -> Result<T, E>
    where
        E: From<CaptureError>,
        F: FnOnce(&Snapshot) -> Result<T, E>,
    {
        let session = self.session.as_ref().ok_or(CaptureError::NoSession)?;
        if session.stage() != Stage::Captured {
            return Err(CaptureError::InvalidTransition {
                op: "confirm",
                stage: session.stage(),
            }
            .into());
        }
        let id = session.id();
        let image = session
            .captured_image()
            .cloned()
            .ok_or(CaptureError::InvalidTransition {
                op: "confirm",
                stage: Stage::Captured,
            })?;
        let delivered = match deliver(&image) {
            Ok(v) => v,
            Err(e) => {
                warn!(id, "photo delivery failed, keeping session");
                return Err(e);
            }
        };
        info!(id, len = image.len(), "photo confirmed");
        self.discard();
        self.sink.emit(CaptureEvent::Delivered(image));
        Ok(delivered)
    }

    /// Fires every timer due at `now`, including zero-delay follow-ups.
    /// Returns the last stage reached.
    pub fn poll_due(&mut self, now: Instant) -> Result<Option<Stage>, CaptureError> {
        let mut last = None;
        while self.timer.is_some_and(|t| t.due <= now) {
            if let Some(stage) = self.poll(now)? {
                last = Some(stage);
            }
        }
        Ok(last)
    }

    /// Signals that a detector recognised `pose`. Advances like a dwell
    /// timeout and drops any pending dwell timer.
    pub fn pose_confirmed(&mut self, pose: u32, now: Instant) -> Result<Stage, CaptureError> {
        let session = self.session.as_ref().ok_or(CaptureError::NoSession)?;
        if session.stage() != Stage::Detecting(pose) {
            return Err(CaptureError::InvalidTransition {
                op: "confirm pose",
                stage: session.stage(),
            });
        }
        self.clear_timer();
        self.advance_detection(now)
    }

    /// Fires the pending timer if it is due. Returns the new stage when a
    /// transition happened.
    pub fn poll(&mut self, now: Instant) -> Result<Option<Stage>, CaptureError> {
        let timer = match self.timer {
            Some(t) if t.due <= now => t,
            _ => return Ok(None),
        };
        self.timer = None;
        trace!(id = timer.id, kind = ?timer.kind, "timer fired");
        let Some(stage) = self.session.as_ref().map(CaptureSession::stage) else {
            return Ok(None);
        };
        let next = match (timer.kind, stage) {
            (TimerKind::Dwell, Stage::Detecting(_)) => self.advance_detection(now)?,
            (TimerKind::Countdown, Stage::CountingDown(_)) => self.countdown_tick(now)?,
            (TimerKind::SnapshotRetry, Stage::CountingDown(0)) => self.attempt_capture(now)?,
            (kind, stage) => {
                warn!(?kind, %stage, "dropping timer that does not match the stage");
                return Ok(None);
            }
        };
        Ok(Some(next))
    }

    fn advance_detection(&mut self, now: Instant) -> Result<Stage, CaptureError> {
        let session = self.session.as_mut().ok_or(CaptureError::NoSession)?;
        if session.advance_pose() {
            let pose = session.pose_index();
            debug!(id = session.id(), pose, "pose detected");
            self.emit_stage();
            self.arm_dwell(pose, now);
            return Ok(Stage::Detecting(pose));
        }

        let start = self.config.countdown_start;
        session.begin_countdown(start);
        debug!(id = session.id(), start, "final pose detected, counting down");
        self.emit_stage();
        if start == 0 {
            self.attempt_capture(now)
        } else {
            self.arm(TimerKind::Countdown, self.config.tick(), now);
            Ok(Stage::CountingDown(start))
        }
    }

    fn countdown_tick(&mut self, now: Instant) -> Result<Stage, CaptureError> {
        let session = self.session.as_mut().ok_or(CaptureError::NoSession)?;
        let left = session.tick_countdown();
        trace!(id = session.id(), left, "countdown");
        self.emit_stage();
        if left == 0 {
            self.attempt_capture(now)
        } else {
            self.arm(TimerKind::Countdown, self.config.tick(), now);
            Ok(Stage::CountingDown(left))
        }
    }

    fn attempt_capture(&mut self, now: Instant) -> Result<Stage, CaptureError> {
        let session = self.session.as_mut().ok_or(CaptureError::NoSession)?;
        let attempt = session.record_attempt();
        match self.camera.snapshot().filter(|s| !s.is_empty()) {
            Some(image) => {
                info!(id = session.id(), attempt, len = image.len(), "photo captured");
                session.capture(image);
                self.emit_stage();
                Ok(Stage::Captured)
            }
            None if attempt <= self.config.snapshot_retries => {
                let err = CaptureError::CaptureRetryable { attempt };
                warn!(id = session.id(), "{err}, retrying");
                self.arm(TimerKind::SnapshotRetry, self.config.retry_delay(), now);
                Ok(Stage::CountingDown(0))
            }
            None => {
                let err = CaptureError::CaptureFatal { attempts: attempt };
                warn!(id = session.id(), "{err}");
                session.fail_capture(err.to_string());
                self.emit_stage();
                self.sink.emit(CaptureEvent::Failed(err.clone()));
                Err(err)
            }
        }
    }

    fn arm_dwell(&mut self, pose: u32, now: Instant) {
        match self.trigger.arm(pose, &self.config) {
            Some(delay) => self.arm(TimerKind::Dwell, delay, now),
            None => {
                trace!(pose, "waiting for external pose confirmation");
                self.clear_timer();
            }
        }
    }

    fn arm(&mut self, kind: TimerKind, delay: Duration, now: Instant) {
        self.timer_seq += 1;
        let timer = Timer {
            id: self.timer_seq,
            due: now + delay,
            kind,
        };
        trace!(id = timer.id, ?kind, delay_ms = delay.as_millis() as u64, "timer armed");
        self.timer = Some(timer);
    }

    fn clear_timer(&mut self) {
        if let Some(t) = self.timer.take() {
            trace!(id = t.id, kind = ?t.kind, "timer cleared");
        }
    }

    fn release_camera(&mut self) {
        if self.camera_held {
            self.camera.release();
            self.camera_held = false;
        }
    }

    fn discard(&mut self) {
        self.clear_timer();
        self.release_camera();
        self.session = None;
    }

    fn emit_stage(&mut self) {
        if let Some(session) = &self.session {
            self.sink.emit(CaptureEvent::StageChanged(session.clone()));
        }
    }
}

impl<S: EventSink> Drop for CaptureController<S> {
    fn drop(&mut self) {
        self.clear_timer();
        self.release_camera();
    }
}
