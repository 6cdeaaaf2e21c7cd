use crate::error::CaptureError;
use crate::session::{CaptureSession, Snapshot};
use std::sync::mpsc::Sender;

/// Notifications sent from the controller to its host.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    StageChanged(CaptureSession),
    /// The host confirmed the still; the session is over.
    Delivered(Snapshot),
    /// The session was canceled or closed without an image.
    Discarded,
    Failed(CaptureError),
}

pub trait EventSink {
    fn emit(&mut self, event: CaptureEvent);
}

impl EventSink for Sender<CaptureEvent> {
    fn emit(&mut self, event: CaptureEvent) {
        // receiver gone means the host stopped listening
        let _ = self.send(event);
    }
}

impl EventSink for Vec<CaptureEvent> {
    fn emit(&mut self, event: CaptureEvent) {
        self.push(event);
    }
}
