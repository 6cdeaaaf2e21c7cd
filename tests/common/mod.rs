#![allow(dead_code)]

use image::ImageFormat;
use pose_capture::{CameraSource, CaptureError, CaptureEvent, Snapshot, Stage};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::Receiver;

#[derive(Default)]
pub struct CameraState {
    pub deny: bool,
    /// Scripted snapshot results; an empty queue yields a frame.
    pub snapshots: VecDeque<Option<Snapshot>>,
    pub requests: u32,
    pub releases: u32,
    pub open: bool,
}

/// Camera whose behaviour is scripted through a shared handle.
#[derive(Clone, Default)]
pub struct FakeCamera {
    pub state: Rc<RefCell<CameraState>>,
}

impl FakeCamera {
    pub fn denying() -> Self {
        let cam = Self::default();
        cam.state.borrow_mut().deny = true;
        cam
    }

    pub fn set_deny(&self, deny: bool) {
        self.state.borrow_mut().deny = deny;
    }

    pub fn fail_next(&self, count: usize) {
        let mut state = self.state.borrow_mut();
        for _ in 0..count {
            state.snapshots.push_back(None);
        }
    }

    pub fn releases(&self) -> u32 {
        self.state.borrow().releases
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }
}

pub fn frame() -> Snapshot {
    Snapshot::new(vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3], Some(ImageFormat::Jpeg))
}

impl CameraSource for FakeCamera {
    fn request_access(&mut self) -> Result<(), CaptureError> {
        let mut state = self.state.borrow_mut();
        state.requests += 1;
        if state.deny {
            return Err(CaptureError::permission_denied());
        }
        state.open = true;
        Ok(())
    }

    fn snapshot(&mut self) -> Option<Snapshot> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return None;
        }
        state.snapshots.pop_front().unwrap_or_else(|| Some(frame()))
    }

    fn release(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.open {
            state.releases += 1;
        }
        state.open = false;
    }
}

pub fn drain(rx: &Receiver<CaptureEvent>) -> Vec<CaptureEvent> {
    rx.try_iter().collect()
}

pub fn stages(events: &[CaptureEvent]) -> Vec<Stage> {
    events
        .iter()
        .filter_map(|e| match e {
            CaptureEvent::StageChanged(s) => Some(s.stage()),
            _ => None,
        })
        .collect()
}
