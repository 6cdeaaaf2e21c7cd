mod common;

use common::{drain, FakeCamera};
use pose_capture::{CaptureConfig, CaptureController, CaptureEvent, Stage};
use proptest::prelude::*;
use std::sync::mpsc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Op {
    Start,
    Cancel,
    Retake,
    Confirm,
    Close,
    Advance(u64),
    Pose(u32),
    Deny(bool),
    FailSnapshot,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Start),
        1 => Just(Op::Cancel),
        1 => Just(Op::Retake),
        1 => Just(Op::Confirm),
        1 => Just(Op::Close),
        6 => (0u64..4000).prop_map(Op::Advance),
        1 => (1u32..5).prop_map(Op::Pose),
        1 => any::<bool>().prop_map(Op::Deny),
        1 => Just(Op::FailSnapshot),
    ]
}

proptest! {
    #[test]
    fn session_invariants_hold(
        ops in prop::collection::vec(op(), 1..60),
        pose_count in 1u32..5,
        countdown_start in 0u32..4,
        snapshot_retries in 0u32..3,
    ) {
        let cfg = CaptureConfig {
            pose_count,
            countdown_start,
            snapshot_retries,
            ..CaptureConfig::default()
        };
        let camera = FakeCamera::default();
        let (tx, rx) = mpsc::channel();
        let mut c = CaptureController::new(cfg, Box::new(camera.clone()), tx).unwrap();
        let mut now = Instant::now();
        let mut last: Option<(u64, u32)> = None;

        for op in ops {
            let mut retook = false;
            match op {
                Op::Start => { let _ = c.start(now); }
                Op::Cancel => {
                    if c.cancel().is_ok() {
                        drain(&rx);
                        let _ = c.poll(now + Duration::from_secs(3600));
                        prop_assert!(drain(&rx).is_empty());
                    }
                }
                Op::Retake => retook = c.retake(now).is_ok(),
                Op::Confirm => {
                    if let Ok(image) = c.confirm() {
                        prop_assert!(!image.is_empty());
                    }
                }
                Op::Close => c.close(),
                Op::Advance(ms) => {
                    now += Duration::from_millis(ms);
                    while let Some(due) = c.next_deadline() {
                        if due > now {
                            break;
                        }
                        let _ = c.poll(due);
                    }
                }
                Op::Pose(pose) => { let _ = c.pose_confirmed(pose, now); }
                Op::Deny(deny) => camera.set_deny(deny),
                Op::FailSnapshot => camera.fail_next(1),
            }

            for event in drain(&rx) {
                if let CaptureEvent::StageChanged(s) = event {
                    prop_assert_eq!(s.captured_image().is_some(), s.stage() == Stage::Captured);
                }
            }

            match c.session() {
                Some(s) => {
                    prop_assert_eq!(s.captured_image().is_some(), s.stage() == Stage::Captured);
                    prop_assert!(s.pose_index() >= 1 && s.pose_index() <= pose_count);
                    if let Stage::Detecting(n) = s.stage() {
                        prop_assert_eq!(n, s.pose_index());
                    }
                    prop_assert_eq!(camera.is_open(), s.camera_ready());
                    if let Some((id, pose)) = last {
                        if id == s.id() && !retook {
                            prop_assert!(s.pose_index() >= pose);
                        }
                    }
                    last = Some((s.id(), s.pose_index()));
                }
                None => {
                    prop_assert!(c.next_deadline().is_none());
                    prop_assert!(!camera.is_open());
                    last = None;
                }
            }
        }
    }

    #[test]
    fn retake_always_returns_to_first_pose(pose_count in 1u32..5, dwell_ms in 0u64..3000) {
        let cfg = CaptureConfig { pose_count, dwell_ms, ..CaptureConfig::default() };
        let camera = FakeCamera::default();
        let (tx, _rx) = mpsc::channel();
        let mut c = CaptureController::new(cfg, Box::new(camera.clone()), tx).unwrap();
        let base = Instant::now();
        c.start(base).unwrap();
        let mut now = base;
        while c.session().map(|s| s.stage()) != Some(Stage::Captured) {
            let due = c.next_deadline().unwrap();
            now = due;
            c.poll(due).unwrap();
        }
        prop_assert_eq!(c.retake(now).unwrap(), Stage::Detecting(1));
        let s = c.session().unwrap();
        prop_assert!(s.captured_image().is_none());
        prop_assert_eq!(s.pose_index(), 1);
    }
}
