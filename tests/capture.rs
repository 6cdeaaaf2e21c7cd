use pose_capture::{
    capture_once, CameraSource, CaptureConfig, CaptureError, FrameDirCamera, HostError,
};
use std::fs;
use tempfile::tempdir;

fn quick_config() -> CaptureConfig {
    CaptureConfig {
        dwell_ms: 5,
        countdown_start: 2,
        tick_ms: 5,
        ..CaptureConfig::default()
    }
}

#[test]
fn frame_dir_camera_cycles_files_unchanged() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("b.png"), b"second").unwrap();
    fs::write(dir.path().join("a.jpg"), b"first").unwrap();

    let mut cam = FrameDirCamera::new(dir.path());
    assert!(cam.snapshot().is_none());
    cam.request_access().unwrap();
    assert!(cam.is_open());

    let first = cam.snapshot().unwrap();
    assert_eq!(first.bytes(), b"first");
    assert_eq!(first.extension(), "jpg");
    assert_eq!(cam.snapshot().unwrap().bytes(), b"second");
    assert_eq!(cam.snapshot().unwrap().bytes(), b"first");

    cam.release();
    assert!(!cam.is_open());
    assert!(cam.snapshot().is_none());
}

#[test]
fn empty_frame_dir_denies_access() {
    let dir = tempdir().unwrap();
    let mut cam = FrameDirCamera::new(dir.path());
    assert!(matches!(
        cam.request_access(),
        Err(CaptureError::Permission(_))
    ));
}

#[test]
fn capture_once_writes_confirmed_photo() {
    let frames = tempdir().unwrap();
    fs::write(frames.path().join("still.jpg"), b"\xFF\xD8jpeg").unwrap();
    let out = tempdir().unwrap();
    let output = out.path().join("nested").join("photo.jpg");

    let camera = Box::new(FrameDirCamera::new(frames.path()));
    let written = capture_once(camera, quick_config(), &output).unwrap();

    assert_eq!(written, output);
    assert_eq!(fs::read(&output).unwrap(), b"\xFF\xD8jpeg");
}

#[test]
fn capture_once_reports_denied_camera() {
    let frames = tempdir().unwrap();
    let out = tempdir().unwrap();
    let output = out.path().join("photo.jpg");

    let camera = Box::new(FrameDirCamera::new(frames.path().join("missing")));
    let err = capture_once(camera, quick_config(), &output).unwrap_err();

    assert!(matches!(err, HostError::Capture(CaptureError::Permission(_))));
    assert!(!output.exists());
}

#[test]
fn capture_once_fails_when_frames_are_empty() {
    let frames = tempdir().unwrap();
    fs::write(frames.path().join("blank.jpg"), b"").unwrap();
    let out = tempdir().unwrap();
    let output = out.path().join("photo.jpg");

    let camera = Box::new(FrameDirCamera::new(frames.path()));
    let err = capture_once(camera, quick_config(), &output).unwrap_err();

    assert!(matches!(
        err,
        HostError::Capture(CaptureError::CaptureFatal { attempts: 2 })
    ));
}

#[test]
fn capture_once_reports_unwritable_output() {
    let frames = tempdir().unwrap();
    fs::write(frames.path().join("still.jpg"), b"\xFF\xD8jpeg").unwrap();
    let out = tempdir().unwrap();
    let blocked = out.path().join("file");
    fs::write(&blocked, b"").unwrap();

    let camera = Box::new(FrameDirCamera::new(frames.path()));
    let err = capture_once(camera, quick_config(), &blocked.join("photo.jpg")).unwrap_err();

    assert!(matches!(err, HostError::Io(_)));
}
