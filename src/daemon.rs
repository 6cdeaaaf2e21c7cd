use crate::camera::{CameraSource, NokhwaCamera};
use crate::config::{load_config, CaptureConfig};
use crate::controller::CaptureController;
use crate::error::HostError;
use crate::event::CaptureEvent;
use crate::frame::FrameDirCamera;
use crate::ipc::{ControlMessage, Reply};
use crate::session::{CaptureSession, Snapshot, Stage};
use std::io::Write;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use std::{fs, thread};
use tracing::{debug, error, info, trace, warn};

/// How long the listener waits for a client to finish its message.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

struct Request {
    msg: ControlMessage,
    reply: Sender<Reply>,
}

/// Picks the camera backend: a frame directory when given, the webcam
/// otherwise.
pub fn build_camera(frames: Option<&Path>, cfg: &CaptureConfig) -> Box<dyn CameraSource> {
    match frames {
        Some(dir) => {
            debug!(dir = %dir.display(), "using frame directory camera");
            Box::new(FrameDirCamera::new(dir))
        }
        None => Box::new(NokhwaCamera::new(cfg)),
    }
}

fn log_events(events: &Receiver<CaptureEvent>) {
    for event in events.try_iter() {
        match event {
            CaptureEvent::StageChanged(session) => {
                debug!(id = session.id(), stage = %session.stage(), status = %session.status(), "stage changed")
            }
            CaptureEvent::Delivered(image) => info!(len = image.len(), "photo delivered"),
            CaptureEvent::Discarded => info!("session discarded"),
            CaptureEvent::Failed(err) => error!("capture failed: {err}"),
        }
    }
}

/// Writes a confirmed still to `path`, creating parent directories.
pub fn write_snapshot(path: &Path, image: &Snapshot) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, image.bytes())?;
    debug!(path = %path.display(), len = image.len(), "snapshot written");
    Ok(())
}

struct Host {
    output: PathBuf,
    delivered: u64,
}

impl Host {
    fn handle(
        &mut self,
        controller: &mut CaptureController<Sender<CaptureEvent>>,
        msg: ControlMessage,
        events: &Receiver<CaptureEvent>,
    ) -> Reply {
        let now = Instant::now();
        fire_due(controller, now);
        let result = match msg {
            ControlMessage::Start => controller.start(now).map(drop).map_err(|e| e.to_string()),
            ControlMessage::Cancel => controller.cancel().map_err(|e| e.to_string()),
            ControlMessage::Retake => controller.retake(now).map(drop).map_err(|e| e.to_string()),
            ControlMessage::Close => {
                controller.close();
                Ok(())
            }
            ControlMessage::PoseConfirmed(pose) => controller
                .pose_confirmed(pose, now)
                .map(drop)
                .map_err(|e| e.to_string()),
            ControlMessage::ReloadConfig => match controller.set_config(load_config()) {
                Ok(()) => return Reply::Ack,
                Err(e) => Err(e.to_string()),
            },
            ControlMessage::Status => Ok(()),
            ControlMessage::Confirm => {
                let id = controller.session().map(CaptureSession::id).unwrap_or(0);
                let reply = match controller.confirm_with(|image| self.store(id, image)) {
                    Ok(path) => Reply::Delivered { path },
                    Err(HostError::Io(e)) => Reply::Error {
                        message: format!("failed to save photo: {e}"),
                    },
                    Err(e) => Reply::Error {
                        message: e.to_string(),
                    },
                };
                log_events(events);
                return reply;
            }
        };
        log_events(events);
        match result {
            Ok(()) => Reply::Session(controller.session().map(CaptureSession::view)),
            Err(message) => Reply::Error { message },
        }
    }

    fn store(&mut self, id: u64, image: &Snapshot) -> Result<PathBuf, HostError> {
        let seq = self.delivered + 1;
        let path = self
            .output
            .join(format!("capture-{id}-{seq}.{}", image.extension()));
        if let Err(e) = write_snapshot(&path, image) {
            error!(path = %path.display(), "failed to save photo: {e}");
            return Err(e.into());
        }
        self.delivered = seq;
        info!(path = %path.display(), "photo saved");
        Ok(path)
    }
}

/// Fires every overdue timer so replies never show a stale stage.
fn fire_due(controller: &mut CaptureController<Sender<CaptureEvent>>, now: Instant) {
    if let Err(e) = controller.poll_due(now) {
        warn!("{e}");
    }
}

pub fn run_daemon(frames: Option<PathBuf>, output: PathBuf) {
    info!("capture service started");

    let cfg = load_config();
    debug!(?cfg, "loaded configuration");
    let camera = build_camera(frames.as_deref(), &cfg);
    let (event_tx, event_rx) = mpsc::channel();
    let mut controller = match CaptureController::new(cfg, camera, event_tx) {
        Ok(c) => c,
        Err(e) => {
            error!("invalid configuration: {e}");
            return;
        }
    };

    let sock_path = crate::ipc::socket_path();
    if fs::remove_file(&sock_path).is_ok() {
        trace!(path = %sock_path.display(), "removed stale socket");
    }
    let listener = match UnixListener::bind(&sock_path) {
        Ok(l) => {
            debug!(path = %sock_path.display(), "socket bound");
            l
        }
        Err(e) => {
            error!("failed to bind socket: {e}");
            return;
        }
    };

    let (req_tx, req_rx) = mpsc::channel::<Request>();
    debug!("starting IPC thread");
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(mut s) => {
                    trace!("connection accepted");
                    if let Err(e) = s.set_read_timeout(Some(CLIENT_TIMEOUT)) {
                        warn!("failed to set client timeout: {e}");
                    }
                    let msg = match serde_json::from_reader::<_, ControlMessage>(&mut s) {
                        Ok(m) => m,
                        Err(e) => {
                            warn!("malformed control message: {e}");
                            continue;
                        }
                    };
                    debug!(?msg, "received message");
                    let (reply_tx, reply_rx) = mpsc::channel();
                    if req_tx
                        .send(Request {
                            msg,
                            reply: reply_tx,
                        })
                        .is_err()
                    {
                        break;
                    }
                    if let Ok(reply) = reply_rx.recv() {
                        if let Err(e) = serde_json::to_writer(&mut s, &reply) {
                            error!("failed to send reply: {e}");
                        }
                        let _ = s.flush();
                    }
                }
                Err(e) => error!("failed to accept connection: {e}"),
            }
        }
    });

    let mut host = Host {
        output,
        delivered: 0,
    };
    loop {
        let received = match controller.next_deadline() {
            Some(due) => req_rx.recv_timeout(due.saturating_duration_since(Instant::now())),
            None => req_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(req) => {
                let reply = host.handle(&mut controller, req.msg, &event_rx);
                let _ = req.reply.send(reply);
            }
            Err(RecvTimeoutError::Timeout) => {
                fire_due(&mut controller, Instant::now());
                log_events(&event_rx);
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("IPC thread stopped");
                break;
            }
        }
    }
    controller.close();
}

/// Runs one session in-process: waits for the still, confirms it, and writes
/// it to `output`.
pub fn capture_once(
    camera: Box<dyn CameraSource>,
    cfg: CaptureConfig,
    output: &Path,
) -> Result<PathBuf, HostError> {
    let (tx, rx) = mpsc::channel();
    let mut controller = CaptureController::new(cfg, camera, tx)?;
    let started = controller.start(Instant::now());
    log_events(&rx);
    started?;

    loop {
        let stage = controller
            .session()
            .map(CaptureSession::stage)
            .unwrap_or(Stage::AwaitingPermission);
        if stage == Stage::Captured {
            break;
        }
        let Some(due) = controller.next_deadline() else {
            return Err(HostError::Stalled(stage));
        };
        let wait = due.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        let polled = controller.poll(Instant::now());
        log_events(&rx);
        polled?;
    }

    let delivered = controller.confirm_with(|image| {
        write_snapshot(output, image)?;
        Ok::<_, HostError>(output.to_path_buf())
    });
    log_events(&rx);
    delivered
}
