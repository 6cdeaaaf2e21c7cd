use crate::session::SessionView;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::{env, io};

/// Host commands accepted by the capture service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ControlMessage {
    Start,
    Cancel,
    Retake,
    Confirm,
    Close,
    Status,
    PoseConfirmed(u32),
    ReloadConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Reply {
    Ack,
    Session(Option<SessionView>),
    Delivered { path: PathBuf },
    Error { message: String },
}

pub fn socket_path() -> PathBuf {
    if let Some(path) = env::var_os("POSE_CAPTURE_SOCKET") {
        return PathBuf::from(path);
    }
    env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
        .join("pose-capture.sock")
}

pub fn send_command(msg: ControlMessage) -> io::Result<Reply> {
    let path = socket_path();
    let mut stream = UnixStream::connect(&path)?;
    serde_json::to_writer(&mut stream, &msg)?;
    stream.flush()?;
    let _ = stream.shutdown(Shutdown::Write);
    let reply = serde_json::from_reader(&mut stream)?;
    Ok(reply)
}
