pub mod camera;
pub mod cli;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod event;
pub mod frame;
pub mod ipc;
pub mod session;
pub mod trigger;

pub use camera::{CameraSource, NokhwaCamera};
pub use cli::{execute, run_cli, Cli, Commands, ConfigSubcommand};
pub use config::{load_config, save_config, CaptureConfig};
pub use controller::CaptureController;
pub use daemon::{capture_once, write_snapshot};
pub use error::{CaptureError, ConfigError, HostError};
pub use event::{CaptureEvent, EventSink};
pub use frame::FrameDirCamera;
pub use session::{CaptureSession, SessionView, Snapshot, Stage};
pub use trigger::{ExternalTrigger, FixedDwell, PoseTrigger};
