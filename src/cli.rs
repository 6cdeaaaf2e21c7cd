use crate::config::{load_config, save_config, CaptureConfig};
use crate::daemon::{build_camera, capture_once, run_daemon};
use crate::ipc::{send_command, ControlMessage, Reply};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "pose-capture",
    version,
    about = "Pose-gated webcam photo capture"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the capture service
    Serve {
        /// Directory of still images to use instead of the webcam
        #[arg(short, long)]
        frames: Option<PathBuf>,
        /// Directory confirmed photos are written to
        #[arg(short, long, default_value = "captures")]
        output: PathBuf,
    },
    /// Take one photo without the service and write it to a file
    Capture {
        #[arg(short, long, default_value = "photo.jpg")]
        output: PathBuf,
        #[arg(short, long)]
        frames: Option<PathBuf>,
    },
    /// Open a capture session
    Start,
    /// Abandon the running session
    Cancel,
    /// Discard the captured photo and detect again
    Retake,
    /// Accept the captured photo
    Confirm,
    /// Close the capture UI, discarding any session
    Close,
    /// Print the current session
    Status,
    /// Report that a pose was recognised
    Pose { pose: u32 },
    /// Inspect or change timing configuration
    Config {
        #[command(subcommand)]
        setting: ConfigSubcommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the stored configuration
    Show,
    /// Per-pose detection delay in milliseconds
    Dwell { ms: u64 },
    /// First countdown value
    Countdown { start: u32 },
    /// Number of poses before the countdown
    Poses { count: u32 },
    /// Snapshot retries at the capture instant
    Retries { count: u32 },
}

pub fn run_cli() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    execute(cli);
}

pub fn execute(cli: Cli) {
    match cli.command {
        Commands::Serve { frames, output } => run_daemon(frames, output),
        Commands::Capture { output, frames } => capture(output, frames),
        Commands::Start => client(ControlMessage::Start),
        Commands::Cancel => client(ControlMessage::Cancel),
        Commands::Retake => client(ControlMessage::Retake),
        Commands::Confirm => client(ControlMessage::Confirm),
        Commands::Close => client(ControlMessage::Close),
        Commands::Status => client(ControlMessage::Status),
        Commands::Pose { pose } => client(ControlMessage::PoseConfirmed(pose)),
        Commands::Config { setting } => configure(setting),
    }
}

fn client(msg: ControlMessage) {
    match send_command(msg) {
        Ok(Reply::Ack) => {}
        Ok(Reply::Session(Some(view))) => match serde_json::to_string_pretty(&view) {
            Ok(text) => println!("{text}"),
            Err(e) => error!("failed to encode session: {e}"),
        },
        Ok(Reply::Session(None)) => println!("no active session"),
        Ok(Reply::Delivered { path }) => println!("{}", path.display()),
        Ok(Reply::Error { message }) => error!("{message}"),
        Err(e) => error!("capture service unreachable: {e}"),
    }
}

fn capture(output: PathBuf, frames: Option<PathBuf>) {
    let cfg = load_config();
    let camera = build_camera(frames.as_deref(), &cfg);
    match capture_once(camera, cfg, &output) {
        Ok(path) => println!("{}", path.display()),
        Err(e) => error!("capture failed: {e}"),
    }
}

fn configure(setting: ConfigSubcommand) {
    let mut cfg = load_config();
    match setting {
        ConfigSubcommand::Show => {
            print_config(&cfg);
            return;
        }
        ConfigSubcommand::Dwell { ms } => cfg.dwell_ms = ms,
        ConfigSubcommand::Countdown { start } => cfg.countdown_start = start,
        ConfigSubcommand::Poses { count } => cfg.pose_count = count,
        ConfigSubcommand::Retries { count } => cfg.snapshot_retries = count,
    }
    if let Err(e) = cfg.validate() {
        error!("{e}");
        return;
    }
    save_config(&cfg);
    // the service may not be running
    let _ = send_command(ControlMessage::ReloadConfig);
    info!("configuration updated");
}

fn print_config(cfg: &CaptureConfig) {
    match serde_json::to_string_pretty(cfg) {
        Ok(text) => println!("{text}"),
        Err(e) => error!("failed to encode config: {e}"),
    }
}
