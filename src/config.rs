use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{env, fs, path::PathBuf};
use tracing::error;

/// Timing and camera options for a capture session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Delay before a detection stage auto-advances.
    pub dwell_ms: u64,
    pub countdown_start: u32,
    /// Number of detection stages before the countdown.
    pub pose_count: u32,
    /// Countdown period.
    pub tick_ms: u64,
    /// Extra snapshot attempts after the first one comes back empty.
    pub snapshot_retries: u32,
    pub retry_delay_ms: u64,
    pub camera_index: u32,
    pub width: u32,
    pub height: u32,
    /// Flip the still horizontally so it matches the mirrored preview.
    pub mirrored: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dwell_ms: 2500,
            countdown_start: 3,
            pose_count: 3,
            tick_ms: 1000,
            snapshot_retries: 1,
            retry_delay_ms: 0,
            camera_index: 0,
            width: 640,
            height: 480,
            mirrored: true,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pose_count == 0 {
            return Err(ConfigError::NoPoses);
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Resolution {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn config_path() -> PathBuf {
    env::var_os("POSE_CAPTURE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pose-capture.json"))
}

pub fn load_config() -> CaptureConfig {
    let path = config_path();
    if let Ok(data) = fs::read(&path) {
        match serde_json::from_slice::<CaptureConfig>(&data) {
            Ok(cfg) => match cfg.validate() {
                Ok(()) => return cfg,
                Err(e) => error!(path = %path.display(), "ignoring invalid config: {e}"),
            },
            Err(e) => error!(path = %path.display(), "failed to parse config: {e}"),
        }
    }
    CaptureConfig::default()
}

pub fn save_config(cfg: &CaptureConfig) {
    let path = config_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Ok(data) = serde_json::to_vec_pretty(cfg) {
        if let Err(e) = fs::write(&path, data) {
            error!("failed to write config: {e}");
        }
    } else {
        error!("failed to encode config");
    }
}
