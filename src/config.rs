use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{QcError, Result};
use crate::hal::{CONTROL_BOARD_PEER, DEVICE_INFO_PEER};

/// Negative, NaN or overflowing values give a zero duration; `validate`
/// rejects them before any call is made.
fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Timeout budget for a batched sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "seconds", rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Same budget regardless of sweep size
    Flat(f64),
    /// Budget multiplied by the number of requested channels
    PerChannel(f64),
}

impl TimeoutPolicy {
    pub fn timeout_for(&self, n_channels: usize) -> Duration {
        match *self {
            TimeoutPolicy::Flat(secs) => seconds(secs),
            TimeoutPolicy::PerChannel(secs) => seconds(secs * n_channels.max(1) as f64),
        }
    }

    fn seconds(&self) -> f64 {
        match *self {
            TimeoutPolicy::Flat(s) | TimeoutPolicy::PerChannel(s) => s,
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        TimeoutPolicy::Flat(5.0)
    }
}

/// Peer names and per-call timeouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub control_board_peer: String,
    pub device_info_peer: String,
    pub channel_count_timeout_s: f64,
    pub measure_timeout_s: f64,
    pub device_timeout_s: f64,
    pub sweep_timeout: TimeoutPolicy,
    pub poll_interval_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            control_board_peer: CONTROL_BOARD_PEER.to_string(),
            device_info_peer: DEVICE_INFO_PEER.to_string(),
            channel_count_timeout_s: 1.0,
            measure_timeout_s: 5.0,
            device_timeout_s: 5.0,
            sweep_timeout: TimeoutPolicy::default(),
            poll_interval_ms: 10,
        }
    }
}

impl RemoteConfig {
    pub fn channel_count_timeout(&self) -> Duration {
        seconds(self.channel_count_timeout_s)
    }

    pub fn measure_timeout(&self) -> Duration {
        seconds(self.measure_timeout_s)
    }

    pub fn device_timeout(&self) -> Duration {
        seconds(self.device_timeout_s)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Every timeout finite and positive, poll interval non-zero
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("channel_count_timeout_s", self.channel_count_timeout_s),
            ("measure_timeout_s", self.measure_timeout_s),
            ("device_timeout_s", self.device_timeout_s),
            ("sweep_timeout", self.sweep_timeout.seconds()),
        ];
        for (name, secs) in timeouts {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(QcError::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(QcError::InvalidConfig("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Default sweep parameters offered to the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepDefaults {
    pub voltage: f64,
    pub frequency: f64,
    pub n_sampling_windows: usize,
}

impl Default for SweepDefaults {
    fn default() -> Self {
        Self {
            voltage: 100.0,
            frequency: 10e3,
            n_sampling_windows: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    pub default_filename: String,
    pub hdf_root: String,
    pub save_plot: bool,
    pub open_plot: bool,
    pub compression_level: u32,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            default_filename: "channel-impedances.dqc".to_string(),
            hdf_root: String::new(),
            save_plot: true,
            open_plot: false,
            compression_level: 5,
        }
    }
}

/// Top-level configuration, stored as JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcConfig {
    pub remote: RemoteConfig,
    pub sweep: SweepDefaults,
    pub persist: PersistConfig,
}

impl QcConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| QcError::persistence(format!("Failed to read config {:?}", path), e))?;
        let config: QcConfig = serde_json::from_str(&content)
            .map_err(|e| QcError::InvalidConfig(format!("{:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| QcError::InvalidConfig(e.to_string()))?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)
            .map_err(|e| QcError::persistence("Failed to write temporary config file", e))?;
        fs::rename(&temp_path, path)
            .map_err(|e| QcError::persistence("Failed to atomically update config file", e))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.remote.validate()?;

        if !(self.sweep.voltage > 0.0 && self.sweep.frequency > 0.0) {
            return Err(QcError::InvalidConfig(
                "default voltage and frequency must be positive".into(),
            ));
        }
        if self.sweep.n_sampling_windows == 0 {
            return Err(QcError::InvalidConfig(
                "n_sampling_windows must be at least 1".into(),
            ));
        }
        if self.persist.compression_level > 9 {
            return Err(QcError::InvalidConfig(format!(
                "compression_level {} exceeds 9",
                self.persist.compression_level
            )));
        }
        Ok(())
    }
}
