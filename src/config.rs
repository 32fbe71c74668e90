//! Validated startup configuration.
//!
//! Configuration is assembled once, before any resource is opened:
//! built-in defaults, then an optional JSON config file, then CLI/environment
//! overrides. Validation enumerates the offending parameter so startup
//! failures name exactly what is missing.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::scheduler::ScheduleSettings;

const DEFAULT_RATE_HZ: f64 = 10.0;
/// Floor on the publish rate; clamping here caps the period at 10 seconds and
/// keeps a zero or negative configured rate from dividing to nonsense.
const MIN_RATE_HZ: f64 = 0.1;
const DEFAULT_START_FRAME: u64 = 0;
const DEFAULT_MQTT_ADDR: &str = "127.0.0.1:1883";
const DEFAULT_MQTT_CLIENT_ID: &str = "stereocastd";
const DEFAULT_TOPIC_PREFIX: &str = "camera";
/// Default bounded publish queue depth, one side's worth of in-flight frames.
const DEFAULT_QUEUE_CAPACITY: usize = 10;

#[derive(Debug, Deserialize, Default)]
struct StereocastConfigFile {
    left_video: Option<String>,
    right_video: Option<String>,
    rate_hz: Option<f64>,
    start_frame: Option<u64>,
    mqtt: Option<MqttConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct MqttConfigFile {
    broker_addr: Option<String>,
    client_id: Option<String>,
    topic_prefix: Option<String>,
    username: Option<String>,
    password: Option<String>,
    allow_remote: Option<bool>,
    queue_capacity: Option<usize>,
}

/// CLI/environment overrides, applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub left_video: Option<String>,
    pub right_video: Option<String>,
    pub rate_hz: Option<f64>,
    pub start_frame: Option<u64>,
    pub mqtt_broker_addr: Option<String>,
    pub mqtt_client_id: Option<String>,
    pub topic_prefix: Option<String>,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub allow_remote_mqtt: bool,
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct StereocastConfig {
    pub left_video: String,
    pub right_video: String,
    pub rate_hz: f64,
    pub start_frame: u64,
    pub mqtt: MqttSettings,
}

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub broker_addr: String,
    pub client_id: String,
    pub topic_prefix: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub allow_remote: bool,
    pub queue_capacity: usize,
}

impl StereocastConfig {
    /// Assemble the configuration from an optional JSON file plus overrides,
    /// then validate.
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => read_config_file(path)?,
            None => StereocastConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_overrides(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: StereocastConfigFile) -> Self {
        let mqtt_file = file.mqtt.unwrap_or_default();
        Self {
            left_video: file.left_video.unwrap_or_default(),
            right_video: file.right_video.unwrap_or_default(),
            rate_hz: file.rate_hz.unwrap_or(DEFAULT_RATE_HZ),
            start_frame: file.start_frame.unwrap_or(DEFAULT_START_FRAME),
            mqtt: MqttSettings {
                broker_addr: mqtt_file
                    .broker_addr
                    .unwrap_or_else(|| DEFAULT_MQTT_ADDR.to_string()),
                client_id: mqtt_file
                    .client_id
                    .unwrap_or_else(|| DEFAULT_MQTT_CLIENT_ID.to_string()),
                topic_prefix: mqtt_file
                    .topic_prefix
                    .unwrap_or_else(|| DEFAULT_TOPIC_PREFIX.to_string()),
                username: mqtt_file.username,
                password: mqtt_file.password,
                allow_remote: mqtt_file.allow_remote.unwrap_or(false),
                queue_capacity: mqtt_file.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            },
        }
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.left_video {
            self.left_video = path;
        }
        if let Some(path) = overrides.right_video {
            self.right_video = path;
        }
        if let Some(rate) = overrides.rate_hz {
            self.rate_hz = rate;
        }
        if let Some(start) = overrides.start_frame {
            self.start_frame = start;
        }
        if let Some(addr) = overrides.mqtt_broker_addr {
            self.mqtt.broker_addr = addr;
        }
        if let Some(client_id) = overrides.mqtt_client_id {
            self.mqtt.client_id = client_id;
        }
        if let Some(prefix) = overrides.topic_prefix {
            self.mqtt.topic_prefix = prefix;
        }
        if let Some(username) = overrides.mqtt_username {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = overrides.mqtt_password {
            self.mqtt.password = Some(password);
        }
        if overrides.allow_remote_mqtt {
            self.mqtt.allow_remote = true;
        }
        if let Some(capacity) = overrides.queue_capacity {
            self.mqtt.queue_capacity = capacity;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.left_video.trim().is_empty() {
            return Err(anyhow!(
                "left_video must be set (path to the left stream video file)"
            ));
        }
        if self.right_video.trim().is_empty() {
            return Err(anyhow!(
                "right_video must be set (path to the right stream video file)"
            ));
        }
        if self.mqtt.broker_addr.trim().is_empty() {
            return Err(anyhow!("mqtt broker_addr must not be empty"));
        }
        if self.mqtt.client_id.trim().is_empty() {
            return Err(anyhow!("mqtt client_id must not be empty"));
        }
        if self.mqtt.topic_prefix.trim().is_empty() {
            return Err(anyhow!("mqtt topic_prefix must not be empty"));
        }
        if self.mqtt.queue_capacity == 0 {
            return Err(anyhow!("mqtt queue_capacity must be greater than zero"));
        }
        Ok(())
    }

    /// The rate actually used for scheduling, after the 0.1 Hz floor.
    pub fn effective_rate_hz(&self) -> f64 {
        if self.rate_hz.is_finite() {
            self.rate_hz.max(MIN_RATE_HZ)
        } else {
            MIN_RATE_HZ
        }
    }

    /// Tick period derived from the effective rate; at most 10 seconds.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.effective_rate_hz())
    }

    pub fn schedule(&self) -> ScheduleSettings {
        ScheduleSettings {
            period: self.period(),
            start_frame: self.start_frame,
        }
    }
}

fn read_config_file(path: &Path) -> Result<StereocastConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(cfg)
}
