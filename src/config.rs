// src/config.rs - Simulator configuration with YAML loading and validation

use crate::error::{Result, SimError};
use crate::sensor::{ldr_from_lux, SensorState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// MAIN CONFIGURATION
// ============================================================================

/// Main simulator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Broker connection
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Topic and timing of the publish loop
    #[serde(default)]
    pub publish: PublishConfig,

    /// Sensor model seeding and starting values
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl Config {
    /// Load and validate a YAML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file without validating it.
    ///
    /// For callers that layer overrides on top and call [`Config::validate`]
    /// themselves.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SimError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints the type system cannot express
    pub fn validate(&self) -> Result<()> {
        if self.mqtt.host.trim().is_empty() {
            return Err(SimError::Config("mqtt.host must not be empty".into()));
        }
        if self.mqtt.port == 0 {
            return Err(SimError::Config("mqtt.port must be non-zero".into()));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(SimError::Config("mqtt.client_id must not be empty".into()));
        }
        if self.mqtt.username.is_some() != self.mqtt.password.is_some() {
            return Err(SimError::Config(
                "mqtt.username and mqtt.password must be set together".into(),
            ));
        }

        let topic = &self.publish.topic;
        if topic.is_empty() {
            return Err(SimError::Config("publish.topic must not be empty".into()));
        }
        if topic.contains(['+', '#']) {
            return Err(SimError::Config(format!(
                "publish.topic '{}' must not contain MQTT wildcards",
                topic
            )));
        }
        if self.publish.interval_secs == 0 {
            return Err(SimError::Config("publish.interval_secs must be at least 1".into()));
        }
        if self.publish.backoff_ms == 0 || self.publish.backoff_ms >= self.publish.interval_ms() {
            return Err(SimError::Config(format!(
                "publish.backoff_ms ({}) must be non-zero and shorter than the {}ms interval",
                self.publish.backoff_ms,
                self.publish.interval_ms()
            )));
        }

        Ok(())
    }
}

// ============================================================================
// MQTT CONFIGURATION
// ============================================================================

/// MQTT broker connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    /// Broker port
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Client identifier
    #[serde(default = "default_mqtt_client_id")]
    pub client_id: String,

    /// Username
    #[serde(default)]
    pub username: Option<String>,

    /// Password
    #[serde(default)]
    pub password: Option<String>,

    /// Keep alive in seconds
    #[serde(default = "default_mqtt_keepalive")]
    pub keepalive_secs: u64,

    /// QoS level for published readings
    #[serde(default)]
    pub qos: MqttQos,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_mqtt_client_id(),
            username: None,
            password: None,
            keepalive_secs: default_mqtt_keepalive(),
            qos: MqttQos::default(),
        }
    }
}

impl MqttConfig {
    /// Username and password, only when both are present
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

/// MQTT QoS levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MqttQos {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

// ============================================================================
// PUBLISH LOOP CONFIGURATION
// ============================================================================

/// Topic and cadence of the publish loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Topic every reading is published to
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Seconds between ticks
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Milliseconds to wait before re-checking a disconnected broker
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,

    /// Upper bound on the wait for the first connection acknowledgment
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            interval_secs: default_interval(),
            backoff_ms: default_backoff(),
            settle_timeout_ms: default_settle_timeout(),
        }
    }
}

impl PublishConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_secs.saturating_mul(1000)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

// ============================================================================
// SIMULATOR CONFIGURATION
// ============================================================================

/// Sensor model seeding and starting values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Fixed seed for a reproducible sequence (None = OS entropy)
    #[serde(default)]
    pub seed: Option<u64>,

    /// Starting state, clamped into the sensor envelopes on load
    #[serde(default)]
    pub initial: InitialValues,
}

/// Starting values of the sensor model.
///
/// There is no starting `ldr_raw`: it is derived from `lux` like every later value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InitialValues {
    #[serde(default = "default_temp_room")]
    pub temp_room: f64,
    #[serde(default = "default_hum_room")]
    pub hum_room: f64,
    #[serde(default = "default_temp_out")]
    pub temp_out: f64,
    #[serde(default = "default_lux")]
    pub lux: f64,
}

impl Default for InitialValues {
    fn default() -> Self {
        SensorState::default().into()
    }
}

impl From<SensorState> for InitialValues {
    fn from(state: SensorState) -> Self {
        Self {
            temp_room: state.temp_room,
            hum_room: state.hum_room,
            temp_out: state.temp_out,
            lux: state.lux,
        }
    }
}

impl From<InitialValues> for SensorState {
    fn from(initial: InitialValues) -> Self {
        Self {
            temp_room: initial.temp_room,
            hum_room: initial.hum_room,
            temp_out: initial.temp_out,
            lux: initial.lux,
            ldr_raw: ldr_from_lux(initial.lux, 0.0),
        }
    }
}

// ============================================================================
// DEFAULT VALUE FUNCTIONS
// ============================================================================

fn default_mqtt_host() -> String { "127.0.0.1".to_string() }
fn default_mqtt_port() -> u16 { 1883 }
fn default_mqtt_client_id() -> String { "vicenza-sim".to_string() }
fn default_mqtt_keepalive() -> u64 { 60 }
fn default_topic() -> String { "vicenza/weather/data".to_string() }
fn default_interval() -> u64 { 5 }
fn default_backoff() -> u64 { 2000 }
fn default_settle_timeout() -> u64 { 1000 }
fn default_temp_room() -> f64 { SensorState::default().temp_room }
fn default_hum_room() -> f64 { SensorState::default().hum_room }
fn default_temp_out() -> f64 { SensorState::default().temp_out }
fn default_lux() -> f64 { SensorState::default().lux }
