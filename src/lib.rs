//! vicenza-sim - Weather Station Sensor Simulator
//!
//! Generates plausible, slowly varying readings for the Vicenza weather
//! station (room temperature and humidity, outdoor temperature, light level
//! and the raw light-sensor value) and publishes them as JSON to an MQTT
//! topic on a fixed cadence.
//!
//! # Examples
//!
//! ```no_run
//! # #[cfg(feature = "mqtt")]
//! # async fn demo() -> vicenza_sim::Result<()> {
//! use vicenza_sim::{log_reading, Config, MqttChannel, Publisher, SensorModel};
//!
//! let config = Config::from_file("vicenza-sim.yaml")?;
//! let channel = MqttChannel::new(&config.mqtt)?;
//! let model = SensorModel::from_config(&config.simulator);
//!
//! let mut publisher = Publisher::new(channel, model, config.publish);
//! let stats = publisher.run(log_reading).await?;
//! println!("published {} readings", stats.published);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// CORE MODULES (always available)
// ============================================================================

/// Error types shared by every module
pub mod error;

/// Configuration loading, defaults and validation
pub mod config;

/// Bounded random-walk sensor model
pub mod sensor;

/// Immutable readings and their JSON payload
pub mod reading;

/// Messaging channel contract used by the publisher
pub mod channel;

/// Periodic publish loop with backoff and guaranteed cleanup
pub mod publisher;

// ============================================================================
// PROTOCOL MODULES (feature-gated)
// ============================================================================

#[cfg(feature = "mqtt")]
/// MQTT transport built on `rumqttc`
pub mod mqtt;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use channel::{PublishChannel, PublishError};
pub use config::{Config, MqttConfig, MqttQos, PublishConfig, SimulatorConfig};
pub use error::{Result, SimError};
pub use publisher::{log_reading, Publisher, PublisherStats, ShutdownHandle, TickOutcome};
pub use reading::Reading;
pub use sensor::{Clock, FixedClock, NoiseSource, SensorModel, SensorState, SystemClock};

#[cfg(feature = "mqtt")]
pub use mqtt::MqttChannel;

// ============================================================================
// BUILD INFORMATION
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information captured by build.rs
pub mod build_info {
    /// RFC 3339 timestamp of the build
    pub const BUILD_TIMESTAMP: &str = env!("VICENZA_BUILD_TIMESTAMP");

    /// `rustc --version` of the compiler used
    pub const RUSTC_VERSION: &str = env!("VICENZA_RUST_VERSION");

    /// Git commit, when built from a checkout
    pub const GIT_HASH: Option<&str> = option_env!("VICENZA_GIT_HASH");
}

/// One-line version banner for startup logs
pub fn build_info_string() -> String {
    format!(
        "v{} (commit: {}, built {})",
        VERSION,
        build_info::GIT_HASH.unwrap_or("unknown"),
        build_info::BUILD_TIMESTAMP
    )
}
