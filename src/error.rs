use thiserror::Error;

/// Application level error type used throughout the crate.
///
/// Only faults the publisher cannot absorb end up here. A broker that is not
/// connected yet, or a single rejected publish, is handled inside the tick and
/// never becomes a `SimError`.
#[derive(Error, Debug)]
pub enum SimError {
    /// I/O related failure
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error while parsing YAML configuration files
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A reading could not be encoded as a JSON payload
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The messaging client could not be set up or started
    #[error("MQTT error: {0}")]
    Mqtt(String),

    /// Unexpected fault caught at the publisher boundary, e.g. a panic in the tick body
    #[error("Unexpected fault: {0}")]
    Fault(String),
}

/// Convenient alias over [`Result`] using [`SimError`]
pub type Result<T> = std::result::Result<T, SimError>;
