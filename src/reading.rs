// src/reading.rs
//! Immutable point-in-time readings and their wire encoding.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One published sample of the simulated weather station.
///
/// Float fields carry one decimal place. The payload on the wire is the JSON
/// object form of this struct, keys in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Indoor temperature, °C
    pub temp_room: f64,
    /// Indoor relative humidity, %
    pub hum_room: f64,
    /// Outdoor temperature, °C
    pub temp_out: f64,
    /// Ambient light level, lux
    pub lux: f64,
    /// Raw light-dependent resistor reading
    pub ldr_raw: i32,
    /// Unix time in seconds when the snapshot was taken
    pub timestamp: i64,
}

impl Reading {
    /// Encode as the JSON object published to the broker.
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Round to one decimal place, half away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
