// src/sensor.rs
// Bounded random-walk model behind the simulated weather station

use crate::config::SimulatorConfig;
use crate::reading::{round1, Reading};
use chrono::Timelike;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use tracing::debug;

/// Indoor temperature envelope, °C
pub const TEMP_ROOM_RANGE: RangeInclusive<f64> = 22.0..=28.0;
/// Indoor relative humidity envelope, %
pub const HUM_ROOM_RANGE: RangeInclusive<f64> = 40.0..=80.0;
/// Outdoor temperature envelope, °C
pub const TEMP_OUT_RANGE: RangeInclusive<f64> = 25.0..=35.0;
/// Light level envelope while the sun is up
pub const LUX_DAY_RANGE: RangeInclusive<f64> = 100.0..=2000.0;
/// Light level envelope at night
pub const LUX_NIGHT_RANGE: RangeInclusive<f64> = 0.0..=50.0;
/// Light level envelope over a full day
pub const LUX_RANGE: RangeInclusive<f64> = 0.0..=2000.0;
/// Raw LDR reading envelope
pub const LDR_RAW_RANGE: RangeInclusive<i32> = 0..=4000;
/// Local hours (inclusive) treated as daytime
pub const DAY_HOURS: RangeInclusive<u32> = 6..=18;

/// Source of the random deltas applied on each step.
///
/// Every [`rand::Rng`] is a noise source, so a seeded `StdRng` gives
/// reproducible sequences.
pub trait NoiseSource {
    /// Sample uniformly from `[low, high]`.
    fn uniform(&mut self, low: f64, high: f64) -> f64;
}

impl<R: Rng + ?Sized> NoiseSource for R {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.gen_range(low..=high)
    }
}

/// Wall clock used for the day/night branch and reading timestamps.
pub trait Clock {
    /// Local hour of day, 0-23
    fn local_hour(&self) -> u32;

    /// Current Unix time in seconds
    fn unix_timestamp(&self) -> i64;
}

/// The host's clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn local_hour(&self) -> u32 {
        chrono::Local::now().hour()
    }

    fn unix_timestamp(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock frozen at a given hour and timestamp, for replays and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    pub hour: u32,
    pub timestamp: i64,
}

impl Clock for FixedClock {
    fn local_hour(&self) -> u32 {
        self.hour
    }

    fn unix_timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// The five correlated state variables, at full precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorState {
    pub temp_room: f64,
    pub hum_room: f64,
    pub temp_out: f64,
    pub lux: f64,
    pub ldr_raw: i32,
}

impl Default for SensorState {
    fn default() -> Self {
        Self {
            temp_room: 25.0,
            hum_room: 60.0,
            temp_out: 28.0,
            lux: 500.0,
            ldr_raw: 1000,
        }
    }
}

impl SensorState {
    /// Pull every field into its full-day envelope.
    ///
    /// `ldr_raw` is re-derived from the clamped `lux` with zero noise.
    pub fn clamped(self) -> Self {
        let lux = clamp(self.lux, &LUX_RANGE);
        Self {
            temp_room: clamp(self.temp_room, &TEMP_ROOM_RANGE),
            hum_room: clamp(self.hum_room, &HUM_ROOM_RANGE),
            temp_out: clamp(self.temp_out, &TEMP_OUT_RANGE),
            lux,
            ldr_raw: ldr_from_lux(lux, 0.0),
        }
    }

    /// Advance every variable by one step of the bounded random walk.
    ///
    /// The noise source is sampled exactly six times, in field order:
    /// temp_room, hum_room, temp_out, lux, then the LDR noise.
    pub fn step<N: NoiseSource + ?Sized>(&mut self, noise: &mut N, hour: u32) {
        self.temp_room = clamp(self.temp_room + noise.uniform(-0.5, 0.5), &TEMP_ROOM_RANGE);
        self.hum_room = clamp(self.hum_room + noise.uniform(-2.0, 2.0), &HUM_ROOM_RANGE);
        self.temp_out = clamp(self.temp_out + noise.uniform(-1.0, 1.0), &TEMP_OUT_RANGE);

        if is_daytime(hour) {
            self.lux = clamp(self.lux + noise.uniform(-50.0, 100.0), &LUX_DAY_RANGE);
        } else {
            self.lux = (self.lux - noise.uniform(0.0, 20.0)).max(*LUX_NIGHT_RANGE.start());
            self.lux = self.lux.min(*LUX_NIGHT_RANGE.end());
        }

        self.ldr_raw = ldr_from_lux(self.lux, noise.uniform(-100.0, 100.0));
    }
}

/// Whether `hour` falls in the daytime branch of the light model.
pub fn is_daytime(hour: u32) -> bool {
    DAY_HOURS.contains(&hour)
}

/// Derive the raw LDR value from a light level and a noise sample.
pub fn ldr_from_lux(lux: f64, noise: f64) -> i32 {
    let raw = (lux * 2.0 + noise).round() as i64;
    raw.clamp(
        i64::from(*LDR_RAW_RANGE.start()),
        i64::from(*LDR_RAW_RANGE.end()),
    ) as i32
}

fn clamp(value: f64, range: &RangeInclusive<f64>) -> f64 {
    value.max(*range.start()).min(*range.end())
}

/// Stateful sensor model owned by the publisher for the process lifetime.
pub struct SensorModel<N = StdRng, C = SystemClock> {
    state: SensorState,
    noise: N,
    clock: C,
}

impl SensorModel {
    /// Build the default model from configuration.
    ///
    /// A configured seed gives a reproducible sequence, otherwise the
    /// generator is seeded from OS entropy.
    pub fn from_config(config: &SimulatorConfig) -> Self {
        let noise = match config.seed {
            Some(seed) => {
                debug!("Seeding sensor noise with {}", seed);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };

        SensorModel::new(config.initial.into(), noise, SystemClock)
    }
}

impl<N: NoiseSource, C: Clock> SensorModel<N, C> {
    /// Create a model starting from `initial`, clamped into its envelope.
    pub fn new(initial: SensorState, noise: N, clock: C) -> Self {
        Self {
            state: initial.clamped(),
            noise,
            clock,
        }
    }

    /// Advance one step using the clock's current local hour.
    pub fn advance(&mut self) {
        let hour = self.clock.local_hour();
        self.state.step(&mut self.noise, hour);
    }

    /// Rounded, timestamped copy of the current state.
    pub fn snapshot(&self) -> Reading {
        Reading {
            temp_room: round1(self.state.temp_room),
            hum_room: round1(self.state.hum_room),
            temp_out: round1(self.state.temp_out),
            lux: round1(self.state.lux),
            ldr_raw: self.state.ldr_raw,
            timestamp: self.clock.unix_timestamp(),
        }
    }

    /// Full-precision state
    pub fn state(&self) -> &SensorState {
        &self.state
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}
