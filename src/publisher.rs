// src/publisher.rs
use crate::{
    channel::{PublishChannel, PublishError},
    config::PublishConfig,
    error::*,
    reading::Reading,
    sensor::{Clock, NoiseSource, SensorModel},
};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PublisherStats {
    pub running: bool,
    pub published: u64,
    pub failed: u64,
    pub connection_waits: u64,
    pub uptime_secs: u64,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The broker took the reading; carries the new publish count
    Published { reading: Reading, count: u64 },
    /// The channel refused the reading, which is dropped
    Dropped { reading: Reading, error: PublishError },
    /// No connection, the model was left untouched
    NotConnected,
}

/// Cloneable handle that asks a running [`Publisher`] to stop.
///
/// The publisher notices at its next loop-top check; a pending sleep is cut
/// short so an interrupt never waits out a full interval.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Stopping publisher");
        }
        self.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Periodic publish loop around one [`SensorModel`] and one channel.
pub struct Publisher<C, N, K> {
    channel: C,
    model: SensorModel<N, K>,
    config: PublishConfig,
    shutdown: ShutdownHandle,
    published: u64,
    failed: u64,
    connection_waits: u64,
    start_time: Instant,
}

impl<C, N, K> Publisher<C, N, K>
where
    C: PublishChannel,
    N: NoiseSource,
    K: Clock,
{
    pub fn new(channel: C, model: SensorModel<N, K>, config: PublishConfig) -> Self {
        Self {
            channel,
            model,
            config,
            shutdown: ShutdownHandle {
                running: Arc::new(AtomicBool::new(true)),
                wake: Arc::new(Notify::new()),
            },
            published: 0,
            failed: 0,
            connection_waits: 0,
            start_time: Instant::now(),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Connect, publish until stopped, then disconnect.
    ///
    /// `on_tick` runs after every successful publish with the reading and the
    /// running publish count. The channel is shut down on every exit path: a
    /// stop request, an error, or a panic in the loop body. Errors and panics
    /// are returned as [`SimError`] after that cleanup and are not logged here.
    pub async fn run<F>(&mut self, mut on_tick: F) -> Result<PublisherStats>
    where
        F: FnMut(&Reading, u64),
    {
        self.start_time = Instant::now();

        let outcome = AssertUnwindSafe(self.drive(&mut on_tick)).catch_unwind().await;

        self.channel.shutdown().await;
        self.shutdown.running.store(false, Ordering::SeqCst);

        let stats = self.stats();
        info!(
            "Publisher stopped: {} published, {} failed, uptime: {}s",
            stats.published, stats.failed, stats.uptime_secs
        );

        // Errors are left to the caller to report
        match outcome {
            Ok(result) => result.map(|()| stats),
            Err(panic) => Err(SimError::Fault(panic_message(panic.as_ref()))),
        }
    }

    async fn drive<F>(&mut self, on_tick: &mut F) -> Result<()>
    where
        F: FnMut(&Reading, u64),
    {
        self.channel.connect().await?;

        // A stop request cuts the settle wait short like any other sleep
        let acknowledged = tokio::select! {
            up = self.channel.wait_connected(self.config.settle_timeout()) => up,
            _ = self.shutdown.wake.notified() => false,
        };

        if acknowledged {
            info!(
                "Publishing to '{}' every {}s",
                self.config.topic, self.config.interval_secs
            );
        } else if self.shutdown.is_running() {
            warn!(
                "No connection acknowledgment within {}ms, continuing anyway",
                self.config.settle_timeout_ms
            );
        }

        while self.shutdown.is_running() {
            match self.tick().await? {
                TickOutcome::NotConnected => {
                    self.pause(self.config.backoff()).await;
                    continue;
                }
                TickOutcome::Published { reading, count } => on_tick(&reading, count),
                TickOutcome::Dropped { .. } => {}
            }

            self.pause(self.config.interval()).await;
        }

        Ok(())
    }

    /// Run one tick without sleeping.
    ///
    /// The model only advances when the channel reports a connection. Once it
    /// has advanced it stays advanced, whether or not the publish succeeds.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        if !self.channel.is_connected() {
            self.connection_waits += 1;
            warn!("Not connected to broker, waiting...");
            return Ok(TickOutcome::NotConnected);
        }

        self.model.advance();
        let reading = self.model.snapshot();
        let payload = reading.to_payload()?;

        match self.channel.publish(&self.config.topic, payload).await {
            Ok(()) => {
                self.published += 1;
                debug!("Published reading #{} to '{}'", self.published, self.config.topic);
                Ok(TickOutcome::Published {
                    reading,
                    count: self.published,
                })
            }
            Err(e) => {
                self.failed += 1;
                error!("Failed to publish reading (code {}): {}", e.code, e.reason);
                Ok(TickOutcome::Dropped { reading, error: e })
            }
        }
    }

    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.wake.notified() => {}
        }
    }

    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            running: self.shutdown.is_running(),
            published: self.published,
            failed: self.failed,
            connection_waits: self.connection_waits,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn model(&self) -> &SensorModel<N, K> {
        &self.model
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}

/// Default `on_tick` hook: one structured log line per published reading.
pub fn log_reading(reading: &Reading, count: u64) {
    info!(
        count,
        temp_room = reading.temp_room,
        hum_room = reading.hum_room,
        temp_out = reading.temp_out,
        lux = reading.lux,
        ldr_raw = reading.ldr_raw,
        timestamp = reading.timestamp,
        "Published reading #{}",
        count
    );
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
