#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vicenza_sim::{
    FixedClock, NoiseSource, PublishChannel, PublishConfig, PublishError, Publisher, Result,
    SensorModel, SensorState, SimError,
};

pub const TOPIC: &str = "vicenza/weather/data";
pub const NOON: FixedClock = FixedClock { hour: 12, timestamp: 1_700_000_000 };

/// Always returns the top of the requested range.
pub struct MaxNoise;

impl NoiseSource for MaxNoise {
    fn uniform(&mut self, _low: f64, high: f64) -> f64 {
        high
    }
}

/// In-memory stand-in for the MQTT channel.
///
/// `is_connected` first drains `status_script`, then falls back to the shared
/// `connected` flag. `wait_connected` only looks at the flag.
pub struct FakeChannel {
    connected: Arc<AtomicBool>,
    status_script: Mutex<VecDeque<bool>>,
    publish_failures: VecDeque<PublishError>,
    pub panic_on_publish: bool,
    pub fail_connect: bool,
    pub published: Vec<(String, String)>,
    pub connects: usize,
    pub shutdowns: usize,
}

impl FakeChannel {
    pub fn connected() -> Self {
        Self::with_link(true)
    }

    pub fn disconnected() -> Self {
        Self::with_link(false)
    }

    fn with_link(up: bool) -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(up)),
            status_script: Mutex::new(VecDeque::new()),
            publish_failures: VecDeque::new(),
            panic_on_publish: false,
            fail_connect: false,
            published: Vec::new(),
            connects: 0,
            shutdowns: 0,
        }
    }

    pub fn script_status(self, statuses: &[bool]) -> Self {
        self.status_script
            .lock()
            .unwrap()
            .extend(statuses.iter().copied());
        self
    }

    pub fn fail_next_publish(mut self, code: i32) -> Self {
        self.publish_failures
            .push_back(PublishError::new(code, "broker rejected publish"));
        self
    }

    pub fn link(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.connected)
    }
}

impl PublishChannel for FakeChannel {
    async fn connect(&mut self) -> Result<()> {
        self.connects += 1;
        if self.fail_connect {
            return Err(SimError::Mqtt("connection refused".to_string()));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        match self.status_script.lock().unwrap().pop_front() {
            Some(status) => status,
            None => self.connected.load(Ordering::SeqCst),
        }
    }

    async fn wait_connected(&mut self, timeout: Duration) -> bool {
        if self.connected.load(Ordering::SeqCst) {
            return true;
        }
        tokio::time::sleep(timeout).await;
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&mut self, topic: &str, payload: String) -> std::result::Result<(), PublishError> {
        if self.panic_on_publish {
            panic!("boom");
        }
        if let Some(err) = self.publish_failures.pop_front() {
            return Err(err);
        }
        self.published.push((topic.to_string(), payload));
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.shutdowns += 1;
        self.connected.store(false, Ordering::SeqCst);
    }
}

pub fn publish_config() -> PublishConfig {
    PublishConfig {
        topic: TOPIC.to_string(),
        interval_secs: 5,
        backoff_ms: 2000,
        settle_timeout_ms: 1000,
    }
}

pub fn publisher(channel: FakeChannel) -> Publisher<FakeChannel, MaxNoise, FixedClock> {
    publisher_with(channel, publish_config())
}

pub fn publisher_with(
    channel: FakeChannel,
    config: PublishConfig,
) -> Publisher<FakeChannel, MaxNoise, FixedClock> {
    let model = SensorModel::new(SensorState::default(), MaxNoise, NOON);
    Publisher::new(channel, model, config)
}
