// src/channel.rs
//! The messaging channel the publisher talks to.
//!
//! The publisher only ever polls [`PublishChannel::is_connected`] and hands
//! payloads to [`PublishChannel::publish`]. Network I/O, reconnects and
//! connect/disconnect notifications belong to the implementation, which
//! typically runs them on a background task.

use crate::error::Result;
use std::time::Duration;
use thiserror::Error;

/// Client queue is closed, the background loop is gone
pub const ERR_NO_CONNECTION: i32 = 4;
/// Client queue is full, the request was not accepted
pub const ERR_QUEUE_FULL: i32 = 15;

/// A publish the channel refused.
///
/// This is an expected, recoverable failure: the reading is dropped and the
/// loop carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("publish failed with code {code}: {reason}")]
pub struct PublishError {
    pub code: i32,
    pub reason: String,
}

impl PublishError {
    pub fn new(code: i32, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Publish/subscribe transport used by [`crate::publisher::Publisher`].
#[allow(async_fn_in_trait)]
pub trait PublishChannel {
    /// Start connecting and spawn the background network loop.
    ///
    /// Returns once the attempt is under way, not when the broker has
    /// acknowledged it.
    async fn connect(&mut self) -> Result<()>;

    /// Current connection status as last seen by the background loop
    fn is_connected(&self) -> bool;

    /// Wait up to `timeout` for the broker to acknowledge the connection.
    async fn wait_connected(&mut self, timeout: Duration) -> bool;

    /// Queue `payload` for delivery on `topic`.
    async fn publish(&mut self, topic: &str, payload: String) -> std::result::Result<(), PublishError>;

    /// Stop the background loop and disconnect. Safe to call more than once.
    async fn shutdown(&mut self);
}
