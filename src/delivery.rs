//! Delivery sinks for rendered lines.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::Result;

/// Something that can post one line of text to one channel.
///
/// Implementations must be safe to share between request handlers and
/// should only enqueue the line, never block on the network.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, channel: &str, text: &str) -> Result<()>;
}

/// A line as it reached a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub channel: String,
    pub text: String,
}

/// Sink that records deliveries in memory. Used by tests and for running
/// the HTTP side without an IRC connection.
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<Delivered>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Texts delivered to `channel`, in delivery order.
    pub fn texts_for(&self, channel: &str) -> Vec<String> {
        self.delivered()
            .into_iter()
            .filter(|d| d.channel == channel)
            .map(|d| d.text)
            .collect()
    }
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn deliver(&self, channel: &str, text: &str) -> Result<()> {
        if let Ok(mut guard) = self.delivered.lock() {
            guard.push(Delivered {
                channel: channel.to_string(),
                text: text.to_string(),
            });
        }
        Ok(())
    }
}
