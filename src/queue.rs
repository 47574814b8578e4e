//! Consumption pipeline: FIFO message queue plus registered consumers.
//!
//! Parsed messages land in [`MessageQueue`] and are drained one at a
//! time through [`ConsumerProxy`], which routes each message to the
//! single consumer claiming its kind.

pub mod channel_attribute;
pub mod consumer;
pub mod device_attribute;
pub mod extension;
pub mod property;

#[cfg(test)]
mod consumer_tests;

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::message::Message;

pub use channel_attribute::ChannelAttributeConsumer;
pub use consumer::{ConsumeError, Consumer, ConsumerProxy};
pub use device_attribute::DeviceAttributeConsumer;
pub use extension::ExtensionAttributeConsumer;
pub use property::{ChannelPropertyConsumer, DevicePropertyConsumer};

/// Unbounded FIFO buffer between the connection engine and consumers.
#[derive(Debug, Default)]
pub struct MessageQueue {
    items: Mutex<VecDeque<Message>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, message: Message) {
        debug!(
            kind = message.kind(),
            device = message.device(),
            "message queued for consumption"
        );

        self.lock().push_back(message);
    }

    pub fn dequeue(&self) -> Option<Message> {
        self.lock().pop_front()
    }

    /// Puts a message back at the head, ahead of everything queued
    /// after it. Used when consumption fails and must be retried in
    /// arrival order.
    pub fn requeue_front(&self, message: Message) {
        self.lock().push_front(message);
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Message>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
