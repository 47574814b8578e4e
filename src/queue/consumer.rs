//! Consumer seam and the routing proxy.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::message::Message;
use crate::storage::StorageError;

use super::MessageQueue;

/// Consumption failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumeError {
    /// No registered consumer claimed the message. A wiring bug: the
    /// parser never emits kinds the default registration cannot route.
    #[error("no consumer registered for \"{kind}\" messages")]
    Unhandled {
        kind: &'static str,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One message handler. Exactly one registered consumer claims each
/// message kind through [`Consumer::matches`].
pub trait Consumer: Send + Sync {
    fn matches(&self, message: &Message) -> bool;

    /// Applies the message to storage. `Ok(true)` means writes were
    /// performed, `Ok(false)` means the message was skipped (unknown
    /// device, retained no-op).
    fn consume(&self, message: &Message) -> Result<bool, ConsumeError>;
}

/// Routes each message to the first consumer claiming it.
pub struct ConsumerProxy {
    consumers: Vec<Arc<dyn Consumer>>,
}

impl ConsumerProxy {
    pub fn new(consumers: Vec<Arc<dyn Consumer>>) -> Self {
        Self { consumers }
    }

    /// Registers the full consumer set, one per message kind.
    pub fn with_storage(storage: Arc<dyn crate::storage::DeviceStorage>) -> Self {
        Self::new(vec![
            Arc::new(super::DeviceAttributeConsumer::new(storage.clone())),
            Arc::new(super::ExtensionAttributeConsumer::new(storage.clone())),
            Arc::new(super::DevicePropertyConsumer::new(storage.clone())),
            Arc::new(super::ChannelAttributeConsumer::new(storage.clone())),
            Arc::new(super::ChannelPropertyConsumer::new(storage)),
        ])
    }

    pub fn consume(&self, message: &Message) -> Result<bool, ConsumeError> {
        let consumer = self
            .consumers
            .iter()
            .find(|consumer| consumer.matches(message))
            .ok_or(ConsumeError::Unhandled {
                kind: message.kind(),
            })?;

        consumer.consume(message)
    }

    /// Drains the queue until empty or the first failure.
    ///
    /// A storage failure puts the message back at the queue head so a
    /// later drain retries in arrival order. An unroutable message is a
    /// wiring bug: the error propagates without requeuing, since no
    /// retry can ever route it.
    pub fn drain(&self, queue: &MessageQueue) -> Result<usize, ConsumeError> {
        let mut consumed = 0;

        while let Some(message) = queue.dequeue() {
            match self.consume(&message) {
                Ok(applied) => {
                    if applied {
                        consumed += 1;
                    } else {
                        debug!(
                            kind = message.kind(),
                            device = message.device(),
                            "message skipped"
                        );
                    }
                }
                Err(error @ ConsumeError::Unhandled { .. }) => {
                    warn!(
                        kind = message.kind(),
                        device = message.device(),
                        error = %error,
                        "no consumer registered, halting drain"
                    );

                    return Err(error);
                }
                Err(error) => {
                    warn!(
                        kind = message.kind(),
                        device = message.device(),
                        error = %error,
                        "consumption failed, message requeued"
                    );
                    queue.requeue_front(message);

                    return Err(error);
                }
            }
        }

        Ok(consumed)
    }
}
