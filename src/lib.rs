//! # FB MQTT Connector
//!
//! Client-side connector core for the FB MQTT v1 device convention:
//! a topic codec, an async broker connection engine and a consumption
//! pipeline that applies device reports to a pluggable registry.
//!
//! ## Features
//!
//! - **Topic codec**: validator, parser and builder for the nine
//!   `/fb/v1/...` topic shapes
//! - **Typed messages**: every inbound publish decodes into one
//!   [`Message`] entity with fail-closed payload grammar
//! - **Connection engine**: one actor task per connector owning the
//!   broker link, keep-alive and in-flight flow tracking
//! - **Consumption pipeline**: FIFO queue drained through per-kind
//!   consumers into a [`DeviceStorage`] registry
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fb_mqtt_connector::{
//!     ConnectorConfig, ConsumerProxy, Engine, InMemoryStorage, MessageQueue,
//!     TcpTransport,
//! };
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = Uuid::new_v4();
//!
//!     let storage = Arc::new(InMemoryStorage::new());
//!     storage.register_device(connector, "thermometer");
//!
//!     let queue = Arc::new(MessageQueue::new());
//!     let config = ConnectorConfig::localhost(connector);
//!
//!     let (client, controller) =
//!         Engine::spawn(config, TcpTransport, queue.clone(), storage.clone());
//!
//!     // Dial the broker; device topic subscriptions follow automatically
//!     client.connect().await?;
//!
//!     // Apply whatever the devices reported so far
//!     let proxy = ConsumerProxy::with_storage(storage);
//!     proxy.drain(&queue)?;
//!
//!     client.disconnect().await?;
//!     controller.shutdown().await?;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod client;
pub mod message;
pub mod queue;
pub mod storage;
pub mod topic;

use thiserror::Error;

// === Core Public API ===
pub use client::{
    ConnectorConfig, Engine, EngineController, EngineError, FbMqttClient, TcpTransport,
    Transport,
};
pub use message::{Envelope, Message};
pub use queue::{ConsumeError, Consumer, ConsumerProxy, MessageQueue};
pub use storage::{ConnectionState, DeviceStorage, InMemoryStorage, Owner, StorageError};
pub use topic::ParseError;

// Essential external types
pub use rumqttc::mqttbytes::QoS;

/// Coarse failure classes mirrored across the crate's error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A payload or argument violated a closed grammar.
    InvalidArgument,
    /// A topic matched none of the convention's shapes.
    ParseMessage,
    /// Caller or wiring bug; retrying cannot help.
    Logic,
    /// Environmental failure; may clear up on retry.
    Runtime,
}

/// Aggregate error for callers that do not care which layer failed.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Consume(#[from] ConsumeError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ConnectorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ConnectorError::Engine(error) => match error.kind() {
                client::ErrorKind::Logic => FailureKind::Logic,
                client::ErrorKind::Runtime => FailureKind::Runtime,
            },
            ConnectorError::Parse(ParseError::Message(_)) => FailureKind::InvalidArgument,
            ConnectorError::Parse(_) => FailureKind::ParseMessage,
            ConnectorError::Consume(ConsumeError::Unhandled { .. }) => FailureKind::Logic,
            ConnectorError::Consume(_) | ConnectorError::Storage(_) => FailureKind::Runtime,
        }
    }
}

/// Error types used throughout the library
///
/// Re-exports all error types in one convenient location for error
/// handling.
pub mod errors {
    //! All error types used in the library

    pub use crate::client::error::{EngineError, ErrorKind};
    pub use crate::message::MessageError;
    pub use crate::queue::ConsumeError;
    pub use crate::storage::StorageError;
    pub use crate::topic::ParseError;
    pub use crate::{ConnectorError, FailureKind};
}
