//! Connection engine errors.

use rumqttc::mqttbytes::v4::ConnectReturnCode;
use thiserror::Error;

/// Coarse failure classification: logic errors are caller bugs, runtime
/// errors are environmental and may clear up on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Logic,
    Runtime,
}

#[derive(Error, Debug)]
pub enum EngineError {
    /// Operation requires an established session.
    #[error("client is not connected")]
    NotConnected,

    #[error("client is already connected")]
    AlreadyConnected,

    #[error("operation timed out")]
    Timeout,

    #[error("broker rejected the connection: {code:?}")]
    ConnectionRejected {
        code: ConnectReturnCode,
    },

    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),

    /// Broker sent bytes that do not frame as MQTT 3.1.1.
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("operation failed: {reason}")]
    FlowFailed {
        reason: String,
    },

    /// The link dropped while the operation was in flight.
    #[error("connection closed")]
    ConnectionClosed,

    /// The engine task is gone; the handle is unusable.
    #[error("engine terminated")]
    ChannelClosed,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotConnected | EngineError::AlreadyConnected => ErrorKind::Logic,
            _ => ErrorKind::Runtime,
        }
    }
}
