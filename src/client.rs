//! Broker connection layer: engine actor, flows, transport seam.

pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod handle;
pub mod transport;


pub use config::ConnectorConfig;
pub use engine::Engine;
pub use error::{EngineError, ErrorKind};
pub use handle::{EngineController, FbMqttClient};
pub use transport::{TcpTransport, Transport};
