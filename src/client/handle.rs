//! Public connector handle and engine lifecycle controller.

use std::time::Duration;

use bytes::Bytes;
use rumqttc::mqttbytes::v4::SubscribeFilter;
use rumqttc::mqttbytes::QoS;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::warn;

use super::engine::{Command, Reply};
use super::error::EngineError;

/// Cheap-to-clone command handle onto the connection engine.
///
/// Every call is bounded: if the engine does not answer within the
/// configured window the call fails with [`EngineError::Timeout`]
/// instead of hanging.
#[derive(Clone)]
pub struct FbMqttClient {
    command_tx: mpsc::Sender<Command>,
    timeout: Duration,
}

impl FbMqttClient {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, flow_timeout: Duration) -> Self {
        // Wait slightly past the engine's own flow expiry so its more
        // precise error wins over a bare timeout
        Self {
            command_tx,
            timeout: flow_timeout.saturating_add(Duration::from_secs(1)),
        }
    }

    pub async fn connect(&self) -> Result<(), EngineError> {
        self.request(Command::Connect).await
    }

    pub async fn disconnect(&self) -> Result<(), EngineError> {
        self.request(Command::Disconnect).await
    }

    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Bytes>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), EngineError> {
        let topic = topic.to_owned();
        let payload = payload.into();

        self.request(move |reply| Command::Publish {
            topic,
            payload,
            qos,
            retain,
            reply,
        })
        .await
    }

    pub async fn subscribe(&self, filter: &str, qos: QoS) -> Result<(), EngineError> {
        let filter = SubscribeFilter {
            path: filter.to_owned(),
            qos,
        };

        self.request(move |reply| Command::Subscribe { filter, reply })
            .await
    }

    pub async fn unsubscribe(&self, topic: &str) -> Result<(), EngineError> {
        let topic = topic.to_owned();

        self.request(move |reply| Command::Unsubscribe { topic, reply })
            .await
    }

    async fn request(
        &self,
        build: impl FnOnce(Reply) -> Command,
    ) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EngineError::ChannelClosed),
            Err(_) => Err(EngineError::Timeout),
        }
    }
}

/// Owns the engine task; dropping it leaves the task running, calling
/// [`EngineController::shutdown`] stops it cleanly.
pub struct EngineController {
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<()>,
}

impl EngineController {
    pub(crate) fn new(shutdown_tx: oneshot::Sender<()>, join_handle: JoinHandle<()>) -> Self {
        Self {
            shutdown_tx,
            join_handle,
        }
    }

    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown_tx.send(()).inspect_err(|_| {
            warn!("engine controller: shutdown signal already sent");
        });

        self.join_handle.await.inspect_err(|error| {
            warn!(error = ?error, "engine controller: engine task failed");
        })
    }
}
