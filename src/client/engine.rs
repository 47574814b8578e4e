//! Connection engine actor.
//!
//! One task per connector owns the broker link end to end: it dials
//! the transport, frames MQTT 3.1.1 packets over the raw byte stream,
//! tracks in-flight exchanges as flows, keeps the session alive and
//! feeds every device report into the consumption queue. Callers talk
//! to it through [`super::handle::FbMqttClient`].

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use rumqttc::mqttbytes::v4::{
    self, Connect, Login, Packet, PubAck, PubRec, Publish, Subscribe, SubscribeFilter,
    Unsubscribe,
};
use rumqttc::mqttbytes::{self, Protocol, QoS};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::message::{DeviceProperty, Envelope, Message};
use crate::queue::MessageQueue;
use crate::storage::DeviceStorage;
use crate::topic::{parser, API_PREFIX, API_V1_VERSION_PREFIX};

use super::config::ConnectorConfig;
use super::error::EngineError;
use super::flow::{Flow, FlowCode};
use super::handle::{EngineController, FbMqttClient};
use super::transport::Transport;

const COMMAND_CHANNEL_CAPACITY: usize = 100;
const MAX_PACKET_SIZE: usize = 64 * 1024;
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(1);

/// Broker system topic carrying the broker's own log stream.
const SYS_LOG_PREFIX: &str = "$SYS/broker/log/";

/// Narrowest and widest report shapes under the convention prefix, in
/// topic levels below the version segment.
const DEVICE_TOPIC_DEPTHS: std::ops::RangeInclusive<usize> = 2..=7;

pub(crate) type Reply = oneshot::Sender<Result<(), EngineError>>;

#[derive(Debug)]
pub(crate) enum Command {
    Connect(Reply),
    Disconnect(Reply),
    Publish {
        topic: String,
        payload: Bytes,
        qos: QoS,
        retain: bool,
        reply: Reply,
    },
    Subscribe {
        filter: SubscribeFilter,
        reply: Reply,
    },
    Unsubscribe {
        topic: String,
        reply: Reply,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

pub struct Engine<T: Transport> {
    config: ConnectorConfig,
    transport: T,
    stream: Option<T::Stream>,
    read_buf: BytesMut,
    state: SessionState,
    flows: Vec<Flow>,
    next_pkid: u16,
    queue: Arc<MessageQueue>,
    storage: Arc<dyn DeviceStorage>,
    command_rx: mpsc::Receiver<Command>,
    shutdown_rx: oneshot::Receiver<()>,
    ping: Interval,
    housekeeping: Interval,
}

impl<T: Transport> Engine<T> {
    pub fn spawn(
        config: ConnectorConfig,
        transport: T,
        queue: Arc<MessageQueue>,
        storage: Arc<dyn DeviceStorage>,
    ) -> (FbMqttClient, EngineController) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        // Ping well inside the keep-alive window so the broker never
        // evicts an idle but healthy session
        let mut ping = tokio::time::interval(config.keep_alive.mul_f64(0.75));
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let flow_timeout = config.flow_timeout;

        let actor = Self {
            config,
            transport,
            stream: None,
            read_buf: BytesMut::new(),
            state: SessionState::Disconnected,
            flows: Vec::new(),
            next_pkid: 1,
            queue,
            storage,
            command_rx,
            shutdown_rx,
            ping,
            housekeeping,
        };

        let join_handle = tokio::spawn(async move { actor.run().await });

        (
            FbMqttClient::new(command_tx, flow_timeout),
            EngineController::new(shutdown_tx, join_handle),
        )
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = &mut self.shutdown_rx => {
                    info!("connection engine: shutdown signal received");
                    break;
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            info!("connection engine: command channel closed, exiting");
                            break;
                        }
                    }
                }
                read = Self::transport_read(&mut self.stream, &mut self.read_buf) => {
                    match read {
                        Ok(0) => self.handle_close("connection closed by broker").await,
                        Ok(_) => self.process_buffer().await,
                        Err(error) => {
                            warn!(error = %error, "transport read failed");
                            self.handle_close("transport failure").await;
                        }
                    }
                }
                _ = self.ping.tick() => self.handle_ping_tick().await,
                _ = self.housekeeping.tick() => self.expire_stale_flows(),
            }
        }

        if self.state == SessionState::Connected {
            let _ = self.write_packet(&Packet::Disconnect).await;
            self.state = SessionState::Disconnecting;
        }
        self.handle_close("engine shutting down").await;
        info!("connection engine: exiting run loop");
    }

    /// Reads more bytes off the broker link; parks forever while no
    /// link exists so the select loop ignores this branch.
    async fn transport_read(
        stream: &mut Option<T::Stream>,
        buf: &mut BytesMut,
    ) -> io::Result<usize> {
        match stream.as_mut() {
            Some(stream) => stream.read_buf(buf).await,
            None => std::future::pending().await,
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => self.handle_connect(reply).await,
            Command::Disconnect(reply) => self.handle_disconnect(reply).await,
            Command::Publish {
                topic,
                payload,
                qos,
                retain,
                reply,
            } => {
                if self.state != SessionState::Connected {
                    let _ = reply.send(Err(EngineError::NotConnected));
                    return;
                }

                let pkid = match qos {
                    QoS::AtMostOnce => 0,
                    _ => self.allocate_pkid(),
                };
                let packet = Publish {
                    dup: false,
                    qos,
                    retain,
                    topic,
                    pkid,
                    payload,
                };

                self.start_flow(Flow::publish(packet, reply)).await;
            }
            Command::Subscribe { filter, reply } => {
                if self.state != SessionState::Connected {
                    let _ = reply.send(Err(EngineError::NotConnected));
                    return;
                }

                let packet = Subscribe {
                    pkid: self.allocate_pkid(),
                    filters: vec![filter],
                };

                self.start_flow(Flow::subscribe(packet, Some(reply))).await;
            }
            Command::Unsubscribe { topic, reply } => {
                if self.state != SessionState::Connected {
                    let _ = reply.send(Err(EngineError::NotConnected));
                    return;
                }

                let packet = Unsubscribe {
                    pkid: self.allocate_pkid(),
                    topics: vec![topic],
                };

                self.start_flow(Flow::unsubscribe(packet, Some(reply))).await;
            }
        }
    }

    async fn handle_connect(&mut self, reply: Reply) {
        if self.state != SessionState::Disconnected {
            let _ = reply.send(Err(EngineError::AlreadyConnected));
            return;
        }

        info!(
            host = %self.config.host,
            port = self.config.port,
            client_id = %self.config.client_id,
            "connecting to broker"
        );

        match self
            .transport
            .connect(&self.config.host, self.config.port)
            .await
        {
            Ok(stream) => {
                self.stream = Some(stream);
                self.read_buf.clear();
                self.state = SessionState::Connecting;

                let packet = self.connect_packet();
                self.start_flow(Flow::connect(packet, reply)).await;
            }
            Err(error) => {
                warn!(error = %error, "broker connection failed");
                let _ = reply.send(Err(error.into()));
            }
        }
    }

    fn connect_packet(&self) -> Connect {
        let login = match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) => Some(Login {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        Connect {
            protocol: Protocol::V4,
            keep_alive: self.config.keep_alive.as_secs() as u16,
            client_id: self.config.client_id.clone(),
            clean_session: true,
            last_will: None,
            login,
        }
    }

    async fn handle_disconnect(&mut self, reply: Reply) {
        if self.state != SessionState::Connected {
            let _ = reply.send(Err(EngineError::NotConnected));
            return;
        }

        let _ = self.write_packet(&Packet::Disconnect).await;
        self.state = SessionState::Disconnecting;
        self.handle_close("disconnect requested").await;

        let _ = reply.send(Ok(()));
    }

    /// Tears the session down: fails every in-flight flow and records
    /// all of the connector's devices as unreachable.
    async fn handle_close(&mut self, reason: &str) {
        let was_up = matches!(
            self.state,
            SessionState::Connected | SessionState::Disconnecting
        );

        if self.stream.is_none() && self.flows.is_empty() && !was_up {
            return;
        }

        info!(reason, "closing broker session");

        self.stream = None;
        self.read_buf.clear();
        self.state = SessionState::Disconnected;

        for mut flow in self.flows.drain(..) {
            if !flow.is_silent() {
                warn!(flow = flow.code().as_str(), "failing in-flight flow");
            }
            flow.fail(EngineError::ConnectionClosed);
        }

        if was_up {
            if let Err(error) = self.storage.mark_all_disconnected(self.config.connector) {
                warn!(error = %error, "failed to mark devices disconnected");
            }
        }
    }

    async fn process_buffer(&mut self) {
        loop {
            match v4::read(&mut self.read_buf, MAX_PACKET_SIZE) {
                Ok(packet) => self.handle_packet(packet).await,
                Err(mqttbytes::Error::InsufficientBytes(_)) => break,
                Err(error) => {
                    warn!(error = %error, "unparseable bytes from broker");
                    self.handle_close("protocol violation").await;
                    break;
                }
            }

            if self.stream.is_none() {
                break;
            }
        }
    }

    async fn handle_packet(&mut self, packet: Packet) {
        if let Some(position) = self.flows.iter().position(|flow| flow.accept(&packet)) {
            let mut flow = self.flows.swap_remove(position);

            if let Some(response) = flow.next(&packet) {
                if let Err(error) = self.write_packet(&response).await {
                    warn!(error = %error, "failed to answer flow packet");
                    flow.fail(error);
                    self.handle_close("write failure").await;
                    return;
                }
            }

            if let Some(publish) = flow.take_message() {
                self.accept_publish(&publish);
            }

            if flow.code() == FlowCode::Connect && flow.is_finished() {
                if flow.is_success() {
                    self.on_connected().await;
                } else {
                    warn!(
                        error = flow.error_message().unwrap_or("unknown"),
                        "broker refused connection"
                    );
                    self.handle_close("connection refused").await;
                }
                return;
            }

            if !flow.is_finished() {
                self.flows.push(flow);
            }

            return;
        }

        match packet {
            Packet::Publish(publish) => self.handle_publish(publish).await,
            Packet::PingReq => {
                let _ = self.write_packet(&Packet::PingResp).await;
            }
            other => {
                warn!(packet = ?other, "packet matched no in-flight flow");
            }
        }
    }

    async fn on_connected(&mut self) {
        self.state = SessionState::Connected;
        self.ping.reset();
        info!(client_id = %self.config.client_id, "broker session established");

        let mut filters = vec![SubscribeFilter {
            path: format!("{SYS_LOG_PREFIX}#"),
            qos: QoS::AtMostOnce,
        }];
        for depth in DEVICE_TOPIC_DEPTHS {
            let mut path = format!("{API_PREFIX}{API_V1_VERSION_PREFIX}");
            for _ in 0..depth {
                path.push_str("/+");
            }
            filters.push(SubscribeFilter {
                path,
                qos: QoS::AtMostOnce,
            });
        }

        let packet = Subscribe {
            pkid: self.allocate_pkid(),
            filters,
        };

        self.start_flow(Flow::subscribe(packet, None)).await;
    }

    async fn handle_publish(&mut self, publish: Publish) {
        match publish.qos {
            QoS::AtMostOnce => self.accept_publish(&publish),
            QoS::AtLeastOnce => {
                let ack = Packet::PubAck(PubAck { pkid: publish.pkid });
                if let Err(error) = self.write_packet(&ack).await {
                    warn!(error = %error, "failed to acknowledge publish");
                    self.handle_close("write failure").await;
                    return;
                }
                self.accept_publish(&publish);
            }
            QoS::ExactlyOnce => {
                let received = Packet::PubRec(PubRec {
                    pkid: publish.pkid,
                });
                if let Err(error) = self.write_packet(&received).await {
                    warn!(error = %error, "failed to acknowledge publish");
                    self.handle_close("write failure").await;
                    return;
                }
                // Delivery waits for the broker's release
                self.flows.push(Flow::incoming(publish));
            }
        }
    }

    fn accept_publish(&mut self, publish: &Publish) {
        let payload = String::from_utf8_lossy(&publish.payload);

        if publish.topic.starts_with(SYS_LOG_PREFIX) {
            self.handle_sys_message(&publish.topic, &payload);
            return;
        }

        match parser::parse(
            self.config.connector,
            &publish.topic,
            &payload,
            publish.retain,
        ) {
            Ok(message) => self.queue.append(message),
            Err(error) => {
                debug!(
                    topic = %publish.topic,
                    error = %error,
                    "ignoring unparseable publish"
                );
            }
        }
    }

    /// Relays the broker's own log stream and turns its new-client
    /// notice into an `ip-address` property report for the device.
    fn handle_sys_message(&mut self, topic: &str, payload: &str) {
        match topic.strip_prefix(SYS_LOG_PREFIX) {
            Some("E") => warn!(log = payload, "broker error"),
            Some(_) => info!(log = payload, "broker log"),
            None => {}
        }

        if let Some((address, client)) = parse_client_connected_notice(payload) {
            let envelope = Envelope::new(self.config.connector, client, false);
            let mut property = DeviceProperty::new(envelope, "ip-address");
            property.set_value(address);

            self.queue.append(Message::DeviceProperty(property));
        }
    }

    async fn handle_ping_tick(&mut self) {
        if self.state != SessionState::Connected {
            return;
        }

        if self.flows.iter().any(|flow| flow.code() == FlowCode::Ping) {
            warn!("previous keep-alive ping still unanswered");
            return;
        }

        debug!("sending keep-alive ping");
        self.start_flow(Flow::ping()).await;
    }

    fn expire_stale_flows(&mut self) {
        let timeout = self.config.flow_timeout;
        let now = Instant::now();

        for flow in &mut self.flows {
            if now.duration_since(flow.started_at()) >= timeout && !flow.is_finished() {
                warn!(flow = flow.code().as_str(), "expiring stale flow");
                flow.fail(EngineError::Timeout);
            }
        }

        self.flows.retain(|flow| !flow.is_finished());
    }

    /// Writes the flow's opening packet and parks the flow until its
    /// acknowledgement arrives.
    async fn start_flow(&mut self, mut flow: Flow) {
        if let Some(packet) = flow.start() {
            if let Err(error) = self.write_packet(&packet).await {
                warn!(
                    flow = flow.code().as_str(),
                    error = %error,
                    "failed to open flow"
                );
                flow.fail(error);
                self.handle_close("write failure").await;
                return;
            }

            flow.written();
        }

        if !flow.is_finished() {
            self.flows.push(flow);
        }
    }

    async fn write_packet(&mut self, packet: &Packet) -> Result<(), EngineError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(EngineError::NotConnected);
        };

        let mut buf = BytesMut::new();
        encode(packet, &mut buf)?;
        stream.write_all(&buf).await?;

        Ok(())
    }

    fn allocate_pkid(&mut self) -> u16 {
        let pkid = self.next_pkid;
        self.next_pkid = if self.next_pkid == u16::MAX {
            1
        } else {
            self.next_pkid + 1
        };

        pkid
    }
}

fn encode(packet: &Packet, buf: &mut BytesMut) -> Result<(), EngineError> {
    let written = match packet {
        Packet::Connect(connect) => connect.write(buf),
        Packet::Publish(publish) => publish.write(buf),
        Packet::Subscribe(subscribe) => subscribe.write(buf),
        Packet::Unsubscribe(unsubscribe) => unsubscribe.write(buf),
        Packet::PubAck(ack) => ack.write(buf),
        Packet::PubRec(rec) => rec.write(buf),
        Packet::PubRel(rel) => rel.write(buf),
        Packet::PubComp(comp) => comp.write(buf),
        // Two-byte fixed-header-only packets
        Packet::PingReq => {
            buf.put_slice(&[0xC0, 0x00]);
            Ok(2)
        }
        Packet::PingResp => {
            buf.put_slice(&[0xD0, 0x00]);
            Ok(2)
        }
        Packet::Disconnect => {
            buf.put_slice(&[0xE0, 0x00]);
            Ok(2)
        }
        other => {
            return Err(EngineError::Protocol(format!(
                "cannot encode broker-side packet {other:?}"
            )));
        }
    };

    written.map_err(|error| EngineError::Protocol(error.to_string()))?;

    Ok(())
}

/// Extracts `(address, client id)` from the broker's
/// "New client connected from <addr> as <client> (...)" notice.
fn parse_client_connected_notice(payload: &str) -> Option<(String, String)> {
    let rest = payload.split("New client connected from ").nth(1)?;
    let (address, rest) = rest.split_once(" as ")?;
    let client = rest.split_whitespace().next()?.trim_end_matches('.');

    if address.is_empty() || client.is_empty() {
        return None;
    }

    Some((address.to_owned(), client.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::parse_client_connected_notice;

    #[test]
    fn extracts_address_and_client_from_broker_notice() {
        let payload =
            "1612345678: New client connected from 192.168.1.10 as device-name (c1, k15).";

        assert_eq!(
            parse_client_connected_notice(payload),
            Some(("192.168.1.10".to_owned(), "device-name".to_owned()))
        );

        assert_eq!(parse_client_connected_notice("1612345678: Socket error"), None);
    }
}
