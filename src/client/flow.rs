//! In-flight MQTT control operations.
//!
//! Every broker exchange that spans more than one packet is tracked as
//! a [`Flow`]: the engine starts it, feeds it the inbound packets it
//! claims through [`Flow::accept`], and the flow resolves its waiter
//! exactly once when the exchange completes or the connection dies.

use std::time::Instant;

use rumqttc::mqttbytes::v4::{
    ConnectReturnCode, Packet, PubComp, PubRel, Publish, Subscribe, SubscribeReasonCode,
    Unsubscribe,
};
use tokio::sync::oneshot;

use super::error::EngineError;

/// Operation kind, for diagnostics and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCode {
    Connect,
    Ping,
    Publish,
    Subscribe,
    Unsubscribe,
    /// Inbound exactly-once publish awaiting its release.
    Message,
}

impl FlowCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowCode::Connect => "connect",
            FlowCode::Ping => "ping",
            FlowCode::Publish => "publish",
            FlowCode::Subscribe => "subscribe",
            FlowCode::Unsubscribe => "unsubscribe",
            FlowCode::Message => "message",
        }
    }
}

#[derive(Debug)]
enum FlowState {
    ConnectPending,
    PingPending,
    SubscribePending { pkid: u16 },
    UnsubscribePending { pkid: u16 },
    PublishAckPending { pkid: u16 },
    PublishRecPending { pkid: u16 },
    PublishCompPending { pkid: u16 },
    IncomingRelPending { pkid: u16 },
    Done,
}

type Completion = oneshot::Sender<Result<(), EngineError>>;

pub struct Flow {
    code: FlowCode,
    state: FlowState,
    initial: Option<Packet>,
    completion: Option<Completion>,
    /// Held inbound publish for exactly-once delivery; surrendered on
    /// release.
    message: Option<Publish>,
    /// Silent flows (keep-alive pings) skip completion reporting.
    silent: bool,
    started_at: Instant,
    succeeded: Option<bool>,
    error: Option<String>,
}

impl Flow {
    fn new(
        code: FlowCode,
        state: FlowState,
        initial: Option<Packet>,
        completion: Option<Completion>,
    ) -> Self {
        let silent = completion.is_none();

        Self {
            code,
            state,
            initial,
            completion,
            message: None,
            silent,
            started_at: Instant::now(),
            succeeded: None,
            error: None,
        }
    }

    pub fn connect(packet: rumqttc::mqttbytes::v4::Connect, completion: Completion) -> Self {
        Self::new(
            FlowCode::Connect,
            FlowState::ConnectPending,
            Some(Packet::Connect(packet)),
            Some(completion),
        )
    }

    pub fn ping() -> Self {
        Self::new(FlowCode::Ping, FlowState::PingPending, Some(Packet::PingReq), None)
    }

    /// Outgoing publish. QoS 0 flows resolve once the packet is written
    /// out; higher levels wait for their acknowledgement chain.
    pub fn publish(packet: Publish, completion: Completion) -> Self {
        use rumqttc::mqttbytes::QoS;

        let pkid = packet.pkid;
        let state = match packet.qos {
            QoS::AtMostOnce => FlowState::Done,
            QoS::AtLeastOnce => FlowState::PublishAckPending { pkid },
            QoS::ExactlyOnce => FlowState::PublishRecPending { pkid },
        };

        Self::new(
            FlowCode::Publish,
            state,
            Some(Packet::Publish(packet)),
            Some(completion),
        )
    }

    pub fn subscribe(packet: Subscribe, completion: Option<Completion>) -> Self {
        let pkid = packet.pkid;

        Self::new(
            FlowCode::Subscribe,
            FlowState::SubscribePending { pkid },
            Some(Packet::Subscribe(packet)),
            completion,
        )
    }

    pub fn unsubscribe(packet: Unsubscribe, completion: Option<Completion>) -> Self {
        let pkid = packet.pkid;

        Self::new(
            FlowCode::Unsubscribe,
            FlowState::UnsubscribePending { pkid },
            Some(Packet::Unsubscribe(packet)),
            completion,
        )
    }

    /// Inbound QoS 2 publish: held until the broker releases it.
    pub fn incoming(publish: Publish) -> Self {
        let pkid = publish.pkid;
        let mut flow = Self::new(
            FlowCode::Message,
            FlowState::IncomingRelPending { pkid },
            None,
            None,
        );
        flow.message = Some(publish);

        flow
    }

    /// Takes the packet that opens the exchange. `None` for inbound
    /// flows, which start from a received packet instead.
    pub fn start(&mut self) -> Option<Packet> {
        self.initial.take()
    }

    /// Whether this inbound packet belongs to this flow.
    pub fn accept(&self, packet: &Packet) -> bool {
        match (&self.state, packet) {
            (FlowState::ConnectPending, Packet::ConnAck(_)) => true,
            (FlowState::PingPending, Packet::PingResp) => true,
            (FlowState::SubscribePending { pkid }, Packet::SubAck(ack)) => ack.pkid == *pkid,
            (FlowState::UnsubscribePending { pkid }, Packet::UnsubAck(ack)) => {
                ack.pkid == *pkid
            }
            (FlowState::PublishAckPending { pkid }, Packet::PubAck(ack)) => ack.pkid == *pkid,
            (FlowState::PublishRecPending { pkid }, Packet::PubRec(rec)) => rec.pkid == *pkid,
            (FlowState::PublishCompPending { pkid }, Packet::PubComp(comp)) => {
                comp.pkid == *pkid
            }
            (FlowState::IncomingRelPending { pkid }, Packet::PubRel(rel)) => rel.pkid == *pkid,
            _ => false,
        }
    }

    /// Advances the exchange with a packet previously claimed through
    /// [`Flow::accept`]. Returns the packet to write in response, if
    /// the protocol asks for one.
    pub fn next(&mut self, packet: &Packet) -> Option<Packet> {
        match (&self.state, packet) {
            (FlowState::ConnectPending, Packet::ConnAck(ack)) => {
                match ack.code {
                    ConnectReturnCode::Success => self.finish(Ok(())),
                    code => self.finish(Err(EngineError::ConnectionRejected { code })),
                }

                None
            }
            (FlowState::PingPending, Packet::PingResp) => {
                self.finish(Ok(()));

                None
            }
            (FlowState::SubscribePending { .. }, Packet::SubAck(ack)) => {
                let rejected = ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure));

                if rejected {
                    self.finish(Err(EngineError::FlowFailed {
                        reason: "broker rejected subscription".to_owned(),
                    }));
                } else {
                    self.finish(Ok(()));
                }

                None
            }
            (FlowState::UnsubscribePending { .. }, Packet::UnsubAck(_)) => {
                self.finish(Ok(()));

                None
            }
            (FlowState::PublishAckPending { .. }, Packet::PubAck(_)) => {
                self.finish(Ok(()));

                None
            }
            (FlowState::PublishRecPending { pkid }, Packet::PubRec(_)) => {
                let pkid = *pkid;
                self.state = FlowState::PublishCompPending { pkid };

                Some(Packet::PubRel(PubRel { pkid }))
            }
            (FlowState::PublishCompPending { .. }, Packet::PubComp(_)) => {
                self.finish(Ok(()));

                None
            }
            (FlowState::IncomingRelPending { pkid }, Packet::PubRel(_)) => {
                let pkid = *pkid;
                self.finish(Ok(()));

                Some(Packet::PubComp(PubComp { pkid }))
            }
            _ => None,
        }
    }

    /// Surrenders the held inbound publish once the flow released it.
    pub fn take_message(&mut self) -> Option<Publish> {
        if self.is_finished() {
            self.message.take()
        } else {
            None
        }
    }

    /// Marks the opening packet as written out. Flows that need no
    /// acknowledgement (QoS 0 publishes) resolve their waiter here, so
    /// success is never reported before the bytes actually left.
    pub fn written(&mut self) {
        if self.is_finished() {
            self.complete(Ok(()));
        }
    }

    /// Aborts the exchange, resolving the waiter with `error`.
    pub fn fail(&mut self, error: EngineError) {
        self.finish(Err(error));
    }

    fn finish(&mut self, result: Result<(), EngineError>) {
        self.state = FlowState::Done;
        self.complete(result);
    }

    fn complete(&mut self, result: Result<(), EngineError>) {
        if self.succeeded.is_some() {
            return;
        }

        self.succeeded = Some(result.is_ok());
        if let Err(error) = &result {
            self.error = Some(error.to_string());
        }

        if let Some(completion) = self.completion.take() {
            // Receiver may have timed out and dropped; nothing to do
            let _ = completion.send(result);
        }
    }

    pub fn code(&self) -> FlowCode {
        self.code
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, FlowState::Done)
    }

    pub fn is_success(&self) -> bool {
        self.succeeded == Some(true)
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("code", &self.code)
            .field("state", &self.state)
            .field("silent", &self.silent)
            .finish()
    }
}
