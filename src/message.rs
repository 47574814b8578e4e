//! Typed representations of inbound FB MQTT v1 wire messages
//!
//! The parser produces exactly one [`Message`] per inbound publish; the
//! consumption pipeline consumes it exactly once. Shared addressing
//! fields live in [`Envelope`], embedded by value in every variant.

pub mod attribute;
pub mod error;
pub mod extension;
pub mod payload;
pub mod property;


use uuid::Uuid;

pub use attribute::{AttributeName, AttributeValue, ChannelAttribute, DeviceAttribute};
pub use error::MessageError;
pub use extension::{ExtensionAttribute, ExtensionKind, ExtensionParameter};
pub use property::{
    ChannelProperty, ColorModel, DataType, DeviceProperty, FormatValue,
    PropertyAttribute, PropertyAttributeName, PropertyAttributeValue,
};

/// Addressing fields shared by every message kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Connector instance this message belongs to.
    pub connector: Uuid,
    /// Device identifier captured from the topic.
    pub device: String,
    /// Broker last-known-state snapshot flag, copied verbatim from the
    /// publish packet. Drives idempotent-write behavior downstream.
    pub retained: bool,
}

impl Envelope {
    pub fn new(connector: Uuid, device: impl Into<String>, retained: bool) -> Self {
        Self {
            connector,
            device: device.into(),
            retained,
        }
    }
}

/// One decoded inbound wire message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    DeviceAttribute(DeviceAttribute),
    ExtensionAttribute(ExtensionAttribute),
    DeviceProperty(DeviceProperty),
    ChannelAttribute(ChannelAttribute),
    ChannelProperty(ChannelProperty),
}

impl Message {
    pub fn envelope(&self) -> &Envelope {
        match self {
            Message::DeviceAttribute(m) => m.envelope(),
            Message::ExtensionAttribute(m) => m.envelope(),
            Message::DeviceProperty(m) => m.envelope(),
            Message::ChannelAttribute(m) => m.envelope(),
            Message::ChannelProperty(m) => m.envelope(),
        }
    }

    pub fn device(&self) -> &str {
        &self.envelope().device
    }

    pub fn retained(&self) -> bool {
        self.envelope().retained
    }

    /// Stable name of the concrete message kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::DeviceAttribute(_) => "device-attribute",
            Message::ExtensionAttribute(_) => "extension-attribute",
            Message::DeviceProperty(_) => "device-property",
            Message::ChannelAttribute(_) => "channel-attribute",
            Message::ChannelProperty(_) => "channel-property",
        }
    }
}
