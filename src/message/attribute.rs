//! Device and channel attribute messages.

use super::error::MessageError;
use super::payload;
use super::Envelope;

/// Closed set of attribute names a device or channel may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeName {
    Name,
    Properties,
    State,
    Channels,
    Extensions,
    Controls,
}

impl AttributeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeName::Name => "name",
            AttributeName::Properties => "properties",
            AttributeName::State => "state",
            AttributeName::Channels => "channels",
            AttributeName::Extensions => "extensions",
            AttributeName::Controls => "controls",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "name" => Some(AttributeName::Name),
            "properties" => Some(AttributeName::Properties),
            "state" => Some(AttributeName::State),
            "channels" => Some(AttributeName::Channels),
            "extensions" => Some(AttributeName::Extensions),
            "controls" => Some(AttributeName::Controls),
            _ => None,
        }
    }

    /// List-valued attributes split their payload on commas.
    fn is_list(&self) -> bool {
        matches!(
            self,
            AttributeName::Properties
                | AttributeName::Channels
                | AttributeName::Extensions
                | AttributeName::Controls
        )
    }
}

impl std::fmt::Display for AttributeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded attribute payload: scalar or item list, per attribute kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Scalar(String),
    List(Vec<String>),
}

impl AttributeValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            AttributeValue::Scalar(value) => Some(value),
            AttributeValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttributeValue::Scalar(_) => None,
            AttributeValue::List(items) => Some(items),
        }
    }
}

fn decode_value(attribute: AttributeName, raw: &str) -> AttributeValue {
    if attribute == AttributeName::Name {
        return AttributeValue::Scalar(payload::clean_name(raw));
    }

    let cleaned = payload::clean_payload(raw);

    if attribute.is_list() {
        AttributeValue::List(payload::parse_list(&cleaned))
    } else {
        AttributeValue::Scalar(raw.to_owned())
    }
}

/// Device attribute report (`/fb/v1/<device>/$<attr>`).
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceAttribute {
    envelope: Envelope,
    attribute: AttributeName,
    value: AttributeValue,
}

impl DeviceAttribute {
    pub fn new(
        envelope: Envelope,
        attribute: &str,
        raw_payload: &str,
    ) -> Result<Self, MessageError> {
        let attribute = AttributeName::parse(attribute).ok_or_else(|| {
            MessageError::AttributeNotAllowed {
                attribute: attribute.to_owned(),
                owner: "device",
            }
        })?;

        Ok(Self {
            envelope,
            attribute,
            value: decode_value(attribute, raw_payload),
        })
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn attribute(&self) -> AttributeName {
        self.attribute
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }
}

/// Channel attribute report (`.../$channel/<channel>/$<attr>`).
///
/// Channels report a narrower attribute set than devices: only name,
/// properties and controls.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelAttribute {
    envelope: Envelope,
    channel: String,
    attribute: AttributeName,
    value: AttributeValue,
}

impl ChannelAttribute {
    pub fn new(
        envelope: Envelope,
        channel: impl Into<String>,
        attribute: &str,
        raw_payload: &str,
    ) -> Result<Self, MessageError> {
        let parsed = AttributeName::parse(attribute).filter(|name| {
            matches!(
                name,
                AttributeName::Name | AttributeName::Properties | AttributeName::Controls
            )
        });

        let attribute = parsed.ok_or_else(|| MessageError::AttributeNotAllowed {
            attribute: attribute.to_owned(),
            owner: "channel",
        })?;

        Ok(Self {
            envelope,
            channel: channel.into(),
            attribute,
            value: decode_value(attribute, raw_payload),
        })
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn attribute(&self) -> AttributeName {
        self.attribute
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }
}
