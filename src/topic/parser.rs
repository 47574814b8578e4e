//! Topic-to-entity parser for the v1 convention.
//!
//! `parse` runs the validator's shapes in a fixed order; the first
//! matching shape decides the concrete message kind, its capture
//! groups supply the identifiers.

use uuid::Uuid;

use super::error::{ParseError, ParseResult};
use super::validator;
use crate::message::payload;
use crate::message::{
    ChannelAttribute, ChannelProperty, DeviceAttribute, DeviceProperty, Envelope,
    ExtensionAttribute, ExtensionKind, Message, PropertyAttribute,
};

/// Parses one inbound (topic, payload) pair into a typed [`Message`].
///
/// The `retained` flag is copied verbatim onto the resulting entity;
/// it does not take part in shape matching.
pub fn parse(
    connector: Uuid,
    topic: &str,
    payload: &str,
    retained: bool,
) -> ParseResult<Message> {
    if !validator::validate(topic) {
        return Err(ParseError::UnsupportedTopic {
            topic: topic.to_owned(),
        });
    }

    if validator::validate_device_attribute(topic) {
        return parse_device_attribute(connector, topic, payload, retained);
    }

    if validator::validate_device_hardware_info(topic) {
        return parse_extension(connector, ExtensionKind::Hardware, topic, payload, retained);
    }

    if validator::validate_device_firmware_info(topic) {
        return parse_extension(connector, ExtensionKind::Firmware, topic, payload, retained);
    }

    if validator::validate_device_property(topic) {
        return parse_device_property(connector, topic, payload, retained);
    }

    if validator::validate_channel_part(topic) {
        let captures = validator::CHANNEL_PARTIAL
            .captures(topic)
            .ok_or_else(|| unsupported(topic))?;
        let device = &captures[1];

        if validator::validate_channel_attribute(topic) {
            return parse_channel_attribute(connector, device, topic, payload, retained);
        }

        if validator::validate_channel_property(topic) {
            return parse_channel_property(connector, device, topic, payload, retained);
        }
    }

    Err(unsupported(topic))
}

fn unsupported(topic: &str) -> ParseError {
    ParseError::UnsupportedTopic {
        topic: topic.to_owned(),
    }
}

fn parse_device_attribute(
    connector: Uuid,
    topic: &str,
    payload: &str,
    retained: bool,
) -> ParseResult<Message> {
    let captures = validator::DEVICE_ATTRIBUTE
        .captures(topic)
        .ok_or_else(|| unsupported(topic))?;

    let envelope = Envelope::new(connector, &captures[1], retained);
    let message = DeviceAttribute::new(envelope, &captures[2], payload)?;

    Ok(Message::DeviceAttribute(message))
}

fn parse_extension(
    connector: Uuid,
    extension: ExtensionKind,
    topic: &str,
    payload: &str,
    retained: bool,
) -> ParseResult<Message> {
    let shape = match extension {
        ExtensionKind::Hardware => &validator::DEVICE_HW_INFO,
        ExtensionKind::Firmware => &validator::DEVICE_FW_INFO,
    };

    let captures = shape.captures(topic).ok_or_else(|| unsupported(topic))?;

    let envelope = Envelope::new(connector, &captures[1], retained);
    let message = ExtensionAttribute::new(envelope, extension, &captures[2], payload)?;

    Ok(Message::ExtensionAttribute(message))
}

fn parse_device_property(
    connector: Uuid,
    topic: &str,
    payload: &str,
    retained: bool,
) -> ParseResult<Message> {
    let captures = validator::DEVICE_PROPERTY
        .captures(topic)
        .ok_or_else(|| unsupported(topic))?;

    let envelope = Envelope::new(connector, &captures[1], retained);
    let mut message = DeviceProperty::new(envelope, &captures[2]);

    match captures.get(5) {
        Some(attribute) => {
            message.add_attribute(PropertyAttribute::new(
                attribute.as_str(),
                &payload::clean_payload(payload),
            )?);
        }
        None => message.set_value(payload),
    }

    Ok(Message::DeviceProperty(message))
}

fn parse_channel_attribute(
    connector: Uuid,
    device: &str,
    topic: &str,
    payload: &str,
    retained: bool,
) -> ParseResult<Message> {
    let captures = validator::CHANNEL_ATTRIBUTE
        .captures(topic)
        .ok_or_else(|| unsupported(topic))?;

    let envelope = Envelope::new(connector, device, retained);
    let message = ChannelAttribute::new(envelope, &captures[2], &captures[3], payload)?;

    Ok(Message::ChannelAttribute(message))
}

fn parse_channel_property(
    connector: Uuid,
    device: &str,
    topic: &str,
    payload: &str,
    retained: bool,
) -> ParseResult<Message> {
    let captures = validator::CHANNEL_PROPERTY
        .captures(topic)
        .ok_or_else(|| unsupported(topic))?;

    let envelope = Envelope::new(connector, device, retained);
    let mut message = ChannelProperty::new(envelope, &captures[2], &captures[3]);

    match captures.get(6) {
        Some(attribute) => {
            message.add_attribute(PropertyAttribute::new(
                attribute.as_str(),
                &payload::clean_payload(payload),
            )?);
        }
        None => message.set_value(payload),
    }

    Ok(Message::ChannelProperty(message))
}
