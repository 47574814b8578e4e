//! Parser dispatch coverage: one test per grammar shape plus failures

use uuid::Uuid;

use super::parser::parse;
use super::ParseError;
use crate::message::{
    AttributeName, AttributeValue, DataType, ExtensionKind, ExtensionParameter, Message,
    PropertyAttributeName, PropertyAttributeValue,
};

fn connector() -> Uuid {
    Uuid::new_v4()
}

#[test]
fn parses_device_state_attribute() {
    let message = parse(connector(), "/fb/v1/device-name/$state", "ready", false).unwrap();

    let Message::DeviceAttribute(attribute) = message else {
        panic!("expected device attribute");
    };

    assert_eq!(attribute.envelope().device, "device-name");
    assert_eq!(attribute.attribute(), AttributeName::State);
    assert_eq!(attribute.value(), &AttributeValue::Scalar("ready".to_owned()));
}

#[test]
fn parses_device_list_attribute() {
    let message = parse(
        connector(),
        "/fb/v1/device-name/$channels",
        "Thermostat, valve",
        true,
    )
    .unwrap();

    assert!(message.retained());

    let Message::DeviceAttribute(attribute) = message else {
        panic!("expected device attribute");
    };

    assert_eq!(
        attribute.value(),
        &AttributeValue::List(vec!["thermostat".to_owned(), "valve".to_owned()])
    );
}

#[test]
fn parses_hardware_and_firmware_info() {
    let message = parse(
        connector(),
        "/fb/v1/device-name/$hw/mac-address",
        "00:0A:E6:3E:FD:E1",
        false,
    )
    .unwrap();

    let Message::ExtensionAttribute(attribute) = message else {
        panic!("expected extension attribute");
    };

    assert_eq!(attribute.extension(), ExtensionKind::Hardware);
    assert_eq!(attribute.parameter(), ExtensionParameter::MacAddress);
    assert_eq!(attribute.value(), "00:0a:e6:3e:fd:e1");

    let message = parse(connector(), "/fb/v1/device-name/$fw/name", "Fastybird", false).unwrap();

    let Message::ExtensionAttribute(attribute) = message else {
        panic!("expected extension attribute");
    };

    assert_eq!(attribute.extension(), ExtensionKind::Firmware);
    assert_eq!(attribute.value(), "fastybird");
}

#[test]
fn parses_device_property_value_and_attribute() {
    let message = parse(
        connector(),
        "/fb/v1/device-name/$property/temperature",
        "21.5",
        false,
    )
    .unwrap();

    let Message::DeviceProperty(property) = message else {
        panic!("expected device property");
    };

    assert_eq!(property.property(), "temperature");
    assert_eq!(property.value(), Some("21.5"));
    assert!(property.attributes().is_empty());

    let message = parse(
        connector(),
        "/fb/v1/device-name/$property/temperature/$settable",
        "true",
        false,
    )
    .unwrap();

    let Message::DeviceProperty(property) = message else {
        panic!("expected device property");
    };

    assert_eq!(property.value(), None);
    assert_eq!(property.attributes().len(), 1);
    assert_eq!(
        property.attributes()[0].attribute(),
        PropertyAttributeName::Settable
    );
    assert_eq!(
        property.attributes()[0].value(),
        &PropertyAttributeValue::Bool(true)
    );
}

#[test]
fn parses_channel_attribute_and_property() {
    let message = parse(
        connector(),
        "/fb/v1/device-name/$channel/thermostat/$name",
        "Living room",
        false,
    )
    .unwrap();

    let Message::ChannelAttribute(attribute) = message else {
        panic!("expected channel attribute");
    };

    assert_eq!(attribute.channel(), "thermostat");
    assert_eq!(attribute.attribute(), AttributeName::Name);
    assert_eq!(
        attribute.value(),
        &AttributeValue::Scalar("Living room".to_owned())
    );

    let message = parse(
        connector(),
        "/fb/v1/device-name/$channel/thermostat/$property/target/$data-type",
        "float",
        false,
    )
    .unwrap();

    let Message::ChannelProperty(property) = message else {
        panic!("expected channel property");
    };

    assert_eq!(property.channel(), "thermostat");
    assert_eq!(property.property(), "target");
    assert_eq!(
        property.attributes()[0].value(),
        &PropertyAttributeValue::DataType(DataType::Float)
    );
}

#[test]
fn rejects_unsupported_topics() {
    let error = parse(connector(), "/fb/v1/device-name/$bogus", "x", false).unwrap_err();

    assert_eq!(
        error,
        ParseError::UnsupportedTopic {
            topic: "/fb/v1/device-name/$bogus".to_owned(),
        }
    );

    assert!(parse(connector(), "/homie/v1/device/$state", "x", false).is_err());
    assert!(parse(
        connector(),
        "/fb/v1/device-name/$property/temperature/set",
        "22",
        false
    )
    .is_err());
}

#[test]
fn propagates_payload_decode_errors() {
    let error = parse(
        connector(),
        "/fb/v1/device-name/$property/temperature/$data-type",
        "double",
        false,
    )
    .unwrap_err();

    assert!(matches!(error, ParseError::Message(_)));
}
