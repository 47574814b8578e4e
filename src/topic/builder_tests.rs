//! Command topic rendering and its relationship to the report grammar

use uuid::Uuid;

use super::{builder, parser, validator};
use crate::message::Message;

#[test]
fn renders_all_command_topics() {
    assert_eq!(
        builder::device_property_topic("device-name", "temperature"),
        "/fb/v1/device-name/$property/temperature/set"
    );
    assert_eq!(
        builder::device_command_topic("device-name", "reboot"),
        "/fb/v1/device-name/$control/reboot/set"
    );
    assert_eq!(
        builder::channel_property_topic("device-name", "thermostat", "target"),
        "/fb/v1/device-name/$channel/thermostat/$property/target/set"
    );
    assert_eq!(
        builder::channel_command_topic("device-name", "thermostat", "reset"),
        "/fb/v1/device-name/$channel/thermostat/$control/reset/set"
    );
}

#[test]
fn command_topics_are_never_valid_inbound_reports() {
    for topic in [
        builder::device_property_topic("device-name", "temperature"),
        builder::channel_property_topic("device-name", "thermostat", "target"),
    ] {
        assert!(!validator::validate(&topic), "accepted {topic}");
    }
}

// Property command topics reuse the report shape; stripping the `/set`
// suffix must yield a parseable property topic again.
#[test]
fn property_command_topics_round_trip_without_suffix() {
    let topic = builder::device_property_topic("device-name", "temperature");
    let report = topic.strip_suffix("/set").unwrap();

    let message = parser::parse(Uuid::new_v4(), report, "21.5", false).unwrap();

    let Message::DeviceProperty(property) = message else {
        panic!("expected device property");
    };

    assert_eq!(property.property(), "temperature");
    assert_eq!(property.value(), Some("21.5"));
}
