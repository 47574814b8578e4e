//! Grammar coverage for the topic validator

use super::validator;

#[test]
fn accepts_every_device_attribute() {
    for attribute in ["state", "name", "properties", "controls", "channels", "extensions"] {
        let topic = format!("/fb/v1/device-name/${attribute}");
        assert!(validator::validate(&topic), "rejected {topic}");
        assert!(validator::validate_device_attribute(&topic));
    }
}

#[test]
fn rejects_unknown_device_attribute() {
    assert!(!validator::validate("/fb/v1/device-name/$bogus"));
    assert!(!validator::validate("/fb/v1/device-name/name"));
}

#[test]
fn accepts_hardware_and_firmware_parameters() {
    for parameter in ["mac-address", "manufacturer", "model", "version"] {
        let topic = format!("/fb/v1/device-name/$hw/{parameter}");
        assert!(validator::validate_device_hardware_info(&topic), "rejected {topic}");
    }

    for parameter in ["manufacturer", "name", "version"] {
        let topic = format!("/fb/v1/device-name/$fw/{parameter}");
        assert!(validator::validate_device_firmware_info(&topic), "rejected {topic}");
    }

    // Parameters do not cross extension boundaries
    assert!(!validator::validate("/fb/v1/device-name/$fw/mac-address"));
    assert!(!validator::validate("/fb/v1/device-name/$hw/name"));
}

#[test]
fn accepts_property_base_and_attribute_topics() {
    assert!(validator::validate_device_property(
        "/fb/v1/device-name/$property/temperature"
    ));

    for attribute in ["name", "settable", "queryable", "data-type", "format", "unit"] {
        let topic = format!("/fb/v1/device-name/$property/temperature/${attribute}");
        assert!(validator::validate_device_property(&topic), "rejected {topic}");
    }

    assert!(!validator::validate("/fb/v1/device-name/$property/temperature/$bogus"));
}

#[test]
fn accepts_channel_shapes() {
    assert!(validator::validate_channel_attribute(
        "/fb/v1/device-name/$channel/thermostat/$name"
    ));
    assert!(validator::validate_channel_property(
        "/fb/v1/device-name/$channel/thermostat/$property/target"
    ));
    assert!(validator::validate_channel_property(
        "/fb/v1/device-name/$channel/thermostat/$property/target/$unit"
    ));

    // Channel attributes are a restricted subset of device attributes
    assert!(!validator::validate("/fb/v1/device-name/$channel/thermostat/$state"));
    assert!(!validator::validate("/fb/v1/device-name/$channel/thermostat/$channels"));
}

#[test]
fn rejects_wrong_prefix_or_version() {
    assert!(!validator::validate("/homie/v1/device-name/$state"));
    assert!(!validator::validate("/fb/v2/device-name/$state"));
    assert!(!validator::validate("fb/v1/device-name/$state"));
}

#[test]
fn rejects_command_topics() {
    assert!(!validator::validate("/fb/v1/device-name/$property/temperature/set"));
    assert!(!validator::validate(
        "/fb/v1/device-name/$channel/thermostat/$property/target/set"
    ));
    assert!(!validator::validate("/fb/v1/device-name/$control/reboot/set"));
}

#[test]
fn rejects_uppercase_identifiers() {
    assert!(!validator::validate("/fb/v1/Device-Name/$state"));
    assert!(!validator::validate("/fb/v1/device-name/$property/Temperature"));
}
