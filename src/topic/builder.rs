//! Outbound command topic rendering.
//!
//! Command topics mirror the report shapes with a trailing `/set`
//! segment; the broker routes them towards the addressed device.

use super::{API_PREFIX, API_V1_VERSION_PREFIX};

/// Topic carrying a desired value for a device property.
pub fn device_property_topic(device: &str, property: &str) -> String {
    format!("{API_PREFIX}{API_V1_VERSION_PREFIX}/{device}/$property/{property}/set")
}

/// Topic triggering a device control action.
pub fn device_command_topic(device: &str, control: &str) -> String {
    format!("{API_PREFIX}{API_V1_VERSION_PREFIX}/{device}/$control/{control}/set")
}

/// Topic carrying a desired value for a channel property.
pub fn channel_property_topic(device: &str, channel: &str, property: &str) -> String {
    format!(
        "{API_PREFIX}{API_V1_VERSION_PREFIX}/{device}/$channel/{channel}/$property/{property}/set"
    )
}

/// Topic triggering a channel control action.
pub fn channel_command_topic(device: &str, channel: &str, control: &str) -> String {
    format!(
        "{API_PREFIX}{API_V1_VERSION_PREFIX}/{device}/$channel/{channel}/$control/{control}/set"
    )
}
