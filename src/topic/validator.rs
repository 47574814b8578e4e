//! Pure grammar checks for the nine v1 topic shapes.
//!
//! Every check is a stateless boolean test of the topic string; no
//! state is retained between calls. Identifiers are lowercase
//! alphanumeric plus hyphen, structural markers carry a `$` prefix.

use std::sync::LazyLock;

use regex::Regex;

// TOPIC: /fb/*
static CONVENTION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/fb/.*$").expect("static topic regex"));

// TOPIC: /fb/v1/*
static API_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/fb/v1/.*$").expect("static topic regex"));

// TOPIC: /fb/v1/<device>/$channel/<channel>/*
pub(crate) static CHANNEL_PARTIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/fb/v1/([a-z0-9-]+)/\$channel/([a-z0-9-]+)/.*$").expect("static topic regex")
});

// TOPIC: /fb/v1/<device>/<$state|$name|$properties|$controls|$channels|$extensions>
pub(crate) static DEVICE_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/fb/v1/([a-z0-9-]+)/\$(state|name|properties|controls|channels|extensions)$")
        .expect("static topic regex")
});

// TOPIC: /fb/v1/<device>/$hw/<mac-address|manufacturer|model|version>
pub(crate) static DEVICE_HW_INFO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/fb/v1/([a-z0-9-]+)/\$hw/(mac-address|manufacturer|model|version)$")
        .expect("static topic regex")
});

// TOPIC: /fb/v1/<device>/$fw/<manufacturer|name|version>
pub(crate) static DEVICE_FW_INFO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/fb/v1/([a-z0-9-]+)/\$fw/(manufacturer|name|version)$")
        .expect("static topic regex")
});

// TOPIC: /fb/v1/<device>/$property/<property>[/<$name|$settable|$queryable|$data-type|$format|$unit>]
pub(crate) static DEVICE_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^/fb/v1/([a-z0-9-]+)/\$property/([a-z0-9-]+)((/\$)(name|settable|queryable|data-type|format|unit))?$",
    )
    .expect("static topic regex")
});

// TOPIC: /fb/v1/*/$channel/<channel>/<$name|$properties|$controls>
pub(crate) static CHANNEL_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(.*)/\$channel/([a-z0-9-]+)/\$(name|properties|controls)$")
        .expect("static topic regex")
});

// TOPIC: /fb/v1/*/$channel/<channel>/$property/<property>[/<$name|$settable|$queryable|$data-type|$format|$unit>]
pub(crate) static CHANNEL_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"/(.*)/\$channel/([a-z0-9-]+)/\$property/([a-z0-9-]+)((/\$)(name|settable|queryable|data-type|format|unit))?$",
    )
    .expect("static topic regex")
});

/// Whether the topic matches any of the convention's shapes.
///
/// Command topics (any `/set` segment suffix, which the broker routes
/// towards devices rather than from them) are rejected up front.
pub fn validate(topic: &str) -> bool {
    // Message sent towards a device, not a device report
    if topic.trim_matches(super::TOPIC_DELIMITER).contains("/set") {
        return false;
    }

    if !validate_convention(topic) || !validate_version(topic) {
        return false;
    }

    if validate_device_attribute(topic)
        || validate_device_hardware_info(topic)
        || validate_device_firmware_info(topic)
        || validate_device_property(topic)
    {
        return true;
    }

    if validate_channel_part(topic) {
        if validate_channel_attribute(topic) {
            return true;
        }

        if validate_channel_property(topic) {
            return true;
        }
    }

    false
}

pub fn validate_convention(topic: &str) -> bool {
    CONVENTION_PREFIX.is_match(topic)
}

pub fn validate_version(topic: &str) -> bool {
    API_VERSION.is_match(topic)
}

pub fn validate_device_attribute(topic: &str) -> bool {
    DEVICE_ATTRIBUTE.is_match(topic)
}

pub fn validate_device_hardware_info(topic: &str) -> bool {
    DEVICE_HW_INFO.is_match(topic)
}

pub fn validate_device_firmware_info(topic: &str) -> bool {
    DEVICE_FW_INFO.is_match(topic)
}

pub fn validate_device_property(topic: &str) -> bool {
    DEVICE_PROPERTY.is_match(topic)
}

pub fn validate_channel_part(topic: &str) -> bool {
    CHANNEL_PARTIAL.is_match(topic)
}

pub fn validate_channel_attribute(topic: &str) -> bool {
    validate_channel_part(topic) && CHANNEL_ATTRIBUTE.is_match(topic)
}

pub fn validate_channel_property(topic: &str) -> bool {
    validate_channel_part(topic) && CHANNEL_PROPERTY.is_match(topic)
}
