//! FB MQTT v1 topic codec
//!
//! The convention's topic grammar has nine fixed shapes under the
//! `/fb/v1` prefix. [`validator`] classifies topics against them,
//! [`parser`] turns matching (topic, payload) pairs into typed
//! [`crate::message::Message`] entities and [`builder`] renders the
//! outbound command topics.

pub mod builder;
pub mod error;
pub mod parser;
pub mod validator;

#[cfg(test)]
mod builder_tests;
#[cfg(test)]
mod parser_tests;
#[cfg(test)]
mod validator_tests;

pub use error::ParseError;

/// Fixed leading segment identifying the protocol family.
pub const API_PREFIX: &str = "/fb";

/// Fixed protocol-version segment; only v1 is supported.
pub const API_V1_VERSION_PREFIX: &str = "/v1";

/// The only delimiter of the topic grammar.
pub const TOPIC_DELIMITER: char = '/';
