//! Hardware/firmware extension attribute messages.

use super::error::MessageError;
use super::payload;
use super::Envelope;

/// Device-reported metadata group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    /// `$hw` topics
    Hardware,
    /// `$fw` topics
    Firmware,
}

impl ExtensionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionKind::Hardware => "com.fastybird.hardware",
            ExtensionKind::Firmware => "com.fastybird.firmware",
        }
    }
}

/// Parameters an extension group may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionParameter {
    MacAddress,
    Manufacturer,
    Model,
    Version,
    Name,
}

impl ExtensionParameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionParameter::MacAddress => "mac-address",
            ExtensionParameter::Manufacturer => "manufacturer",
            ExtensionParameter::Model => "model",
            ExtensionParameter::Version => "version",
            ExtensionParameter::Name => "name",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "mac-address" => Some(ExtensionParameter::MacAddress),
            "manufacturer" => Some(ExtensionParameter::Manufacturer),
            "model" => Some(ExtensionParameter::Model),
            "version" => Some(ExtensionParameter::Version),
            "name" => Some(ExtensionParameter::Name),
            _ => None,
        }
    }

    fn allowed_for(&self, kind: ExtensionKind) -> bool {
        match kind {
            ExtensionKind::Hardware => matches!(
                self,
                ExtensionParameter::MacAddress
                    | ExtensionParameter::Manufacturer
                    | ExtensionParameter::Model
                    | ExtensionParameter::Version
            ),
            ExtensionKind::Firmware => matches!(
                self,
                ExtensionParameter::Manufacturer
                    | ExtensionParameter::Name
                    | ExtensionParameter::Version
            ),
        }
    }
}

/// One hardware or firmware info report (`.../$hw/<param>`, `.../$fw/<param>`).
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionAttribute {
    envelope: Envelope,
    extension: ExtensionKind,
    parameter: ExtensionParameter,
    value: String,
}

impl ExtensionAttribute {
    pub fn new(
        envelope: Envelope,
        extension: ExtensionKind,
        parameter: &str,
        raw_payload: &str,
    ) -> Result<Self, MessageError> {
        let parameter = ExtensionParameter::parse(parameter)
            .filter(|parsed| parsed.allowed_for(extension))
            .ok_or_else(|| MessageError::ParameterNotAllowed {
                parameter: parameter.to_owned(),
                extension: extension.as_str(),
            })?;

        Ok(Self {
            envelope,
            extension,
            parameter,
            value: payload::clean_name(&raw_payload.to_lowercase()),
        })
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn extension(&self) -> ExtensionKind {
        self.extension
    }

    pub fn parameter(&self) -> ExtensionParameter {
        self.parameter
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}
