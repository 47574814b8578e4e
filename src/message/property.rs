//! Device and channel property messages with typed attribute decoding.

use super::error::MessageError;
use super::payload;
use super::Envelope;

/// Property data types the convention allows in a `$data-type` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Integer,
    Float,
    Boolean,
    Enum,
    Color,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::Enum => "enum",
            DataType::Color => "color",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(DataType::String),
            "integer" => Some(DataType::Integer),
            "float" => Some(DataType::Float),
            "boolean" => Some(DataType::Boolean),
            "enum" => Some(DataType::Enum),
            "color" => Some(DataType::Color),
            _ => None,
        }
    }
}

/// Color models allowed as a scalar `$format` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Rgb,
    Hsv,
}

impl ColorModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorModel::Rgb => "rgb",
            ColorModel::Hsv => "hsv",
        }
    }
}

/// Decoded `$format` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatValue {
    /// `min:max` numeric range; either bound may be open.
    Range(Option<f64>, Option<f64>),
    /// Comma-separated enumeration of allowed values.
    Enumeration(Vec<String>),
    /// Color model name.
    Color(ColorModel),
}

/// Closed set of property attribute names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyAttributeName {
    Name,
    Settable,
    Queryable,
    DataType,
    Format,
    Unit,
}

impl PropertyAttributeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyAttributeName::Name => "name",
            PropertyAttributeName::Settable => "settable",
            PropertyAttributeName::Queryable => "queryable",
            PropertyAttributeName::DataType => "data-type",
            PropertyAttributeName::Format => "format",
            PropertyAttributeName::Unit => "unit",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "name" => Some(PropertyAttributeName::Name),
            "settable" => Some(PropertyAttributeName::Settable),
            "queryable" => Some(PropertyAttributeName::Queryable),
            "data-type" => Some(PropertyAttributeName::DataType),
            "format" => Some(PropertyAttributeName::Format),
            "unit" => Some(PropertyAttributeName::Unit),
            _ => None,
        }
    }
}

impl std::fmt::Display for PropertyAttributeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed, decoded property attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyAttributeValue {
    /// Attribute explicitly unset (sentinel or blank payload).
    None,
    Bool(bool),
    Text(String),
    DataType(DataType),
    Format(FormatValue),
}

/// One decoded property attribute: keeps the raw wire payload next to
/// the typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAttribute {
    attribute: PropertyAttributeName,
    raw: String,
    value: PropertyAttributeValue,
}

impl PropertyAttribute {
    /// Decodes one attribute payload according to the attribute's value
    /// grammar. Unrecognized values fail closed.
    pub fn new(attribute: &str, raw_payload: &str) -> Result<Self, MessageError> {
        let name = PropertyAttributeName::parse(attribute).ok_or_else(|| {
            MessageError::AttributeNotAllowed {
                attribute: attribute.to_owned(),
                owner: "property",
            }
        })?;

        let value = Self::decode(name, raw_payload)?;

        Ok(Self {
            attribute: name,
            raw: raw_payload.to_owned(),
            value,
        })
    }

    fn decode(
        name: PropertyAttributeName,
        raw: &str,
    ) -> Result<PropertyAttributeValue, MessageError> {
        match name {
            PropertyAttributeName::Settable | PropertyAttributeName::Queryable => {
                Ok(PropertyAttributeValue::Bool(raw == payload::PAYLOAD_BOOL_TRUE))
            }
            PropertyAttributeName::Name => {
                if payload::is_not_set(raw) {
                    Ok(PropertyAttributeValue::None)
                } else {
                    Ok(PropertyAttributeValue::Text(payload::clean_name(raw)))
                }
            }
            PropertyAttributeName::DataType => DataType::parse(raw)
                .map(PropertyAttributeValue::DataType)
                .ok_or_else(|| MessageError::InvalidPayload {
                    attribute: "data-type",
                    payload: raw.to_owned(),
                }),
            PropertyAttributeName::Format => Self::decode_format(raw),
            PropertyAttributeName::Unit => {
                if payload::is_not_set(raw) {
                    Ok(PropertyAttributeValue::None)
                } else {
                    Ok(PropertyAttributeValue::Text(raw.to_owned()))
                }
            }
        }
    }

    fn decode_format(raw: &str) -> Result<PropertyAttributeValue, MessageError> {
        let invalid = || MessageError::InvalidPayload {
            attribute: "format",
            payload: raw.to_owned(),
        };

        if raw.contains(':') {
            let mut bounds = raw.split(':');
            let start = Self::parse_bound(bounds.next()).map_err(|_| invalid())?;
            let end = Self::parse_bound(bounds.next()).map_err(|_| invalid())?;

            if let (Some(start), Some(end)) = (start, end) {
                if start > end {
                    return Err(invalid());
                }
            }

            return Ok(PropertyAttributeValue::Format(FormatValue::Range(start, end)));
        }

        if raw.contains(',') {
            let items = payload::parse_list(raw);

            return Ok(PropertyAttributeValue::Format(FormatValue::Enumeration(items)));
        }

        if payload::is_not_set(raw) {
            return Ok(PropertyAttributeValue::None);
        }

        match raw {
            "rgb" => Ok(PropertyAttributeValue::Format(FormatValue::Color(ColorModel::Rgb))),
            "hsv" => Ok(PropertyAttributeValue::Format(FormatValue::Color(ColorModel::Hsv))),
            _ => Err(invalid()),
        }
    }

    // Empty side of a `min:max` pair means an open bound.
    fn parse_bound(bound: Option<&str>) -> Result<Option<f64>, ()> {
        match bound {
            None | Some("") => Ok(None),
            Some(text) => text.parse::<f64>().map(Some).map_err(|_| ()),
        }
    }

    pub fn attribute(&self) -> PropertyAttributeName {
        self.attribute
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &PropertyAttributeValue {
        &self.value
    }
}

/// Device property message (`.../$property/<prop>[/$<attr>]`).
///
/// Carries either collected attributes (configuration topics) or a raw
/// runtime value (base topic), never decoded further here: value
/// interpretation belongs to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProperty {
    envelope: Envelope,
    property: String,
    attributes: Vec<PropertyAttribute>,
    value: Option<String>,
}

impl DeviceProperty {
    pub fn new(envelope: Envelope, property: impl Into<String>) -> Self {
        Self {
            envelope,
            property: property.into(),
            attributes: Vec::new(),
            value: None,
        }
    }

    /// Collects an attribute; a later attribute with the same name
    /// replaces the earlier one (last write wins, names stay unique).
    pub fn add_attribute(&mut self, attribute: PropertyAttribute) {
        self.attributes
            .retain(|existing| existing.attribute() != attribute.attribute());
        self.attributes.push(attribute);
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn attributes(&self) -> &[PropertyAttribute] {
        &self.attributes
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// Channel property message (`.../$channel/<channel>/$property/...`).
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelProperty {
    envelope: Envelope,
    channel: String,
    property: String,
    attributes: Vec<PropertyAttribute>,
    value: Option<String>,
}

impl ChannelProperty {
    pub fn new(
        envelope: Envelope,
        channel: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        Self {
            envelope,
            channel: channel.into(),
            property: property.into(),
            attributes: Vec::new(),
            value: None,
        }
    }

    pub fn add_attribute(&mut self, attribute: PropertyAttribute) {
        self.attributes
            .retain(|existing| existing.attribute() != attribute.attribute());
        self.attributes.push(attribute);
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn attributes(&self) -> &[PropertyAttribute] {
        &self.attributes
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}
