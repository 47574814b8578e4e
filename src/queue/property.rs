//! Consumers for device and channel property reports.
//!
//! Attribute topics update property metadata, base topics update the
//! runtime value. Both consumers share the metadata application rules.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::message::{
    ChannelProperty, DeviceProperty, Message, PropertyAttribute, PropertyAttributeName,
    PropertyAttributeValue,
};
use crate::storage::{DeviceStorage, Owner, PropertyKind, PropertyRecord};

use super::consumer::{ConsumeError, Consumer};

pub struct DevicePropertyConsumer {
    storage: Arc<dyn DeviceStorage>,
}

impl DevicePropertyConsumer {
    pub fn new(storage: Arc<dyn DeviceStorage>) -> Self {
        Self { storage }
    }

    fn apply(&self, message: &DeviceProperty) -> Result<bool, ConsumeError> {
        let envelope = message.envelope();

        let Some(device) = self
            .storage
            .find_device(envelope.connector, &envelope.device)?
        else {
            warn!(device = %envelope.device, "property report for unknown device");

            return Ok(false);
        };

        apply_property(
            self.storage.as_ref(),
            Owner::Device(device.id),
            message.property(),
            message.attributes(),
            message.value(),
            envelope.retained,
        )
    }
}

impl Consumer for DevicePropertyConsumer {
    fn matches(&self, message: &Message) -> bool {
        matches!(message, Message::DeviceProperty(_))
    }

    fn consume(&self, message: &Message) -> Result<bool, ConsumeError> {
        match message {
            Message::DeviceProperty(property) => self.apply(property),
            _ => Ok(false),
        }
    }
}

pub struct ChannelPropertyConsumer {
    storage: Arc<dyn DeviceStorage>,
}

impl ChannelPropertyConsumer {
    pub fn new(storage: Arc<dyn DeviceStorage>) -> Self {
        Self { storage }
    }

    fn apply(&self, message: &ChannelProperty) -> Result<bool, ConsumeError> {
        let envelope = message.envelope();

        let Some(device) = self
            .storage
            .find_device(envelope.connector, &envelope.device)?
        else {
            warn!(device = %envelope.device, "property report for unknown device");

            return Ok(false);
        };

        let Some(channel) = self.storage.find_channel(device.id, message.channel())? else {
            warn!(
                device = %envelope.device,
                channel = message.channel(),
                "property report for undeclared channel"
            );

            return Ok(false);
        };

        apply_property(
            self.storage.as_ref(),
            Owner::Channel(channel.id),
            message.property(),
            message.attributes(),
            message.value(),
            envelope.retained,
        )
    }
}

impl Consumer for ChannelPropertyConsumer {
    fn matches(&self, message: &Message) -> bool {
        matches!(message, Message::ChannelProperty(_))
    }

    fn consume(&self, message: &Message) -> Result<bool, ConsumeError> {
        match message {
            Message::ChannelProperty(property) => self.apply(property),
            _ => Ok(false),
        }
    }
}

fn apply_property(
    storage: &dyn DeviceStorage,
    owner: Owner,
    identifier: &str,
    attributes: &[PropertyAttribute],
    value: Option<&str>,
    retained: bool,
) -> Result<bool, ConsumeError> {
    if !attributes.is_empty() {
        storage.transaction(&mut || {
            let mut record = match storage.find_property(owner, identifier)? {
                Some(record) => record,
                None => storage.create_property(owner, identifier, PropertyKind::Dynamic)?,
            };

            apply_property_attributes(&mut record, attributes);
            storage.update_property(&record)
        })?;

        return Ok(true);
    }

    let Some(value) = value else {
        return Ok(false);
    };

    let mut applied = false;
    storage.transaction(&mut || {
        let Some(mut record) = storage.find_property(owner, identifier)? else {
            warn!(property = identifier, "value for undeclared property");

            return Ok(());
        };

        // Retained publishes replay the broker's snapshot; a value the
        // registry already holds is not a state change.
        if retained && record.value.as_deref() == Some(value) {
            debug!(property = identifier, "retained value already stored");

            return Ok(());
        }

        record.value = Some(value.to_owned());
        storage.update_property(&record)?;
        applied = true;

        Ok(())
    })?;

    Ok(applied)
}

/// Writes decoded attribute values into the record. An explicitly
/// unset attribute clears the matching field.
fn apply_property_attributes(record: &mut PropertyRecord, attributes: &[PropertyAttribute]) {
    for attribute in attributes {
        match (attribute.attribute(), attribute.value()) {
            (PropertyAttributeName::Name, PropertyAttributeValue::Text(name)) => {
                record.name = Some(name.clone());
            }
            (PropertyAttributeName::Name, PropertyAttributeValue::None) => {
                record.name = None;
            }
            (PropertyAttributeName::Settable, PropertyAttributeValue::Bool(flag)) => {
                record.settable = *flag;
            }
            (PropertyAttributeName::Queryable, PropertyAttributeValue::Bool(flag)) => {
                record.queryable = *flag;
            }
            (PropertyAttributeName::DataType, PropertyAttributeValue::DataType(data_type)) => {
                record.data_type = Some(*data_type);
            }
            (PropertyAttributeName::Format, PropertyAttributeValue::Format(format)) => {
                record.format = Some(format.clone());
            }
            (PropertyAttributeName::Format, PropertyAttributeValue::None) => {
                record.format = None;
            }
            (PropertyAttributeName::Unit, PropertyAttributeValue::Text(unit)) => {
                record.unit = Some(unit.clone());
            }
            (PropertyAttributeName::Unit, PropertyAttributeValue::None) => {
                record.unit = None;
            }
            _ => {}
        }
    }
}
