//! Consumer for `$hw`/`$fw` metadata reports.
//!
//! Extension parameters are stored as variable properties named after
//! the extension group, e.g. `hardware-mac-address`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::message::{ExtensionAttribute, ExtensionKind, ExtensionParameter, Message};
use crate::storage::{DeviceStorage, Owner, PropertyKind};

use super::consumer::{ConsumeError, Consumer};

pub struct ExtensionAttributeConsumer {
    storage: Arc<dyn DeviceStorage>,
}

impl ExtensionAttributeConsumer {
    pub fn new(storage: Arc<dyn DeviceStorage>) -> Self {
        Self { storage }
    }

    fn apply(&self, message: &ExtensionAttribute) -> Result<bool, ConsumeError> {
        let envelope = message.envelope();

        let Some(device) = self
            .storage
            .find_device(envelope.connector, &envelope.device)?
        else {
            warn!(device = %envelope.device, "extension report for unknown device");

            return Ok(false);
        };

        let identifier = property_identifier(message.extension(), message.parameter());
        let owner = Owner::Device(device.id);
        let retained = envelope.retained;
        let value = message.value();

        let mut applied = false;
        self.storage.transaction(&mut || {
            let mut record = match self.storage.find_property(owner, identifier)? {
                Some(record) => record,
                None => self
                    .storage
                    .create_property(owner, identifier, PropertyKind::Variable)?,
            };

            if retained && record.value.as_deref() == Some(value) {
                debug!(property = identifier, "retained value already stored");

                return Ok(());
            }

            record.value = Some(value.to_owned());
            self.storage.update_property(&record)?;
            applied = true;

            Ok(())
        })?;

        Ok(applied)
    }
}

impl Consumer for ExtensionAttributeConsumer {
    fn matches(&self, message: &Message) -> bool {
        matches!(message, Message::ExtensionAttribute(_))
    }

    fn consume(&self, message: &Message) -> Result<bool, ConsumeError> {
        match message {
            Message::ExtensionAttribute(attribute) => self.apply(attribute),
            _ => Ok(false),
        }
    }
}

fn property_identifier(
    extension: ExtensionKind,
    parameter: ExtensionParameter,
) -> &'static str {
    match (extension, parameter) {
        (ExtensionKind::Hardware, ExtensionParameter::MacAddress) => "hardware-mac-address",
        (ExtensionKind::Hardware, ExtensionParameter::Manufacturer) => "hardware-manufacturer",
        (ExtensionKind::Hardware, ExtensionParameter::Model) => "hardware-model",
        (ExtensionKind::Hardware, _) => "hardware-version",
        (ExtensionKind::Firmware, ExtensionParameter::Manufacturer) => "firmware-manufacturer",
        (ExtensionKind::Firmware, ExtensionParameter::Name) => "firmware-name",
        (ExtensionKind::Firmware, _) => "firmware-version",
    }
}
