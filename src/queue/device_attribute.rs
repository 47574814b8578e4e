//! Consumer for `$state`, `$name` and the device-level list attributes.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::message::{AttributeName, DeviceAttribute, Message};
use crate::storage::{ConnectionState, DeviceStorage, Owner, PropertyKind, StorageError};

use super::consumer::{ConsumeError, Consumer};

pub struct DeviceAttributeConsumer {
    storage: Arc<dyn DeviceStorage>,
}

impl DeviceAttributeConsumer {
    pub fn new(storage: Arc<dyn DeviceStorage>) -> Self {
        Self { storage }
    }

    fn apply(&self, message: &DeviceAttribute) -> Result<bool, ConsumeError> {
        let envelope = message.envelope();

        let Some(device) = self
            .storage
            .find_device(envelope.connector, &envelope.device)?
        else {
            warn!(device = %envelope.device, "attribute report for unknown device");

            return Ok(false);
        };

        match message.attribute() {
            AttributeName::State => {
                let payload = message.value().as_scalar().unwrap_or_default();
                let state = ConnectionState::from_payload(payload);

                debug!(device = %envelope.device, state = %state, "device state changed");
                self.storage.set_connection_state(device.id, state)?;
            }
            AttributeName::Name => {
                let name = message
                    .value()
                    .as_scalar()
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned);

                self.storage.update_device_name(device.id, name)?;
            }
            AttributeName::Properties => {
                let listed = message.value().as_list().unwrap_or_default().to_vec();

                self.storage.transaction(&mut || {
                    reconcile_properties(
                        self.storage.as_ref(),
                        Owner::Device(device.id),
                        &listed,
                    )?;

                    // A declared state property means the device reports
                    // its state itself; forget any broker-derived value.
                    if listed.iter().any(|item| item == "state") {
                        self.storage
                            .set_connection_state(device.id, ConnectionState::Unknown)?;
                    }

                    Ok(())
                })?;
            }
            AttributeName::Channels => {
                let listed = message.value().as_list().unwrap_or_default().to_vec();

                self.storage.transaction(&mut || {
                    let existing = self.storage.device_channels(device.id)?;

                    for channel in &existing {
                        if !listed.contains(&channel.identifier) {
                            self.storage.delete_channel(channel.id)?;
                        }
                    }

                    for identifier in &listed {
                        if !existing.iter().any(|channel| &channel.identifier == identifier) {
                            self.storage.create_channel(device.id, identifier)?;
                        }
                    }

                    Ok(())
                })?;
            }
            AttributeName::Controls => {
                let listed = message.value().as_list().unwrap_or_default().to_vec();

                self.storage.transaction(&mut || {
                    reconcile_controls(self.storage.as_ref(), Owner::Device(device.id), &listed)
                })?;
            }
            AttributeName::Extensions => {
                // Extension membership has no registry shape of its own;
                // the $hw/$fw parameter reports carry the data.
                debug!(device = %envelope.device, "device announced extensions");
            }
        }

        Ok(true)
    }
}

impl Consumer for DeviceAttributeConsumer {
    fn matches(&self, message: &Message) -> bool {
        matches!(message, Message::DeviceAttribute(_))
    }

    fn consume(&self, message: &Message) -> Result<bool, ConsumeError> {
        match message {
            Message::DeviceAttribute(attribute) => self.apply(attribute),
            _ => Ok(false),
        }
    }
}

/// Aligns stored properties of `owner` with the announced identifier
/// list: unlisted rows are deleted, missing ones created as dynamic.
pub(super) fn reconcile_properties(
    storage: &dyn DeviceStorage,
    owner: Owner,
    listed: &[String],
) -> Result<(), StorageError> {
    let existing = storage.properties(owner)?;

    for property in &existing {
        if !listed.contains(&property.identifier) {
            storage.delete_property(property.id)?;
        }
    }

    for identifier in listed {
        if !existing.iter().any(|property| &property.identifier == identifier) {
            storage.create_property(owner, identifier, PropertyKind::Dynamic)?;
        }
    }

    Ok(())
}

/// Same alignment for controls.
pub(super) fn reconcile_controls(
    storage: &dyn DeviceStorage,
    owner: Owner,
    listed: &[String],
) -> Result<(), StorageError> {
    let existing = storage.controls(owner)?;

    for control in &existing {
        if !listed.contains(&control.name) {
            storage.delete_control(control.id)?;
        }
    }

    for name in listed {
        if !existing.iter().any(|control| &control.name == name) {
            storage.create_control(owner, name)?;
        }
    }

    Ok(())
}
