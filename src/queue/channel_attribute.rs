//! Consumer for channel `$name`, `$properties` and `$controls`.

use std::sync::Arc;

use tracing::warn;

use crate::message::{AttributeName, ChannelAttribute, Message};
use crate::storage::{DeviceStorage, Owner};

use super::consumer::{ConsumeError, Consumer};
use super::device_attribute::{reconcile_controls, reconcile_properties};

pub struct ChannelAttributeConsumer {
    storage: Arc<dyn DeviceStorage>,
}

impl ChannelAttributeConsumer {
    pub fn new(storage: Arc<dyn DeviceStorage>) -> Self {
        Self { storage }
    }

    fn apply(&self, message: &ChannelAttribute) -> Result<bool, ConsumeError> {
        let envelope = message.envelope();

        let Some(device) = self
            .storage
            .find_device(envelope.connector, &envelope.device)?
        else {
            warn!(device = %envelope.device, "channel report for unknown device");

            return Ok(false);
        };

        let Some(channel) = self.storage.find_channel(device.id, message.channel())? else {
            warn!(
                device = %envelope.device,
                channel = message.channel(),
                "report for undeclared channel"
            );

            return Ok(false);
        };

        match message.attribute() {
            AttributeName::Name => {
                let name = message
                    .value()
                    .as_scalar()
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned);

                self.storage.update_channel_name(channel.id, name)?;
            }
            AttributeName::Properties => {
                let listed = message.value().as_list().unwrap_or_default().to_vec();

                self.storage.transaction(&mut || {
                    reconcile_properties(
                        self.storage.as_ref(),
                        Owner::Channel(channel.id),
                        &listed,
                    )
                })?;
            }
            AttributeName::Controls => {
                let listed = message.value().as_list().unwrap_or_default().to_vec();

                self.storage.transaction(&mut || {
                    reconcile_controls(
                        self.storage.as_ref(),
                        Owner::Channel(channel.id),
                        &listed,
                    )
                })?;
            }
            // The message constructor rejects everything else for channels
            _ => return Ok(false),
        }

        Ok(true)
    }
}

impl Consumer for ChannelAttributeConsumer {
    fn matches(&self, message: &Message) -> bool {
        matches!(message, Message::ChannelAttribute(_))
    }

    fn consume(&self, message: &Message) -> Result<bool, ConsumeError> {
        match message {
            Message::ChannelAttribute(attribute) => self.apply(attribute),
            _ => Ok(false),
        }
    }
}
