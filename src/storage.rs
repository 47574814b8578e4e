//! Device registry abstraction and the bundled in-memory backend.
//!
//! Consumers talk to storage exclusively through [`DeviceStorage`], so
//! a persistent backend can be dropped in without touching the
//! pipeline. [`InMemoryStorage`] is the default backend and the one the
//! test suites run against.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use uuid::Uuid;

use crate::message::{DataType, FormatValue};

/// Device connectivity lifecycle states.
///
/// `Connected`/`Disconnected` come from broker bookkeeping, the rest
/// are reported by the device itself through its `$state` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Init,
    Ready,
    Running,
    Sleeping,
    Stopped,
    Lost,
    Alert,
    Unknown,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Init => "init",
            ConnectionState::Ready => "ready",
            ConnectionState::Running => "running",
            ConnectionState::Sleeping => "sleeping",
            ConnectionState::Stopped => "stopped",
            ConnectionState::Lost => "lost",
            ConnectionState::Alert => "alert",
            ConnectionState::Unknown => "unknown",
        }
    }

    /// Maps a `$state` payload onto a state; anything unrecognized
    /// becomes [`ConnectionState::Unknown`].
    pub fn from_payload(payload: &str) -> Self {
        match payload {
            "connected" => ConnectionState::Connected,
            "disconnected" => ConnectionState::Disconnected,
            "init" => ConnectionState::Init,
            "ready" => ConnectionState::Ready,
            "running" => ConnectionState::Running,
            "sleeping" => ConnectionState::Sleeping,
            "stopped" => ConnectionState::Stopped,
            "lost" => ConnectionState::Lost,
            "alert" => ConnectionState::Alert,
            _ => ConnectionState::Unknown,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity a property or control hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Device(Uuid),
    Channel(Uuid),
}

/// Whether a property carries runtime values or static configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Measured or actuated values, updated at runtime.
    Dynamic,
    /// Device-reported configuration, effectively constant.
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub id: Uuid,
    pub connector: Uuid,
    pub identifier: String,
    pub name: Option<String>,
    pub state: ConnectionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub id: Uuid,
    pub device: Uuid,
    pub identifier: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    pub id: Uuid,
    pub owner: Owner,
    pub identifier: String,
    pub kind: PropertyKind,
    pub name: Option<String>,
    pub settable: bool,
    pub queryable: bool,
    pub data_type: Option<DataType>,
    pub format: Option<FormatValue>,
    pub unit: Option<String>,
    pub value: Option<String>,
}

impl PropertyRecord {
    fn new(owner: Owner, identifier: &str, kind: PropertyKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            identifier: identifier.to_owned(),
            kind,
            name: None,
            settable: false,
            queryable: false,
            data_type: None,
            format: None,
            unit: None,
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRecord {
    pub id: Uuid,
    pub owner: Owner,
    pub name: String,
}

/// Storage failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("{entity} {id} not found")]
    NotFound {
        entity: &'static str,
        id: Uuid,
    },

    #[error("storage backend failure: {reason}")]
    Backend {
        reason: String,
    },
}

/// Registry facade the consumption pipeline writes through.
///
/// Every method is an atomic unit on its own; multi-step updates wrap
/// themselves in [`DeviceStorage::transaction`].
pub trait DeviceStorage: Send + Sync {
    /// Runs `work` as one atomic unit. The in-memory backend executes
    /// it directly; transactional backends open and commit here.
    fn transaction(
        &self,
        work: &mut dyn FnMut() -> Result<(), StorageError>,
    ) -> Result<(), StorageError>;

    fn find_device(
        &self,
        connector: Uuid,
        identifier: &str,
    ) -> Result<Option<DeviceRecord>, StorageError>;

    fn update_device_name(&self, device: Uuid, name: Option<String>)
        -> Result<(), StorageError>;

    fn set_connection_state(
        &self,
        device: Uuid,
        state: ConnectionState,
    ) -> Result<(), StorageError>;

    /// Flips every device of the connector to
    /// [`ConnectionState::Disconnected`]. Called when the broker link
    /// drops; device reports are unreachable from that point.
    fn mark_all_disconnected(&self, connector: Uuid) -> Result<(), StorageError>;

    fn device_channels(&self, device: Uuid) -> Result<Vec<ChannelRecord>, StorageError>;

    fn find_channel(
        &self,
        device: Uuid,
        identifier: &str,
    ) -> Result<Option<ChannelRecord>, StorageError>;

    fn create_channel(
        &self,
        device: Uuid,
        identifier: &str,
    ) -> Result<ChannelRecord, StorageError>;

    fn update_channel_name(
        &self,
        channel: Uuid,
        name: Option<String>,
    ) -> Result<(), StorageError>;

    /// Removes the channel together with its properties and controls.
    fn delete_channel(&self, channel: Uuid) -> Result<(), StorageError>;

    fn properties(&self, owner: Owner) -> Result<Vec<PropertyRecord>, StorageError>;

    fn find_property(
        &self,
        owner: Owner,
        identifier: &str,
    ) -> Result<Option<PropertyRecord>, StorageError>;

    fn create_property(
        &self,
        owner: Owner,
        identifier: &str,
        kind: PropertyKind,
    ) -> Result<PropertyRecord, StorageError>;

    /// Persists the record as-is, matched by `id`.
    fn update_property(&self, property: &PropertyRecord) -> Result<(), StorageError>;

    fn delete_property(&self, property: Uuid) -> Result<(), StorageError>;

    fn controls(&self, owner: Owner) -> Result<Vec<ControlRecord>, StorageError>;

    fn create_control(&self, owner: Owner, name: &str) -> Result<ControlRecord, StorageError>;

    fn delete_control(&self, control: Uuid) -> Result<(), StorageError>;
}

/// Hash-map backed registry guarded by per-table locks.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    devices: RwLock<HashMap<Uuid, DeviceRecord>>,
    channels: RwLock<HashMap<Uuid, ChannelRecord>>,
    properties: RwLock<HashMap<Uuid, PropertyRecord>>,
    controls: RwLock<HashMap<Uuid, ControlRecord>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one device row, returning its generated id. Registries are
    /// provisioned out of band; the pipeline never creates devices.
    pub fn register_device(&self, connector: Uuid, identifier: &str) -> Uuid {
        let record = DeviceRecord {
            id: Uuid::new_v4(),
            connector,
            identifier: identifier.to_owned(),
            name: None,
            state: ConnectionState::Unknown,
        };
        let id = record.id;

        if let Ok(mut devices) = self.devices.write() {
            devices.insert(id, record);
        }

        id
    }

    fn read<'a, T>(
        lock: &'a RwLock<T>,
    ) -> Result<RwLockReadGuard<'a, T>, StorageError> {
        lock.read().map_err(|_| StorageError::Backend {
            reason: "poisoned table lock".to_owned(),
        })
    }

    fn write<'a, T>(
        lock: &'a RwLock<T>,
    ) -> Result<RwLockWriteGuard<'a, T>, StorageError> {
        lock.write().map_err(|_| StorageError::Backend {
            reason: "poisoned table lock".to_owned(),
        })
    }
}

impl DeviceStorage for InMemoryStorage {
    fn transaction(
        &self,
        work: &mut dyn FnMut() -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        // Per-call table locking already serializes the single-consumer
        // pipeline; there is nothing to commit or roll back.
        work()
    }

    fn find_device(
        &self,
        connector: Uuid,
        identifier: &str,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let devices = Self::read(&self.devices)?;

        Ok(devices
            .values()
            .find(|device| device.connector == connector && device.identifier == identifier)
            .cloned())
    }

    fn update_device_name(
        &self,
        device: Uuid,
        name: Option<String>,
    ) -> Result<(), StorageError> {
        let mut devices = Self::write(&self.devices)?;

        let record = devices.get_mut(&device).ok_or(StorageError::NotFound {
            entity: "device",
            id: device,
        })?;
        record.name = name;

        Ok(())
    }

    fn set_connection_state(
        &self,
        device: Uuid,
        state: ConnectionState,
    ) -> Result<(), StorageError> {
        let mut devices = Self::write(&self.devices)?;

        let record = devices.get_mut(&device).ok_or(StorageError::NotFound {
            entity: "device",
            id: device,
        })?;
        record.state = state;

        Ok(())
    }

    fn mark_all_disconnected(&self, connector: Uuid) -> Result<(), StorageError> {
        let mut devices = Self::write(&self.devices)?;

        for record in devices.values_mut() {
            if record.connector == connector {
                record.state = ConnectionState::Disconnected;
            }
        }

        Ok(())
    }

    fn device_channels(&self, device: Uuid) -> Result<Vec<ChannelRecord>, StorageError> {
        let channels = Self::read(&self.channels)?;

        Ok(channels
            .values()
            .filter(|channel| channel.device == device)
            .cloned()
            .collect())
    }

    fn find_channel(
        &self,
        device: Uuid,
        identifier: &str,
    ) -> Result<Option<ChannelRecord>, StorageError> {
        let channels = Self::read(&self.channels)?;

        Ok(channels
            .values()
            .find(|channel| channel.device == device && channel.identifier == identifier)
            .cloned())
    }

    fn create_channel(
        &self,
        device: Uuid,
        identifier: &str,
    ) -> Result<ChannelRecord, StorageError> {
        let record = ChannelRecord {
            id: Uuid::new_v4(),
            device,
            identifier: identifier.to_owned(),
            name: None,
        };

        let mut channels = Self::write(&self.channels)?;
        channels.insert(record.id, record.clone());

        Ok(record)
    }

    fn update_channel_name(
        &self,
        channel: Uuid,
        name: Option<String>,
    ) -> Result<(), StorageError> {
        let mut channels = Self::write(&self.channels)?;

        let record = channels.get_mut(&channel).ok_or(StorageError::NotFound {
            entity: "channel",
            id: channel,
        })?;
        record.name = name;

        Ok(())
    }

    fn delete_channel(&self, channel: Uuid) -> Result<(), StorageError> {
        let mut channels = Self::write(&self.channels)?;

        if channels.remove(&channel).is_none() {
            return Err(StorageError::NotFound {
                entity: "channel",
                id: channel,
            });
        }
        drop(channels);

        let owner = Owner::Channel(channel);

        let mut properties = Self::write(&self.properties)?;
        properties.retain(|_, property| property.owner != owner);
        drop(properties);

        let mut controls = Self::write(&self.controls)?;
        controls.retain(|_, control| control.owner != owner);

        Ok(())
    }

    fn properties(&self, owner: Owner) -> Result<Vec<PropertyRecord>, StorageError> {
        let properties = Self::read(&self.properties)?;

        Ok(properties
            .values()
            .filter(|property| property.owner == owner)
            .cloned()
            .collect())
    }

    fn find_property(
        &self,
        owner: Owner,
        identifier: &str,
    ) -> Result<Option<PropertyRecord>, StorageError> {
        let properties = Self::read(&self.properties)?;

        Ok(properties
            .values()
            .find(|property| property.owner == owner && property.identifier == identifier)
            .cloned())
    }

    fn create_property(
        &self,
        owner: Owner,
        identifier: &str,
        kind: PropertyKind,
    ) -> Result<PropertyRecord, StorageError> {
        let record = PropertyRecord::new(owner, identifier, kind);

        let mut properties = Self::write(&self.properties)?;
        properties.insert(record.id, record.clone());

        Ok(record)
    }

    fn update_property(&self, property: &PropertyRecord) -> Result<(), StorageError> {
        let mut properties = Self::write(&self.properties)?;

        let slot = properties
            .get_mut(&property.id)
            .ok_or(StorageError::NotFound {
                entity: "property",
                id: property.id,
            })?;
        *slot = property.clone();

        Ok(())
    }

    fn delete_property(&self, property: Uuid) -> Result<(), StorageError> {
        let mut properties = Self::write(&self.properties)?;

        if properties.remove(&property).is_none() {
            return Err(StorageError::NotFound {
                entity: "property",
                id: property,
            });
        }

        Ok(())
    }

    fn controls(&self, owner: Owner) -> Result<Vec<ControlRecord>, StorageError> {
        let controls = Self::read(&self.controls)?;

        Ok(controls
            .values()
            .filter(|control| control.owner == owner)
            .cloned()
            .collect())
    }

    fn create_control(&self, owner: Owner, name: &str) -> Result<ControlRecord, StorageError> {
        let record = ControlRecord {
            id: Uuid::new_v4(),
            owner,
            name: name.to_owned(),
        };

        let mut controls = Self::write(&self.controls)?;
        controls.insert(record.id, record.clone());

        Ok(record)
    }

    fn delete_control(&self, control: Uuid) -> Result<(), StorageError> {
        let mut controls = Self::write(&self.controls)?;

        if controls.remove(&control).is_none() {
            return Err(StorageError::NotFound {
                entity: "control",
                id: control,
            });
        }

        Ok(())
    }
}
