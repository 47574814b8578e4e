//! End-to-end consumption tests over the in-memory registry

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::message::Message;
use crate::storage::{
    ChannelRecord, ConnectionState, ControlRecord, DeviceRecord, DeviceStorage, InMemoryStorage,
    Owner, PropertyKind, PropertyRecord, StorageError,
};
use crate::topic::parser::parse;

use super::{ConsumeError, Consumer, ConsumerProxy, MessageQueue};

struct Fixture {
    connector: Uuid,
    device: Uuid,
    storage: Arc<InMemoryStorage>,
    proxy: ConsumerProxy,
}

fn fixture() -> Fixture {
    let connector = Uuid::new_v4();
    let storage = Arc::new(InMemoryStorage::new());
    let device = storage.register_device(connector, "device-name");
    let proxy = ConsumerProxy::with_storage(storage.clone());

    Fixture {
        connector,
        device,
        storage,
        proxy,
    }
}

impl Fixture {
    fn consume(&self, topic: &str, payload: &str, retained: bool) -> bool {
        let message = parse(self.connector, topic, payload, retained).unwrap();

        self.proxy.consume(&message).unwrap()
    }

    fn device_record(&self) -> DeviceRecord {
        self.storage
            .find_device(self.connector, "device-name")
            .unwrap()
            .unwrap()
    }
}

#[test]
fn state_attribute_updates_connection_state() {
    let fixture = fixture();

    assert!(fixture.consume("/fb/v1/device-name/$state", "ready", false));
    assert_eq!(fixture.device_record().state, ConnectionState::Ready);

    assert!(fixture.consume("/fb/v1/device-name/$state", "voodoo", false));
    assert_eq!(fixture.device_record().state, ConnectionState::Unknown);
}

#[test]
fn unknown_device_reports_are_skipped() {
    let fixture = fixture();

    assert!(!fixture.consume("/fb/v1/stranger/$state", "ready", false));
    assert!(!fixture.consume("/fb/v1/stranger/$hw/model", "esp32", false));
    assert!(!fixture.consume("/fb/v1/stranger/$property/temperature", "21.5", false));
}

#[test]
fn channel_list_reconciles_create_and_delete() {
    let fixture = fixture();

    assert!(fixture.consume("/fb/v1/device-name/$channels", "thermostat,valve", false));

    let mut channels: Vec<String> = fixture
        .storage
        .device_channels(fixture.device)
        .unwrap()
        .into_iter()
        .map(|channel: ChannelRecord| channel.identifier)
        .collect();
    channels.sort();
    assert_eq!(channels, ["thermostat", "valve"]);

    assert!(fixture.consume("/fb/v1/device-name/$channels", "valve", false));

    let channels = fixture.storage.device_channels(fixture.device).unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].identifier, "valve");
}

#[test]
fn property_list_with_state_resets_connection_state() {
    let fixture = fixture();

    assert!(fixture.consume("/fb/v1/device-name/$state", "running", false));
    assert!(fixture.consume("/fb/v1/device-name/$properties", "temperature,state", false));

    assert_eq!(fixture.device_record().state, ConnectionState::Unknown);

    let properties = fixture
        .storage
        .properties(Owner::Device(fixture.device))
        .unwrap();
    assert_eq!(properties.len(), 2);
    assert!(properties
        .iter()
        .all(|property: &PropertyRecord| property.kind == PropertyKind::Dynamic));
}

#[test]
fn controls_list_reconciles() {
    let fixture = fixture();

    assert!(fixture.consume("/fb/v1/device-name/$controls", "configure,reset", false));
    assert!(fixture.consume("/fb/v1/device-name/$controls", "reset", false));

    let controls: Vec<ControlRecord> = fixture
        .storage
        .controls(Owner::Device(fixture.device))
        .unwrap();
    assert_eq!(controls.len(), 1);
    assert_eq!(controls[0].name, "reset");
}

#[test]
fn extension_reports_become_variable_properties() {
    let fixture = fixture();

    assert!(fixture.consume("/fb/v1/device-name/$hw/mac-address", "00:0A:E6:3E:FD:E1", false));

    let property = fixture
        .storage
        .find_property(Owner::Device(fixture.device), "hardware-mac-address")
        .unwrap()
        .unwrap();
    assert_eq!(property.kind, PropertyKind::Variable);
    assert_eq!(property.value.as_deref(), Some("00:0a:e6:3e:fd:e1"));
}

#[test]
fn property_attributes_then_value() {
    let fixture = fixture();
    let owner = Owner::Device(fixture.device);

    assert!(fixture.consume(
        "/fb/v1/device-name/$property/temperature/$settable",
        "true",
        false
    ));
    assert!(fixture.consume("/fb/v1/device-name/$property/temperature/$unit", "°C", false));
    assert!(fixture.consume("/fb/v1/device-name/$property/temperature", "21.5", false));

    let property = fixture
        .storage
        .find_property(owner, "temperature")
        .unwrap()
        .unwrap();
    assert!(property.settable);
    assert_eq!(property.unit.as_deref(), Some("°C"));
    assert_eq!(property.value.as_deref(), Some("21.5"));
}

#[test]
fn value_for_undeclared_property_is_skipped() {
    let fixture = fixture();

    assert!(!fixture.consume("/fb/v1/device-name/$property/humidity", "40", false));
    assert!(fixture
        .storage
        .find_property(Owner::Device(fixture.device), "humidity")
        .unwrap()
        .is_none());
}

#[test]
fn retained_value_replay_is_idempotent() {
    let fixture = fixture();

    assert!(fixture.consume(
        "/fb/v1/device-name/$property/temperature/$settable",
        "false",
        false
    ));
    assert!(fixture.consume("/fb/v1/device-name/$property/temperature", "21.5", false));

    // Same value replayed from the broker snapshot: no write
    assert!(!fixture.consume("/fb/v1/device-name/$property/temperature", "21.5", true));
    // A retained but different value still lands
    assert!(fixture.consume("/fb/v1/device-name/$property/temperature", "22.0", true));
}

#[test]
fn channel_property_updates_through_declared_channel() {
    let fixture = fixture();

    assert!(fixture.consume("/fb/v1/device-name/$channels", "thermostat", false));
    assert!(fixture.consume(
        "/fb/v1/device-name/$channel/thermostat/$properties",
        "target",
        false
    ));
    assert!(fixture.consume(
        "/fb/v1/device-name/$channel/thermostat/$property/target",
        "22",
        false
    ));

    let channel = fixture
        .storage
        .find_channel(fixture.device, "thermostat")
        .unwrap()
        .unwrap();
    let property = fixture
        .storage
        .find_property(Owner::Channel(channel.id), "target")
        .unwrap()
        .unwrap();
    assert_eq!(property.value.as_deref(), Some("22"));

    // Undeclared channel: skipped
    assert!(!fixture.consume("/fb/v1/device-name/$channel/ghost/$property/x", "1", false));
}

struct FailingStorage;

impl DeviceStorage for FailingStorage {
    fn transaction(
        &self,
        work: &mut dyn FnMut() -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        work()
    }

    fn find_device(
        &self,
        _connector: Uuid,
        _identifier: &str,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        Err(StorageError::Backend {
            reason: "offline".to_owned(),
        })
    }

    fn update_device_name(
        &self,
        _device: Uuid,
        _name: Option<String>,
    ) -> Result<(), StorageError> {
        unimplemented!()
    }

    fn set_connection_state(
        &self,
        _device: Uuid,
        _state: ConnectionState,
    ) -> Result<(), StorageError> {
        unimplemented!()
    }

    fn mark_all_disconnected(&self, _connector: Uuid) -> Result<(), StorageError> {
        unimplemented!()
    }

    fn device_channels(&self, _device: Uuid) -> Result<Vec<ChannelRecord>, StorageError> {
        unimplemented!()
    }

    fn find_channel(
        &self,
        _device: Uuid,
        _identifier: &str,
    ) -> Result<Option<ChannelRecord>, StorageError> {
        unimplemented!()
    }

    fn create_channel(
        &self,
        _device: Uuid,
        _identifier: &str,
    ) -> Result<ChannelRecord, StorageError> {
        unimplemented!()
    }

    fn update_channel_name(
        &self,
        _channel: Uuid,
        _name: Option<String>,
    ) -> Result<(), StorageError> {
        unimplemented!()
    }

    fn delete_channel(&self, _channel: Uuid) -> Result<(), StorageError> {
        unimplemented!()
    }

    fn properties(&self, _owner: Owner) -> Result<Vec<PropertyRecord>, StorageError> {
        unimplemented!()
    }

    fn find_property(
        &self,
        _owner: Owner,
        _identifier: &str,
    ) -> Result<Option<PropertyRecord>, StorageError> {
        unimplemented!()
    }

    fn create_property(
        &self,
        _owner: Owner,
        _identifier: &str,
        _kind: PropertyKind,
    ) -> Result<PropertyRecord, StorageError> {
        unimplemented!()
    }

    fn update_property(&self, _property: &PropertyRecord) -> Result<(), StorageError> {
        unimplemented!()
    }

    fn delete_property(&self, _property: Uuid) -> Result<(), StorageError> {
        unimplemented!()
    }

    fn controls(&self, _owner: Owner) -> Result<Vec<ControlRecord>, StorageError> {
        unimplemented!()
    }

    fn create_control(&self, _owner: Owner, _name: &str) -> Result<ControlRecord, StorageError> {
        unimplemented!()
    }

    fn delete_control(&self, _control: Uuid) -> Result<(), StorageError> {
        unimplemented!()
    }
}

#[test]
fn drain_requeues_on_storage_failure() {
    let connector = Uuid::new_v4();
    let queue = MessageQueue::new();
    let proxy = ConsumerProxy::with_storage(Arc::new(FailingStorage));

    let first = parse(connector, "/fb/v1/device-name/$state", "ready", false).unwrap();
    let second = parse(connector, "/fb/v1/device-name/$name", "Device", false).unwrap();
    queue.append(first.clone());
    queue.append(second);

    let error = proxy.drain(&queue).unwrap_err();
    assert!(matches!(error, ConsumeError::Storage(_)));

    // Failed message is back at the head, order preserved
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.dequeue().unwrap(), first);
}

#[test]
fn drain_counts_applied_messages() {
    let fixture = fixture();
    let queue = MessageQueue::new();

    queue.append(parse(fixture.connector, "/fb/v1/device-name/$state", "ready", false).unwrap());
    queue.append(parse(fixture.connector, "/fb/v1/stranger/$state", "ready", false).unwrap());

    assert_eq!(fixture.proxy.drain(&queue).unwrap(), 1);
    assert!(queue.is_empty());
}

/// Delegates to the in-memory registry while counting writes that run
/// outside a `transaction` scope.
struct TransactionTrackingStorage {
    inner: InMemoryStorage,
    depth: AtomicUsize,
    outside_writes: AtomicUsize,
}

impl TransactionTrackingStorage {
    fn new() -> Self {
        Self {
            inner: InMemoryStorage::new(),
            depth: AtomicUsize::new(0),
            outside_writes: AtomicUsize::new(0),
        }
    }

    fn record_write(&self) {
        if self.depth.load(Ordering::SeqCst) == 0 {
            self.outside_writes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl DeviceStorage for TransactionTrackingStorage {
    fn transaction(
        &self,
        work: &mut dyn FnMut() -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        let result = self.inner.transaction(work);
        self.depth.fetch_sub(1, Ordering::SeqCst);

        result
    }

    fn find_device(
        &self,
        connector: Uuid,
        identifier: &str,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        self.inner.find_device(connector, identifier)
    }

    fn update_device_name(&self, device: Uuid, name: Option<String>) -> Result<(), StorageError> {
        self.record_write();
        self.inner.update_device_name(device, name)
    }

    fn set_connection_state(
        &self,
        device: Uuid,
        state: ConnectionState,
    ) -> Result<(), StorageError> {
        self.record_write();
        self.inner.set_connection_state(device, state)
    }

    fn mark_all_disconnected(&self, connector: Uuid) -> Result<(), StorageError> {
        self.record_write();
        self.inner.mark_all_disconnected(connector)
    }

    fn device_channels(&self, device: Uuid) -> Result<Vec<ChannelRecord>, StorageError> {
        self.inner.device_channels(device)
    }

    fn find_channel(
        &self,
        device: Uuid,
        identifier: &str,
    ) -> Result<Option<ChannelRecord>, StorageError> {
        self.inner.find_channel(device, identifier)
    }

    fn create_channel(&self, device: Uuid, identifier: &str) -> Result<ChannelRecord, StorageError> {
        self.record_write();
        self.inner.create_channel(device, identifier)
    }

    fn update_channel_name(&self, channel: Uuid, name: Option<String>) -> Result<(), StorageError> {
        self.record_write();
        self.inner.update_channel_name(channel, name)
    }

    fn delete_channel(&self, channel: Uuid) -> Result<(), StorageError> {
        self.record_write();
        self.inner.delete_channel(channel)
    }

    fn properties(&self, owner: Owner) -> Result<Vec<PropertyRecord>, StorageError> {
        self.inner.properties(owner)
    }

    fn find_property(
        &self,
        owner: Owner,
        identifier: &str,
    ) -> Result<Option<PropertyRecord>, StorageError> {
        self.inner.find_property(owner, identifier)
    }

    fn create_property(
        &self,
        owner: Owner,
        identifier: &str,
        kind: PropertyKind,
    ) -> Result<PropertyRecord, StorageError> {
        self.record_write();
        self.inner.create_property(owner, identifier, kind)
    }

    fn update_property(&self, property: &PropertyRecord) -> Result<(), StorageError> {
        self.record_write();
        self.inner.update_property(property)
    }

    fn delete_property(&self, property: Uuid) -> Result<(), StorageError> {
        self.record_write();
        self.inner.delete_property(property)
    }

    fn controls(&self, owner: Owner) -> Result<Vec<ControlRecord>, StorageError> {
        self.inner.controls(owner)
    }

    fn create_control(&self, owner: Owner, name: &str) -> Result<ControlRecord, StorageError> {
        self.record_write();
        self.inner.create_control(owner, name)
    }

    fn delete_control(&self, control: Uuid) -> Result<(), StorageError> {
        self.record_write();
        self.inner.delete_control(control)
    }
}

#[test]
fn property_and_extension_writes_run_inside_a_transaction() {
    let connector = Uuid::new_v4();
    let storage = Arc::new(TransactionTrackingStorage::new());
    storage.inner.register_device(connector, "device-name");
    let proxy = ConsumerProxy::with_storage(storage.clone());

    for (topic, payload) in [
        ("/fb/v1/device-name/$property/temperature/$settable", "true"),
        ("/fb/v1/device-name/$property/temperature", "21.5"),
        ("/fb/v1/device-name/$hw/mac-address", "00:0a:e6:3e:fd:e1"),
    ] {
        let message = parse(connector, topic, payload, false).unwrap();
        assert!(proxy.consume(&message).unwrap());
    }

    assert_eq!(storage.outside_writes.load(Ordering::SeqCst), 0);
}

struct RefusingConsumer;

impl Consumer for RefusingConsumer {
    fn matches(&self, _message: &Message) -> bool {
        false
    }

    fn consume(&self, _message: &Message) -> Result<bool, ConsumeError> {
        Ok(false)
    }
}

#[test]
fn unroutable_message_halts_the_drain() {
    let connector = Uuid::new_v4();
    let queue = MessageQueue::new();
    let proxy = ConsumerProxy::new(vec![Arc::new(RefusingConsumer)]);

    queue.append(parse(connector, "/fb/v1/device-name/$state", "ready", false).unwrap());

    let error = proxy.drain(&queue).unwrap_err();
    assert!(matches!(error, ConsumeError::Unhandled { .. }));

    // Retrying cannot route it, so it is not requeued
    assert!(queue.is_empty());
}
