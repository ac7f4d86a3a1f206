//! The BLE capabilities the session needs from a platform stack.
//!
//! [`Transport`] is deliberately narrow: find one device by filter, connect,
//! read/write a characteristic by ATT handle, and (un)subscribe a callback to
//! a handle.  [`crate::ble::BtleTransport`] implements it on top of
//! `btleplug`; tests implement it with an in-memory mock.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{DecodeError, TransportError};
use crate::protocol::MYO_SERVICE_UUID;

/// Callback invoked for every notification on a subscribed handle.
///
/// Called from the transport's delivery task.  An `Err` means the payload
/// for a known handle was malformed; the transport reports it.
pub type NotificationCallback = Arc<dyn Fn(u16, &[u8]) -> Result<(), DecodeError> + Send + Sync>;

/// What a scan observed about one peripheral.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    /// Platform address (`AA:BB:CC:DD:EE:FF` on Linux).
    pub address: String,
    pub name: Option<String>,
    pub service_uuids: Vec<Uuid>,
}

impl fmt::Display for Advertisement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// How discovery picks a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFilter {
    /// Match this address, case-insensitively.
    Address(String),
    /// Match any device advertising this service.
    Service(Uuid),
}

impl DeviceFilter {
    /// An explicit (non-empty) address wins; otherwise match on the Myo
    /// service UUID.
    pub fn for_target(address: Option<&str>) -> Self {
        match address.map(str::trim) {
            Some(addr) if !addr.is_empty() => DeviceFilter::Address(addr.to_owned()),
            _ => DeviceFilter::Service(MYO_SERVICE_UUID),
        }
    }

    pub fn matches(&self, adv: &Advertisement) -> bool {
        match self {
            DeviceFilter::Address(addr) => adv.address.eq_ignore_ascii_case(addr),
            DeviceFilter::Service(uuid) => adv.service_uuids.contains(uuid),
        }
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFilter::Address(addr) => write!(f, "address {addr}"),
            DeviceFilter::Service(uuid) => write!(f, "service UUID {uuid}"),
        }
    }
}

/// A BLE stack capable of driving one Myo connection.
///
/// Implementations own the connection.  Writes racing a disconnect must fail
/// (typically with [`TransportError::NotConnected`]) rather than hang.
#[async_trait]
pub trait Transport: Send + Sync {
    /// A discovered peripheral, ready to connect to.
    type Device: Clone + fmt::Display + Send + Sync;

    /// Run one scan and return the first device matching `filter`, or `None`
    /// if none was seen within the transport's scan window.
    async fn find_device(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Option<Self::Device>, TransportError>;

    async fn connect(&mut self, device: &Self::Device) -> Result<(), TransportError>;

    async fn write(
        &self,
        handle: u16,
        data: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError>;

    async fn read(&self, handle: u16) -> Result<Vec<u8>, TransportError>;

    /// Enable notifications (or indications) on `handle` and route them to
    /// `callback`.
    async fn subscribe(
        &self,
        handle: u16,
        callback: NotificationCallback,
    ) -> Result<(), TransportError>;

    async fn unsubscribe(&self, handle: u16) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
