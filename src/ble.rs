//! [`Transport`] over the host Bluetooth stack, via `btleplug`.
//!
//! `btleplug` does not expose ATT handle numbers on every platform, so
//! characteristics are resolved by UUID after service discovery and keyed by
//! the fixed Myo handle for that UUID ([`Handle::from_uuid`]).
//!
//! Notifications from every subscribed characteristic arrive on a single
//! stream.  A background task reads it and invokes the callback registered
//! for the notification's handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::protocol::Handle;
use crate::transport::{Advertisement, DeviceFilter, NotificationCallback, Transport};

// ── MyoDevice ─────────────────────────────────────────────────────────────────

/// A Myo found by [`BtleTransport::find_device`].
#[derive(Clone, Debug)]
pub struct MyoDevice {
    /// Advertised name, usually `"Myo"`.
    pub name: Option<String>,
    /// Platform BLE identifier.
    /// • Linux / Windows: the MAC address (`AA:BB:CC:DD:EE:FF`)
    /// • macOS: a CoreBluetooth UUID string (MAC addresses are hidden)
    pub address: String,
    pub(crate) peripheral: Peripheral,
}

impl fmt::Display for MyoDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

// ── BleConfig ─────────────────────────────────────────────────────────────────

/// Timeouts for [`BtleTransport`].
#[derive(Debug, Clone)]
pub struct BleConfig {
    /// How long one `find_device` call scans before reporting no match.
    /// Default: 10 s.
    pub scan_timeout: Duration,
    /// Hard limit on the link-layer connect.  Default: 10 s.
    pub connect_timeout: Duration,
    /// Hard limit on GATT service discovery.  Default: 15 s.
    pub discovery_timeout: Duration,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            discovery_timeout: Duration::from_secs(15),
        }
    }
}

// ── BtleTransport ─────────────────────────────────────────────────────────────

type Callbacks = Arc<Mutex<HashMap<u16, NotificationCallback>>>;

/// One connection on the first Bluetooth adapter of the host.
pub struct BtleTransport {
    config: BleConfig,
    adapter: Adapter,
    peripheral: Option<Peripheral>,
    characteristics: HashMap<u16, Characteristic>,
    callbacks: Callbacks,
    tasks: Vec<JoinHandle<()>>,
}

impl BtleTransport {
    /// Open the first Bluetooth adapter.
    ///
    /// On macOS, `CBCentralManager` needs a moment to reach the *poweredOn*
    /// state after initialisation; we wait up to 3 s for that before
    /// returning, because a scan started earlier is a silent no-op.
    pub async fn new(config: BleConfig) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Other("no Bluetooth adapter found".into()))?;

        #[cfg(target_os = "macos")]
        {
            use btleplug::api::CentralState;

            let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
            loop {
                match adapter.adapter_state().await {
                    Ok(CentralState::PoweredOn) => {
                        info!("macOS: adapter is PoweredOn");
                        break;
                    }
                    Ok(state) => {
                        if tokio::time::Instant::now() >= deadline {
                            warn!("macOS: adapter still in state {state:?} after 3 s, proceeding anyway");
                            break;
                        }
                        debug!("macOS: adapter state = {state:?}, waiting…");
                    }
                    Err(e) => {
                        warn!("macOS: adapter_state() error: {e}");
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
        }

        Ok(Self {
            config,
            adapter,
            peripheral: None,
            characteristics: HashMap::new(),
            callbacks: Arc::new(Mutex::new(HashMap::new())),
            tasks: Vec::new(),
        })
    }

    fn peripheral(&self) -> Result<&Peripheral, TransportError> {
        self.peripheral.as_ref().ok_or(TransportError::NotConnected)
    }

    fn characteristic(&self, handle: u16) -> Result<&Characteristic, TransportError> {
        if self.peripheral.is_none() {
            return Err(TransportError::NotConnected);
        }
        if Handle::from_raw(handle).is_none() {
            return Err(TransportError::UnknownHandle(handle));
        }
        self.characteristics
            .get(&handle)
            .ok_or(TransportError::CharacteristicNotFound(handle))
    }

    async fn advertisement(peripheral: &Peripheral) -> Option<Advertisement> {
        let props = peripheral.properties().await.ok().flatten()?;
        let address = if cfg!(target_os = "macos") {
            peripheral.id().to_string()
        } else {
            props.address.to_string()
        };
        Some(Advertisement {
            address,
            name: props.local_name,
            service_uuids: props.services,
        })
    }

    /// Poll the adapter's peripheral list until one matches `filter`.
    async fn poll_until_match(&self, filter: &DeviceFilter) -> MyoDevice {
        loop {
            let peripherals = match self.adapter.peripherals().await {
                Ok(peripherals) => peripherals,
                Err(e) => {
                    warn!("Could not list peripherals: {e}");
                    Vec::new()
                }
            };
            for peripheral in peripherals {
                let Some(adv) = Self::advertisement(&peripheral).await else {
                    continue;
                };
                if filter.matches(&adv) {
                    return MyoDevice {
                        name: adv.name,
                        address: adv.address,
                        peripheral,
                    };
                }
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Route the peripheral's notification stream to the registered callbacks.
    async fn spawn_notification_pump(
        &mut self,
        peripheral: Peripheral,
    ) -> Result<(), TransportError> {
        let mut notifications = peripheral.notifications().await?;
        let callbacks = Arc::clone(&self.callbacks);

        self.tasks.push(tokio::spawn(async move {
            let mut count: u64 = 0;
            while let Some(notif) = notifications.next().await {
                count += 1;
                let Some(handle) = Handle::from_uuid(&notif.uuid) else {
                    debug!("Notification from unknown characteristic {}", notif.uuid);
                    continue;
                };
                if count <= 5 || count % 1000 == 0 {
                    debug!("notif #{count} {} len={}", handle.name(), notif.value.len());
                }

                let callback = callbacks.lock().get(&handle.raw()).cloned();
                let Some(callback) = callback else {
                    debug!("No subscriber for {}", handle.name());
                    continue;
                };
                if let Err(e) = callback(handle.raw(), &notif.value) {
                    warn!("Malformed {} notification: {e}", handle.name());
                }
            }
            info!("Notification stream ended");
        }));
        Ok(())
    }

    /// Log when the adapter reports that the link dropped.
    async fn spawn_disconnect_watcher(&mut self, peripheral: &Peripheral, name: String) {
        let peripheral_id = peripheral.id();
        let mut events = match self.adapter.events().await {
            Ok(events) => events,
            Err(e) => {
                warn!("Disconnect watcher: could not subscribe to adapter events: {e}");
                return;
            }
        };
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(id) = event {
                    if id == peripheral_id {
                        info!("Disconnect watcher: {name} disconnected");
                        break;
                    }
                }
            }
        }));
    }
}

#[async_trait]
impl Transport for BtleTransport {
    type Device = MyoDevice;

    async fn find_device(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Option<MyoDevice>, TransportError> {
        info!(
            "Scanning for {filter} (timeout: {:?}) …",
            self.config.scan_timeout
        );
        self.adapter.start_scan(ScanFilter::default()).await?;
        let found =
            tokio::time::timeout(self.config.scan_timeout, self.poll_until_match(filter)).await;
        self.adapter.stop_scan().await.ok();

        match found {
            Ok(device) => Ok(Some(device)),
            Err(_) => {
                debug!(
                    "No device matched {filter} within {:?}",
                    self.config.scan_timeout
                );
                Ok(None)
            }
        }
    }

    async fn connect(&mut self, device: &MyoDevice) -> Result<(), TransportError> {
        let peripheral = device.peripheral.clone();

        // BlueZ's Device1.Connect can block forever when the device is out of
        // range or the stack is in a bad state.
        tokio::time::timeout(self.config.connect_timeout, peripheral.connect())
            .await
            .map_err(|_| {
                TransportError::ConnectionFailed(format!(
                    "connect timed out after {:?}",
                    self.config.connect_timeout
                ))
            })??;

        // BlueZ reports the connection before its GATT cache is populated;
        // discovering services immediately can return an empty set.
        #[cfg(target_os = "linux")]
        tokio::time::sleep(Duration::from_millis(600)).await;

        tokio::time::timeout(self.config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| {
                TransportError::ConnectionFailed(format!(
                    "service discovery timed out after {:?}",
                    self.config.discovery_timeout
                ))
            })??;

        self.characteristics = peripheral
            .characteristics()
            .into_iter()
            .filter_map(|c| Handle::from_uuid(&c.uuid).map(|h| (h.raw(), c)))
            .collect();
        info!(
            "Connected to {device}, {} known characteristics",
            self.characteristics.len()
        );

        self.spawn_notification_pump(peripheral.clone()).await?;
        self.spawn_disconnect_watcher(&peripheral, device.to_string())
            .await;
        self.peripheral = Some(peripheral);
        Ok(())
    }

    async fn write(
        &self,
        handle: u16,
        data: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(handle)?;
        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.peripheral()?
            .write(characteristic, data, write_type)
            .await?;
        Ok(())
    }

    async fn read(&self, handle: u16) -> Result<Vec<u8>, TransportError> {
        let characteristic = self.characteristic(handle)?;
        Ok(self.peripheral()?.read(characteristic).await?)
    }

    async fn subscribe(
        &self,
        handle: u16,
        callback: NotificationCallback,
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(handle)?;
        self.callbacks.lock().insert(handle, callback);
        if let Err(e) = self.peripheral()?.subscribe(characteristic).await {
            self.callbacks.lock().remove(&handle);
            return Err(e.into());
        }
        Ok(())
    }

    async fn unsubscribe(&self, handle: u16) -> Result<(), TransportError> {
        let characteristic = self.characteristic(handle)?;
        self.peripheral()?.unsubscribe(characteristic).await?;
        self.callbacks.lock().remove(&handle);
        Ok(())
    }

    /// Tear down local state only once the link is closed, so a failed
    /// disconnect leaves the transport usable and the call can be retried.
    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.peripheral()?.disconnect().await?;

        self.peripheral = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.callbacks.lock().clear();
        self.characteristics.clear();
        Ok(())
    }
}
