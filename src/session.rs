//! One Myo connection, driven through its lifecycle.
//!
//! ```text
//! Idle ─discover─▶ Discovering ─connect─▶ Connected ─setup─▶ Configured ─start─▶ Streaming
//!                                                              ▲                    │
//!                                                              └─setup── Stopped ◀─stop
//!                                                                          └─start─▶ Streaming
//!
//! any connected state ─disconnect / sleep─▶ Disconnected
//! ```
//!
//! Every operation checks the state first and fails with a
//! [`PreconditionError`] without touching the transport.  A transport failure
//! part-way through an operation leaves the session in the state it was in
//! before the call.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use crate::command::Command;
use crate::dispatch::{DispatchOptions, EventDispatcher, MyoHandler};
use crate::error::{MyoError, PreconditionError, Result, TransportError};
use crate::parse::{decode, parse_battery_level, parse_manufacturer_name};
use crate::protocol::{
    notification_handles, Handle, Property, Role, RGB_CYAN, RGB_PINK, RGB_WHITE, RGB_YELLOW,
    SERVICES,
};
use crate::transport::{DeviceFilter, Transport};
use crate::types::{
    FirmwareInfo, FirmwareVersion, ModeConfig, Rgb, SleepMode, UnlockType, UserActionType,
    VibrationType,
};

/// Where a [`Session`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing discovered yet.
    Idle,
    /// A device has been found and can be connected to.
    Discovering,
    Connected,
    /// Modes applied; ready to stream.
    Configured,
    Streaming,
    /// Subscriptions removed; can start again or be reconfigured.
    Stopped,
    /// Terminal.
    Disconnected,
}

impl SessionState {
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            SessionState::Connected
                | SessionState::Configured
                | SessionState::Streaming
                | SessionState::Stopped
        )
    }
}

/// Timing and routing knobs for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause between attempts in [`Session::discover_with_retry`].
    /// Default: 1 s.
    pub retry_backoff: Duration,
    /// Wait after switching back to normal sleep mode before disconnecting in
    /// [`Session::sleep`].  Default: 500 ms.
    pub settle_delay: Duration,
    /// Substituted for the acknowledgement vibrations in [`Session::stop`]
    /// when the device rejects them.  Default: 500 ms.
    pub stop_fallback_delay: Duration,
    pub dispatch: DispatchOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(1),
            settle_delay: Duration::from_millis(500),
            stop_fallback_delay: Duration::from_millis(500),
            dispatch: DispatchOptions::default(),
        }
    }
}

// ── Service listing ───────────────────────────────────────────────────────────

/// One service of the GATT profile with its characteristics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceReport {
    pub handle: u16,
    pub name: &'static str,
    pub uuid: String,
    pub characteristics: Vec<CharacteristicReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacteristicReport {
    pub handle: u16,
    pub name: &'static str,
    pub uuid: String,
    pub properties: Vec<Property>,
    /// Decoded value of readable characteristics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<CharacteristicValue>,
}

/// A characteristic value decoded according to its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Text(String),
    Percent(u8),
    FirmwareInfo(FirmwareInfo),
    /// Lower-case hex of a value with no dedicated decoder.
    Raw(String),
}

// ── Session ───────────────────────────────────────────────────────────────────

/// A Myo connection over transport `T`, delivering data to handler `H`.
pub struct Session<T: Transport, H: ?Sized> {
    transport: T,
    dispatcher: Arc<EventDispatcher<H>>,
    config: SessionConfig,
    state: SessionState,
    device: Option<T::Device>,
    modes: Option<ModeConfig>,
}

impl<T, H> Session<T, H>
where
    T: Transport,
    H: MyoHandler + ?Sized + 'static,
{
    pub fn new(transport: T, handler: Arc<H>, config: SessionConfig) -> Self {
        let dispatcher = Arc::new(EventDispatcher::new(handler, config.dispatch));
        Self {
            transport,
            dispatcher,
            config,
            state: SessionState::Idle,
            device: None,
            modes: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The mode triple applied by the last successful [`Session::setup`].
    pub fn modes(&self) -> Option<ModeConfig> {
        self.modes
    }

    pub fn device(&self) -> Option<&T::Device> {
        self.device.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher<H>> {
        &self.dispatcher
    }

    fn label(&self) -> String {
        self.device
            .as_ref()
            .map_or_else(|| "Myo".to_owned(), ToString::to_string)
    }

    fn ensure_connected(&self) -> Result<(), PreconditionError> {
        if self.state.is_connected() {
            Ok(())
        } else {
            Err(PreconditionError::NotConnected)
        }
    }

    fn invalid(&self, op: &'static str) -> MyoError {
        PreconditionError::InvalidState {
            op,
            state: self.state,
        }
        .into()
    }

    // ── Discovery & connection ────────────────────────────────────────────────

    /// Run one scan for a device at `address`, or for any device advertising
    /// the Myo service when `address` is `None` or empty.
    ///
    /// Fails with [`MyoError::DeviceNotFound`] when nothing matches; retrying
    /// is up to the caller (see [`Session::discover_with_retry`]).
    pub async fn discover(&mut self, address: Option<&str>) -> Result<T::Device> {
        if !matches!(self.state, SessionState::Idle | SessionState::Discovering) {
            return Err(self.invalid("discover"));
        }

        let filter = DeviceFilter::for_target(address);
        info!("Scanning for a Myo by {filter} …");
        let previous = self.state;
        self.state = SessionState::Discovering;

        match self.transport.find_device(&filter).await {
            Ok(Some(device)) => {
                info!("Found {device}");
                self.device = Some(device.clone());
                Ok(device)
            }
            Ok(None) => {
                self.state = previous;
                Err(MyoError::DeviceNotFound(filter.to_string()))
            }
            Err(e) => {
                self.state = previous;
                Err(e.into())
            }
        }
    }

    /// [`Session::discover`] until a device is found, sleeping
    /// `config.retry_backoff` between attempts.  Errors other than
    /// "not found" end the loop.
    pub async fn discover_with_retry(&mut self, address: Option<&str>) -> Result<T::Device> {
        let mut attempt = 1u32;
        loop {
            match self.discover(address).await {
                Err(MyoError::DeviceNotFound(filter)) => {
                    warn!(
                        "Attempt {attempt}: no Myo matched {filter}, retrying in {:?}",
                        self.config.retry_backoff
                    );
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                other => return other,
            }
        }
    }

    /// Connect to the discovered device.
    pub async fn connect(&mut self) -> Result<()> {
        let Some(device) = self.device.clone() else {
            return Err(PreconditionError::NoDevice.into());
        };
        if self.state != SessionState::Discovering {
            return Err(self.invalid("connect"));
        }

        self.transport
            .connect(&device)
            .await
            .map_err(|source| MyoError::ConnectionFailed {
                device: device.to_string(),
                source,
            })?;

        self.state = SessionState::Connected;
        info!("Connected to {device}");
        Ok(())
    }

    /// Close the connection.  Calling this when not connected only logs a
    /// warning.
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.state.is_connected() {
            warn!("{} is already disconnected", self.label());
            return Ok(());
        }

        self.transport.disconnect().await?;
        self.dispatcher.aggregator().reset();
        self.state = SessionState::Disconnected;
        info!("Disconnected from {}", self.label());
        Ok(())
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Configure the device and remember `modes` for [`Session::start`].
    ///
    /// LED yellow → log battery → 3 short vibrations → never sleep →
    /// `SetMode(modes)` → LED pink.
    pub async fn setup(&mut self, modes: ModeConfig) -> Result<()> {
        match self.state {
            SessionState::Connected | SessionState::Configured | SessionState::Stopped => {}
            SessionState::Streaming => return Err(self.invalid("configure")),
            _ => return Err(PreconditionError::NotConnected.into()),
        }

        info!("Setting up {}", self.label());
        self.led(RGB_YELLOW, RGB_YELLOW).await?;
        let battery = self.battery_level().await?;
        info!("Remaining battery: {battery} %");
        for _ in 0..3 {
            self.vibrate(VibrationType::Short).await?;
        }
        self.set_sleep_mode(SleepMode::NeverSleep).await?;
        self.set_mode(modes).await?;
        self.led(RGB_PINK, RGB_PINK).await?;

        debug!("Modes applied: {modes:?}");
        self.modes = Some(modes);
        self.state = SessionState::Configured;
        Ok(())
    }

    /// Subscribe to every handle the configured modes stream, then
    /// acknowledge with one short vibration and a cyan LED.
    ///
    /// If any subscription fails, the ones already made are undone.
    pub async fn start(&mut self) -> Result<()> {
        let modes = match self.state {
            SessionState::Configured | SessionState::Stopped => {
                self.modes.ok_or(PreconditionError::NotConfigured)?
            }
            SessionState::Connected => return Err(PreconditionError::NotConfigured.into()),
            SessionState::Streaming => return Err(self.invalid("start")),
            _ => return Err(PreconditionError::NotConnected.into()),
        };

        info!("Starting notifications from {}", self.label());
        self.vibrate(VibrationType::Short).await?;

        let handles = notification_handles(&modes);
        let callback = self.dispatcher.callback();
        for (i, handle) in handles.iter().enumerate() {
            debug!("Subscribing to {}", handle.name());
            if let Err(e) = self
                .transport
                .subscribe(handle.raw(), Arc::clone(&callback))
                .await
            {
                self.rollback(&handles[..i]).await;
                return Err(e.into());
            }
        }

        if let Err(e) = self.led(RGB_CYAN, RGB_CYAN).await {
            self.rollback(&handles).await;
            return Err(e);
        }

        self.state = SessionState::Streaming;
        Ok(())
    }

    async fn rollback(&self, handles: &[Handle]) {
        for handle in handles {
            if let Err(e) = self.transport.unsubscribe(handle.raw()).await {
                debug!("Rollback: could not unsubscribe {}: {e}", handle.name());
            }
        }
    }

    /// Unsubscribe the same handles [`Session::start`] subscribed, then two
    /// short vibrations and a white LED.
    ///
    /// The vibrations are a courtesy: if the device rejects them the session
    /// waits `config.stop_fallback_delay` instead and carries on.
    pub async fn stop(&mut self) -> Result<()> {
        match self.state {
            SessionState::Streaming => {}
            state if state.is_connected() => return Err(self.invalid("stop")),
            _ => return Err(PreconditionError::NotConnected.into()),
        }
        let modes = self.modes.ok_or(PreconditionError::NotConfigured)?;

        let handles = notification_handles(&modes);
        for (i, handle) in handles.iter().enumerate() {
            debug!("Unsubscribing from {}", handle.name());
            if let Err(e) = self.transport.unsubscribe(handle.raw()).await {
                let left: Vec<&str> = handles[i..].iter().map(|h| h.name()).collect();
                warn!("Stop aborted, still subscribed to {}", left.join(", "));
                return Err(e.into());
            }
        }

        for _ in 0..2 {
            if let Err(e) = self.vibrate(VibrationType::Short).await {
                warn!(
                    "Stop vibration failed ({e}), waiting {:?} instead",
                    self.config.stop_fallback_delay
                );
                tokio::time::sleep(self.config.stop_fallback_delay).await;
                break;
            }
        }

        self.led(RGB_WHITE, RGB_WHITE).await?;
        self.dispatcher.aggregator().reset();
        self.state = SessionState::Stopped;
        info!("Stopped notifications from {}", self.label());
        Ok(())
    }

    /// LED pink, back to normal sleep mode, settle, disconnect.
    pub async fn sleep(&mut self) -> Result<()> {
        self.ensure_connected()?;
        info!("Putting {} to sleep", self.label());
        self.led(RGB_PINK, RGB_PINK).await?;
        self.set_sleep_mode(SleepMode::Normal).await?;
        tokio::time::sleep(self.config.settle_delay).await;
        self.disconnect().await
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// Encode `command` and write it to the command characteristic.
    pub async fn command(&self, command: Command) -> Result<()> {
        self.ensure_connected()?;
        let frame = command.encode();
        debug!("{:?} → {:02X?}", command.opcode(), frame);
        self.transport
            .write(Handle::Command.raw(), &frame, true)
            .await?;
        Ok(())
    }

    pub async fn vibrate(&self, kind: VibrationType) -> Result<()> {
        self.command(Command::vibrate(kind)).await
    }

    /// Custom vibration; `duration` must fit in 16 bits of milliseconds.
    pub async fn vibrate2(&self, duration: Duration, strength: u8) -> Result<()> {
        self.command(Command::vibrate2(duration, strength)?).await
    }

    pub async fn led(&self, logo: Rgb, line: Rgb) -> Result<()> {
        self.command(Command::led(logo, line)).await
    }

    /// Send `SetMode` directly.  Does not change the modes [`Session::start`]
    /// subscribes for; use [`Session::setup`] for that.
    pub async fn set_mode(&self, modes: ModeConfig) -> Result<()> {
        self.command(Command::set_mode(modes)).await
    }

    pub async fn set_sleep_mode(&self, mode: SleepMode) -> Result<()> {
        self.command(Command::SetSleepMode(mode)).await
    }

    pub async fn unlock(&self, kind: UnlockType) -> Result<()> {
        self.command(Command::Unlock(kind)).await
    }

    pub async fn user_action(&self, kind: UserActionType) -> Result<()> {
        self.command(Command::UserAction(kind)).await
    }

    /// Power the device off.  It only wakes again when plugged in to charge.
    pub async fn deep_sleep(&self) -> Result<()> {
        self.command(Command::DeepSleep).await
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    async fn read(&self, handle: Handle) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        Ok(self.transport.read(handle.raw()).await?)
    }

    /// Battery charge in percent.
    pub async fn battery_level(&self) -> Result<u8> {
        Ok(parse_battery_level(&self.read(Handle::BatteryLevel).await?)?)
    }

    pub async fn firmware_info(&self) -> Result<FirmwareInfo> {
        Ok(decode(&self.read(Handle::FirmwareInfo).await?)?)
    }

    pub async fn firmware_version(&self) -> Result<FirmwareVersion> {
        Ok(decode(&self.read(Handle::FirmwareVersion).await?)?)
    }

    pub async fn manufacturer_name(&self) -> Result<String> {
        Ok(parse_manufacturer_name(
            &self.read(Handle::ManufacturerName).await?,
        ))
    }

    /// Walk the GATT profile, reading and decoding every readable
    /// characteristic.  Characteristics the device does not expose are
    /// listed without a value.
    pub async fn get_services(&self) -> Result<Vec<ServiceReport>> {
        self.ensure_connected()?;

        let mut services = Vec::with_capacity(SERVICES.len());
        for service in SERVICES {
            let mut characteristics = Vec::new();
            for &characteristic in service.characteristics() {
                let value = if characteristic.is_readable() {
                    self.read_value(characteristic).await?
                } else {
                    None
                };
                characteristics.push(CharacteristicReport {
                    handle: characteristic.raw(),
                    name: characteristic.name(),
                    uuid: characteristic.uuid().to_string(),
                    properties: characteristic.properties().to_vec(),
                    value,
                });
            }
            services.push(ServiceReport {
                handle: service.raw(),
                name: service.name(),
                uuid: service.uuid().to_string(),
                characteristics,
            });
        }
        Ok(services)
    }

    async fn read_value(&self, handle: Handle) -> Result<Option<CharacteristicValue>> {
        let data = match self.transport.read(handle.raw()).await {
            Ok(data) => data,
            Err(TransportError::CharacteristicNotFound(_)) => {
                warn!("{} is not exposed by {}", handle.name(), self.label());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let value = match handle.role() {
            Role::ManufacturerName => CharacteristicValue::Text(parse_manufacturer_name(&data)),
            Role::BatteryLevel => CharacteristicValue::Percent(parse_battery_level(&data)?),
            Role::FirmwareInfo => CharacteristicValue::FirmwareInfo(decode(&data)?),
            Role::FirmwareVersion => {
                CharacteristicValue::Text(decode::<FirmwareVersion>(&data)?.to_string())
            }
            _ => CharacteristicValue::Raw(hex::encode(&data)),
        };
        Ok(Some(value))
    }
}
