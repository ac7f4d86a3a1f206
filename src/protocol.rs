//! GATT profile, scaling constants, and the mode → subscription policy for
//! the Myo armband.
//!
//! Myo vendor UUIDs live in the namespace
//! `d506XXXX-a904-deb9-4748-2c7f4a124842`; the battery and device information
//! services use the standard Bluetooth SIG base UUID.
//!
//! ```text
//! Handle  Attribute                       Properties
//! ──────  ──────────────────────────────  ──────────────
//!   12    Device Information (service)
//!   13      Manufacturer Name String      read
//!   15    Battery (service)
//!   16      Battery Level                 read, notify
//!   19    Control (service)
//!   20      Firmware Info                 read
//!   22      Firmware Version              read
//!   24      Command                       write
//!   26    IMU (service)
//!   27      IMU Data                      notify
//!   30      Motion Event                  indicate
//!   33    Classifier (service)
//!   34      Classifier Event              indicate
//!   37    FV (service)
//!   38      FV Data                       notify
//!   41    EMG (service)
//!   42      EMG0 Data                     notify
//!   45      EMG1 Data                     notify
//!   48      EMG2 Data                     notify
//!   51      EMG3 Data                     notify
//!   54    Unknown (service)
//!   55      Unknown Characteristic        indicate
//! ```

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;
use uuid::Uuid;

use crate::types::{ClassifierMode, EmgMode, ImuMode, ModeConfig, Rgb};

// ── UUID namespaces ───────────────────────────────────────────────────────────

const MYO_BASE: u128 = 0xd5060000_a904_deb9_4748_2c7f4a124842;
const SIG_BASE: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;
const SHORT_MASK: u128 = 0xffff << 96;

const fn myo_uuid(short: u16) -> Uuid {
    Uuid::from_u128(MYO_BASE | ((short as u128) << 96))
}

const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(SIG_BASE | ((short as u128) << 96))
}

/// Service UUID advertised by every Myo.  Used as the discovery filter when
/// no explicit address is given.
pub const MYO_SERVICE_UUID: Uuid = myo_uuid(0x0001);

// ── Handles ───────────────────────────────────────────────────────────────────

/// A GATT attribute of the Myo, keyed by its numeric ATT handle.
///
/// The handle numbers are fixed by the firmware's attribute table and are the
/// same on every device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, TryFromPrimitive,
    IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum Handle {
    DeviceInformation = 12,
    ManufacturerName = 13,
    BatteryService = 15,
    BatteryLevel = 16,
    ControlService = 19,
    FirmwareInfo = 20,
    FirmwareVersion = 22,
    Command = 24,
    ImuService = 26,
    ImuData = 27,
    MotionEvent = 30,
    ClassifierService = 33,
    ClassifierEvent = 34,
    FvService = 37,
    FvData = 38,
    EmgService = 41,
    Emg0Data = 42,
    Emg1Data = 45,
    Emg2Data = 48,
    Emg3Data = 51,
    UnknownService = 54,
    UnknownChar = 55,
}

/// What a characteristic carries, and therefore which decoder applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// A service declaration; carries no value.
    Service,
    Command,
    BatteryLevel,
    ManufacturerName,
    FirmwareInfo,
    FirmwareVersion,
    ImuData,
    MotionEvent,
    ClassifierEvent,
    FvData,
    /// One of the four EMG characteristics, by index.
    EmgData(u8),
    /// Present on the device but undocumented.
    Unlisted,
}

/// GATT characteristic property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Property {
    Read,
    Write,
    Notify,
    Indicate,
}

/// The four EMG characteristics in index order.
pub const EMG_HANDLES: [Handle; 4] = [
    Handle::Emg0Data,
    Handle::Emg1Data,
    Handle::Emg2Data,
    Handle::Emg3Data,
];

/// Services in handle order.
pub const SERVICES: [Handle; 8] = [
    Handle::DeviceInformation,
    Handle::BatteryService,
    Handle::ControlService,
    Handle::ImuService,
    Handle::ClassifierService,
    Handle::FvService,
    Handle::EmgService,
    Handle::UnknownService,
];

impl Handle {
    /// Look up a raw ATT handle.  Descriptors and anything outside the
    /// profile return `None`; callers skip them.
    pub fn from_raw(raw: u16) -> Option<Handle> {
        Handle::try_from(raw).ok()
    }

    /// Look up a 128-bit attribute UUID.
    pub fn from_uuid(uuid: &Uuid) -> Option<Handle> {
        let value = uuid.as_u128();
        let short = ((value & SHORT_MASK) >> 96) as u16;
        match value & !SHORT_MASK {
            MYO_BASE => match short {
                0x0001 => Some(Handle::ControlService),
                0x0101 => Some(Handle::FirmwareInfo),
                0x0201 => Some(Handle::FirmwareVersion),
                0x0401 => Some(Handle::Command),
                0x0002 => Some(Handle::ImuService),
                0x0402 => Some(Handle::ImuData),
                0x0502 => Some(Handle::MotionEvent),
                0x0003 => Some(Handle::ClassifierService),
                0x0103 => Some(Handle::ClassifierEvent),
                0x0004 => Some(Handle::FvService),
                0x0104 => Some(Handle::FvData),
                0x0005 => Some(Handle::EmgService),
                0x0105 => Some(Handle::Emg0Data),
                0x0205 => Some(Handle::Emg1Data),
                0x0305 => Some(Handle::Emg2Data),
                0x0405 => Some(Handle::Emg3Data),
                0x0006 => Some(Handle::UnknownService),
                0x0602 => Some(Handle::UnknownChar),
                _ => None,
            },
            SIG_BASE => match short {
                0x180a => Some(Handle::DeviceInformation),
                0x2a29 => Some(Handle::ManufacturerName),
                0x180f => Some(Handle::BatteryService),
                0x2a19 => Some(Handle::BatteryLevel),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn raw(self) -> u16 {
        self.into()
    }

    pub fn uuid(self) -> Uuid {
        match self {
            Handle::DeviceInformation => sig_uuid(0x180a),
            Handle::ManufacturerName => sig_uuid(0x2a29),
            Handle::BatteryService => sig_uuid(0x180f),
            Handle::BatteryLevel => sig_uuid(0x2a19),
            Handle::ControlService => myo_uuid(0x0001),
            Handle::FirmwareInfo => myo_uuid(0x0101),
            Handle::FirmwareVersion => myo_uuid(0x0201),
            Handle::Command => myo_uuid(0x0401),
            Handle::ImuService => myo_uuid(0x0002),
            Handle::ImuData => myo_uuid(0x0402),
            Handle::MotionEvent => myo_uuid(0x0502),
            Handle::ClassifierService => myo_uuid(0x0003),
            Handle::ClassifierEvent => myo_uuid(0x0103),
            Handle::FvService => myo_uuid(0x0004),
            Handle::FvData => myo_uuid(0x0104),
            Handle::EmgService => myo_uuid(0x0005),
            Handle::Emg0Data => myo_uuid(0x0105),
            Handle::Emg1Data => myo_uuid(0x0205),
            Handle::Emg2Data => myo_uuid(0x0305),
            Handle::Emg3Data => myo_uuid(0x0405),
            Handle::UnknownService => myo_uuid(0x0006),
            Handle::UnknownChar => myo_uuid(0x0602),
        }
    }

    pub fn role(self) -> Role {
        match self {
            Handle::DeviceInformation
            | Handle::BatteryService
            | Handle::ControlService
            | Handle::ImuService
            | Handle::ClassifierService
            | Handle::FvService
            | Handle::EmgService
            | Handle::UnknownService => Role::Service,
            Handle::ManufacturerName => Role::ManufacturerName,
            Handle::BatteryLevel => Role::BatteryLevel,
            Handle::FirmwareInfo => Role::FirmwareInfo,
            Handle::FirmwareVersion => Role::FirmwareVersion,
            Handle::Command => Role::Command,
            Handle::ImuData => Role::ImuData,
            Handle::MotionEvent => Role::MotionEvent,
            Handle::ClassifierEvent => Role::ClassifierEvent,
            Handle::FvData => Role::FvData,
            Handle::Emg0Data => Role::EmgData(0),
            Handle::Emg1Data => Role::EmgData(1),
            Handle::Emg2Data => Role::EmgData(2),
            Handle::Emg3Data => Role::EmgData(3),
            Handle::UnknownChar => Role::Unlisted,
        }
    }

    pub fn is_service(self) -> bool {
        self.role() == Role::Service
    }

    /// The service this attribute belongs to.  Services return themselves.
    pub fn service(self) -> Handle {
        match self {
            Handle::DeviceInformation | Handle::ManufacturerName => Handle::DeviceInformation,
            Handle::BatteryService | Handle::BatteryLevel => Handle::BatteryService,
            Handle::ControlService
            | Handle::FirmwareInfo
            | Handle::FirmwareVersion
            | Handle::Command => Handle::ControlService,
            Handle::ImuService | Handle::ImuData | Handle::MotionEvent => Handle::ImuService,
            Handle::ClassifierService | Handle::ClassifierEvent => Handle::ClassifierService,
            Handle::FvService | Handle::FvData => Handle::FvService,
            Handle::EmgService
            | Handle::Emg0Data
            | Handle::Emg1Data
            | Handle::Emg2Data
            | Handle::Emg3Data => Handle::EmgService,
            Handle::UnknownService | Handle::UnknownChar => Handle::UnknownService,
        }
    }

    /// Characteristics grouped under this service, in handle order.
    /// Empty for characteristics.
    pub fn characteristics(self) -> &'static [Handle] {
        match self {
            Handle::DeviceInformation => &[Handle::ManufacturerName],
            Handle::BatteryService => &[Handle::BatteryLevel],
            Handle::ControlService => &[
                Handle::FirmwareInfo,
                Handle::FirmwareVersion,
                Handle::Command,
            ],
            Handle::ImuService => &[Handle::ImuData, Handle::MotionEvent],
            Handle::ClassifierService => &[Handle::ClassifierEvent],
            Handle::FvService => &[Handle::FvData],
            Handle::EmgService => &EMG_HANDLES,
            Handle::UnknownService => &[Handle::UnknownChar],
            _ => &[],
        }
    }

    pub fn properties(self) -> &'static [Property] {
        match self.role() {
            Role::Service => &[],
            Role::Command => &[Property::Write],
            Role::BatteryLevel => &[Property::Read, Property::Notify],
            Role::ManufacturerName | Role::FirmwareInfo | Role::FirmwareVersion => {
                &[Property::Read]
            }
            Role::ImuData | Role::FvData | Role::EmgData(_) => &[Property::Notify],
            Role::MotionEvent | Role::ClassifierEvent | Role::Unlisted => &[Property::Indicate],
        }
    }

    pub fn is_readable(self) -> bool {
        self.properties().contains(&Property::Read)
    }

    /// Upper-case identifier, e.g. `"FV_DATA"`.
    pub fn name(self) -> &'static str {
        match self {
            Handle::DeviceInformation => "DEVICE_INFORMATION",
            Handle::ManufacturerName => "MANUFACTURER_NAME_STRING",
            Handle::BatteryService => "BATTERY_SERVICE",
            Handle::BatteryLevel => "BATTERY_LEVEL",
            Handle::ControlService => "CONTROL_SERVICE",
            Handle::FirmwareInfo => "FIRMWARE_INFO",
            Handle::FirmwareVersion => "FIRMWARE_VERSION",
            Handle::Command => "COMMAND",
            Handle::ImuService => "IMU_SERVICE",
            Handle::ImuData => "IMU_DATA",
            Handle::MotionEvent => "MOTION_EVENT",
            Handle::ClassifierService => "CLASSIFIER_SERVICE",
            Handle::ClassifierEvent => "CLASSIFIER_EVENT",
            Handle::FvService => "FV_SERVICE",
            Handle::FvData => "FV_DATA",
            Handle::EmgService => "EMG_SERVICE",
            Handle::Emg0Data => "EMG0_DATA",
            Handle::Emg1Data => "EMG1_DATA",
            Handle::Emg2Data => "EMG2_DATA",
            Handle::Emg3Data => "EMG3_DATA",
            Handle::UnknownService => "UNKNOWN_SERVICE",
            Handle::UnknownChar => "UNKNOWN_CHAR",
        }
    }
}

/// Resolve a raw ATT handle to its role.  `None` for handles outside the
/// profile (descriptors, unlisted services).
pub fn role_of(raw: u16) -> Option<Role> {
    Handle::from_raw(raw).map(Handle::role)
}

/// Resolve an attribute UUID to its role.
pub fn role_of_uuid(uuid: &Uuid) -> Option<Role> {
    Handle::from_uuid(uuid).map(Handle::role)
}

// ── Subscription policy ───────────────────────────────────────────────────────

/// The notification/indication handles that must be subscribed for `modes`.
///
/// Both `start` and `stop` call this, so the subscribe and unsubscribe sets
/// are always the same.  Order: EMG (or FV), IMU data, motion events,
/// classifier events.
pub fn notification_handles(modes: &ModeConfig) -> Vec<Handle> {
    let mut handles = Vec::with_capacity(7);

    match modes.emg {
        EmgMode::SendEmg | EmgMode::SendRaw => handles.extend_from_slice(&EMG_HANDLES),
        EmgMode::SendFilt => handles.push(Handle::FvData),
        EmgMode::None => {}
    }

    if !matches!(modes.imu, ImuMode::None | ImuMode::SendEvents) {
        handles.push(Handle::ImuData);
    }
    if matches!(modes.imu, ImuMode::SendEvents | ImuMode::SendAll) {
        handles.push(Handle::MotionEvent);
    }

    if modes.classifier == ClassifierMode::Enabled {
        handles.push(Handle::ClassifierEvent);
    }

    handles
}

// ── Sampling constants ────────────────────────────────────────────────────────

/// Raw orientation units per 1.0 of a unit quaternion component.
pub const ORIENTATION_SCALE: f32 = 16384.0;

/// Raw accelerometer units per g.
pub const ACCELEROMETER_SCALE: f32 = 2048.0;

/// Raw gyroscope units per °/s.
pub const GYROSCOPE_SCALE: f32 = 16.0;

/// Native EMG streaming rate in Hz (two samples per notification).
pub const EMG_DEFAULT_STREAMING_RATE: u32 = 200;

/// Native IMU and FV streaming rate in Hz.
pub const DEFAULT_IMU_SAMPLE_RATE: u32 = 50;

/// Channels per EMG sample (one per electrode pod).
pub const EMG_CHANNELS: usize = 8;

// ── LED palette ───────────────────────────────────────────────────────────────

pub const RGB_BLACK: Rgb = Rgb::new(0, 0, 0);
pub const RGB_WHITE: Rgb = Rgb::new(255, 255, 255);
pub const RGB_RED: Rgb = Rgb::new(255, 0, 0);
pub const RGB_GREEN: Rgb = Rgb::new(0, 255, 0);
pub const RGB_BLUE: Rgb = Rgb::new(0, 0, 255);
pub const RGB_CYAN: Rgb = Rgb::new(0, 255, 255);
pub const RGB_YELLOW: Rgb = Rgb::new(255, 255, 0);
pub const RGB_PINK: Rgb = Rgb::new(255, 105, 180);
pub const RGB_PURPLE: Rgb = Rgb::new(100, 0, 100);

#[cfg(test)]
mod tests {
    use super::*;

    fn all_handles() -> Vec<Handle> {
        SERVICES
            .iter()
            .flat_map(|s| std::iter::once(*s).chain(s.characteristics().iter().copied()))
            .collect()
    }

    #[test]
    fn test_registry_covers_every_handle() {
        assert_eq!(all_handles().len(), 22);
    }

    #[test]
    fn test_raw_and_uuid_lookup_agree() {
        for h in all_handles() {
            assert_eq!(Handle::from_raw(h.raw()), Some(h));
            assert_eq!(Handle::from_uuid(&h.uuid()), Some(h), "{}", h.name());
            assert_eq!(h.service().characteristics().contains(&h), !h.is_service());
        }
    }

    #[test]
    fn test_known_uuid_strings() {
        let fv: Uuid = "d5060104-a904-deb9-4748-2c7f4a124842".parse().unwrap();
        assert_eq!(Handle::from_uuid(&fv), Some(Handle::FvData));

        let battery: Uuid = "00002a19-0000-1000-8000-00805f9b34fb".parse().unwrap();
        assert_eq!(Handle::from_uuid(&battery), Some(Handle::BatteryLevel));

        assert_eq!(
            MYO_SERVICE_UUID.to_string(),
            "d5060001-a904-deb9-4748-2c7f4a124842"
        );
    }

    #[test]
    fn test_unknown_lookups_return_none() {
        // CCC descriptor of EMG0
        assert_eq!(Handle::from_raw(44), None);
        assert_eq!(role_of(0), None);
        let cccd: Uuid = "00002902-0000-1000-8000-00805f9b34fb".parse().unwrap();
        assert_eq!(role_of_uuid(&cccd), None);
        assert_eq!(role_of(42), Some(Role::EmgData(0)));
    }

    #[test]
    fn test_filtered_all_imu_with_classifier() {
        let modes = ModeConfig::new(ClassifierMode::Enabled, EmgMode::SendFilt, ImuMode::SendAll);
        assert_eq!(
            notification_handles(&modes),
            vec![
                Handle::FvData,
                Handle::ImuData,
                Handle::MotionEvent,
                Handle::ClassifierEvent
            ]
        );
    }

    #[test]
    fn test_everything_off_subscribes_nothing() {
        let modes = ModeConfig::new(ClassifierMode::Disabled, EmgMode::None, ImuMode::None);
        assert!(notification_handles(&modes).is_empty());
    }

    #[test]
    fn test_raw_emg_and_imu_policy() {
        let modes = ModeConfig::new(ClassifierMode::Disabled, EmgMode::SendRaw, ImuMode::SendData);
        let mut expected = EMG_HANDLES.to_vec();
        expected.push(Handle::ImuData);
        assert_eq!(notification_handles(&modes), expected);

        let events_only =
            ModeConfig::new(ClassifierMode::Disabled, EmgMode::None, ImuMode::SendEvents);
        assert_eq!(notification_handles(&events_only), vec![Handle::MotionEvent]);

        let raw_imu = ModeConfig::new(ClassifierMode::Disabled, EmgMode::None, ImuMode::SendRaw);
        assert_eq!(notification_handles(&raw_imu), vec![Handle::ImuData]);
    }

    #[test]
    fn test_only_notifying_handles_are_subscribed() {
        let modes = ModeConfig::new(ClassifierMode::Enabled, EmgMode::SendEmg, ImuMode::SendAll);
        for h in notification_handles(&modes) {
            let props = h.properties();
            assert!(
                props.contains(&Property::Notify) || props.contains(&Property::Indicate),
                "{}",
                h.name()
            );
        }
    }
}
