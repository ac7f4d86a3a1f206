//! Protocol enums and decoded value objects for the Myo armband.
//!
//! Every enum mirrors a closed value set from the firmware header
//! (`myohw.h`).  Decoding an integer outside the set is a
//! [`crate::error::DecodeError::UnknownEnumValue`]; there is no fallback
//! variant.  Decoded samples are produced by [`crate::parse`] and are plain,
//! immutable values.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

use crate::protocol::EMG_CHANNELS;

// ── Enumerations ──────────────────────────────────────────────────────────────

/// Which arm the armband is synced to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Arm {
    Right = 0x01,
    Left = 0x02,
    Unknown = 0xFF,
}

/// Orientation of the armband's +x axis along the arm.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum XDirection {
    TowardWrist = 0x01,
    TowardElbow = 0x02,
    Unknown = 0xFF,
}

/// Tag byte of a classifier event notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ClassifierEventType {
    ArmSynced = 0x01,
    ArmUnsynced = 0x02,
    Pose = 0x03,
    Unlocked = 0x04,
    Locked = 0x05,
    SyncFailed = 0x06,
    WarmupCompleted = 0x07,
}

/// On-device pose classifier switch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ClassifierMode {
    #[default]
    Disabled = 0x00,
    Enabled = 0x01,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ClassifierModelType {
    Builtin = 0x00,
    Custom = 0x01,
}

/// EMG streaming mode.
///
/// | Mode | Characteristic(s) streamed |
/// |---|---|
/// | `None` | – |
/// | `SendFilt` | FV data (filtered values, ~50 Hz) |
/// | `SendEmg` | EMG0..EMG3 (~200 Hz) |
/// | `SendRaw` | EMG0..EMG3, unfiltered |
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum EmgMode {
    None = 0x00,
    #[default]
    SendFilt = 0x01,
    SendEmg = 0x02,
    SendRaw = 0x03,
}

/// IMU streaming mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ImuMode {
    #[default]
    None = 0x00,
    SendData = 0x01,
    SendEvents = 0x02,
    SendAll = 0x03,
    SendRaw = 0x04,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum HardwareRev {
    Unknown = 0,
    RevC = 1,
    RevD = 2,
    RevS = 3,
}

impl HardwareRev {
    pub fn name(self) -> &'static str {
        match self {
            HardwareRev::Unknown => "UNKNOWN",
            HardwareRev::RevC => "REVC",
            HardwareRev::RevD => "REVD",
            HardwareRev::RevS => "REVS",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum MotionEventType {
    Tap = 0x00,
}

/// Pose recognised by the on-device classifier.  Carried as a `u16` on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum Pose {
    Rest = 0x0000,
    Fist = 0x0001,
    WaveIn = 0x0002,
    WaveOut = 0x0003,
    FingersSpread = 0x0004,
    DoubleTap = 0x0005,
    Unknown = 0xFFFF,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Sku {
    Unknown = 0,
    Black = 1,
    White = 2,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SleepMode {
    /// Sleep after a period of inactivity.
    Normal = 0,
    NeverSleep = 1,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SyncResult {
    FailedTooHard = 0x01,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum UnlockType {
    Lock = 0x00,
    Timed = 0x01,
    Hold = 0x02,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum UserActionType {
    Single = 0x00,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum VibrationType {
    None = 0x00,
    Short = 0x01,
    Medium = 0x02,
    Long = 0x03,
}

// ── Mode configuration ────────────────────────────────────────────────────────

/// The (classifier, EMG, IMU) mode triple applied by `SetMode`.
///
/// Named fields keep callers from mixing up the argument order; the wire
/// order (EMG, IMU, classifier) is fixed by [`crate::command::Command::encode`].
/// The default streams filtered EMG values only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ModeConfig {
    pub classifier: ClassifierMode,
    pub emg: EmgMode,
    pub imu: ImuMode,
}

impl ModeConfig {
    pub fn new(classifier: ClassifierMode, emg: EmgMode, imu: ImuMode) -> Self {
        Self {
            classifier,
            emg,
            imu,
        }
    }
}

// ── LED colour ────────────────────────────────────────────────────────────────

/// One RGB colour for the logo or line LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

// ── Decoded samples ───────────────────────────────────────────────────────────

/// One 8-channel EMG sample, one signed byte per electrode pod.
pub type EmgSample = [i8; EMG_CHANNELS];

/// An EMG notification from one of the four EMG characteristics.
///
/// Each notification carries two chronological samples at ~200 Hz:
/// `sample1` is the older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmgData {
    pub sample1: EmgSample,
    pub sample2: EmgSample,
}

/// Filtered EMG values ("FV"), streamed in `EmgMode::SendFilt` at ~50 Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FvData {
    /// One filtered magnitude per electrode pod.
    pub values: [u16; EMG_CHANNELS],
    pub mask: i8,
}

/// Orientation quaternion, unit-scaled (raw ÷ 16384).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A 3-axis reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// One IMU notification (~50 Hz).
///
/// | Field | Unit | Raw scale |
/// |---|---|---|
/// | `orientation` | unit quaternion | ÷ 16384 |
/// | `accelerometer` | g | ÷ 2048 |
/// | `gyroscope` | °/s | ÷ 16 |
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImuData {
    pub orientation: Quaternion,
    pub accelerometer: Vector3,
    pub gyroscope: Vector3,
}

/// A motion event (indicated, not notified).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotionEvent {
    Tap { direction: i8, count: i8 },
}

impl MotionEvent {
    pub fn event_type(&self) -> MotionEventType {
        match self {
            MotionEvent::Tap { .. } => MotionEventType::Tap,
        }
    }
}

/// A classifier event.  Only the bytes belonging to the active variant are
/// exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassifierEvent {
    ArmSynced { arm: Arm, x_direction: XDirection },
    ArmUnsynced,
    Pose { pose: Pose },
    Unlocked,
    Locked,
    SyncFailed { reason: SyncResult },
    WarmupCompleted,
}

impl ClassifierEvent {
    pub fn event_type(&self) -> ClassifierEventType {
        match self {
            ClassifierEvent::ArmSynced { .. } => ClassifierEventType::ArmSynced,
            ClassifierEvent::ArmUnsynced => ClassifierEventType::ArmUnsynced,
            ClassifierEvent::Pose { .. } => ClassifierEventType::Pose,
            ClassifierEvent::Unlocked => ClassifierEventType::Unlocked,
            ClassifierEvent::Locked => ClassifierEventType::Locked,
            ClassifierEvent::SyncFailed { .. } => ClassifierEventType::SyncFailed,
            ClassifierEvent::WarmupCompleted => ClassifierEventType::WarmupCompleted,
        }
    }
}

/// Contents of the read-only firmware info characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmwareInfo {
    /// Colon-separated upper-case hex, most significant byte first
    /// (e.g. `"D2:3B:85:94:32:8E"`).
    pub serial_number: String,
    pub unlock_pose: Pose,
    pub active_classifier_type: ClassifierModelType,
    pub active_classifier_index: u8,
    pub has_custom_classifier: bool,
    pub stream_indicating: bool,
    pub sku: Sku,
}

/// Firmware version; displays as `major.minor.patch.REV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FirmwareVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub hardware_rev: HardwareRev,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major,
            self.minor,
            self.patch,
            self.hardware_rev.name()
        )
    }
}

/// A filtered-value sample paired with the IMU sample that completed it.
///
/// Produced by [`crate::aggregate::Aggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregatedData {
    pub fv: FvData,
    pub imu: ImuData,
}

// ── Event stream ──────────────────────────────────────────────────────────────

/// All data events forwarded by [`crate::dispatch::ChannelHandler`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum MyoEvent {
    /// A full EMG notification; `channel` is the EMG characteristic index (0–3).
    Emg { channel: u8, data: EmgData },
    /// One half of an EMG notification, produced when EMG aggregation is on.
    EmgSample(EmgSample),
    Fv(FvData),
    Imu(ImuData),
    /// FV + IMU pair, produced when FV/IMU aggregation is on.
    Aggregated(AggregatedData),
    Motion(MotionEvent),
    Classifier(ClassifierEvent),
}
