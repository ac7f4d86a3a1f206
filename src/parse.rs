//! Binary decoders for Myo notification and read payloads.
//!
//! All functions in this module are pure and safe to call from any async or
//! sync context.  Every payload has an exact length; a shorter or longer
//! buffer is a [`DecodeError::InvalidLength`], never truncated or padded.
//! Multi-byte integers are little-endian.
//!
//! | Type | Bytes | Layout |
//! |---|---|---|
//! | [`EmgData`] | 16 | 2 × 8 × `i8` |
//! | [`FvData`] | 17 | 8 × `u16` + `i8` mask |
//! | [`ImuData`] | 20 | 10 × `i16`: quat w,x,y,z; accel x,y,z; gyro x,y,z |
//! | [`MotionEvent`] | 3 | `i8` type, direction, count |
//! | [`ClassifierEvent`] | 6 | `u8` type + variant bytes |
//! | [`FirmwareVersion`] | 8 | 4 × `u16` |
//! | [`FirmwareInfo`] | 20 | 6 B serial, `u16` unlock pose, 12 B flags |
//! | battery level | 1 | `u8` percent |

use num_enum::TryFromPrimitive;

use crate::error::DecodeError;
use crate::protocol::{
    ACCELEROMETER_SCALE, EMG_CHANNELS, GYROSCOPE_SCALE, ORIENTATION_SCALE,
};
use crate::types::{
    Arm, ClassifierEvent, ClassifierEventType, ClassifierModelType, EmgData, FirmwareInfo,
    FirmwareVersion, FvData, HardwareRev, ImuData, MotionEvent, MotionEventType, Pose,
    Quaternion, Sku, SyncResult, Vector3, XDirection,
};

/// A value decoded from a fixed-length payload.
pub trait Decode: Sized {
    /// Human-readable name used in error messages.
    const KIND: &'static str;
    /// Exact payload length in bytes.
    const WIRE_LEN: usize;

    fn decode(data: &[u8]) -> Result<Self, DecodeError>;
}

/// Decode any [`Decode`] type; `decode::<ImuData>(&bytes)`.
pub fn decode<T: Decode>(data: &[u8]) -> Result<T, DecodeError> {
    T::decode(data)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Check the exact length and hand back a fixed-size view.
fn exact<'a, const N: usize>(
    kind: &'static str,
    data: &'a [u8],
) -> Result<&'a [u8; N], DecodeError> {
    data.try_into().map_err(|_| DecodeError::InvalidLength {
        kind,
        expected: N,
        actual: data.len(),
    })
}

/// Match a raw integer against an enum's closed value set.
fn enum_value<E>(raw: E::Primitive) -> Result<E, DecodeError>
where
    E: TryFromPrimitive,
    E::Primitive: Into<u32>,
{
    E::try_from_primitive(raw).map_err(|_| DecodeError::UnknownEnumValue {
        kind: E::NAME,
        value: raw.into(),
    })
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_i16_le(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

// ── EMG ──────────────────────────────────────────────────────────────────────

impl Decode for EmgData {
    const KIND: &'static str = "EMG data";
    const WIRE_LEN: usize = 16;

    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let raw = exact::<16>(Self::KIND, data)?;
        let mut sample1 = [0i8; EMG_CHANNELS];
        let mut sample2 = [0i8; EMG_CHANNELS];
        let (first, second) = raw.split_at(EMG_CHANNELS);
        for (out, &b) in sample1.iter_mut().zip(first) {
            *out = b as i8;
        }
        for (out, &b) in sample2.iter_mut().zip(second) {
            *out = b as i8;
        }
        Ok(EmgData { sample1, sample2 })
    }
}

impl Decode for FvData {
    const KIND: &'static str = "FV data";
    const WIRE_LEN: usize = 17;

    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let raw = exact::<17>(Self::KIND, data)?;
        let mut values = [0u16; EMG_CHANNELS];
        for (i, v) in values.iter_mut().enumerate() {
            *v = read_u16_le(raw, i * 2);
        }
        Ok(FvData {
            values,
            mask: raw[2 * EMG_CHANNELS] as i8,
        })
    }
}

// ── IMU ───────────────────────────────────────────────────────────────────────

impl Decode for ImuData {
    const KIND: &'static str = "IMU data";
    const WIRE_LEN: usize = 20;

    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let raw = exact::<20>(Self::KIND, data)?;
        let v = |slot: usize| read_i16_le(raw, slot * 2) as f32;

        Ok(ImuData {
            orientation: Quaternion {
                w: v(0) / ORIENTATION_SCALE,
                x: v(1) / ORIENTATION_SCALE,
                y: v(2) / ORIENTATION_SCALE,
                z: v(3) / ORIENTATION_SCALE,
            },
            accelerometer: Vector3 {
                x: v(4) / ACCELEROMETER_SCALE,
                y: v(5) / ACCELEROMETER_SCALE,
                z: v(6) / ACCELEROMETER_SCALE,
            },
            gyroscope: Vector3 {
                x: v(7) / GYROSCOPE_SCALE,
                y: v(8) / GYROSCOPE_SCALE,
                z: v(9) / GYROSCOPE_SCALE,
            },
        })
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

impl Decode for MotionEvent {
    const KIND: &'static str = "motion event";
    const WIRE_LEN: usize = 3;

    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let raw = exact::<3>(Self::KIND, data)?;
        match enum_value::<MotionEventType>(raw[0])? {
            MotionEventType::Tap => Ok(MotionEvent::Tap {
                direction: raw[1] as i8,
                count: raw[2] as i8,
            }),
        }
    }
}

impl Decode for ClassifierEvent {
    const KIND: &'static str = "classifier event";
    const WIRE_LEN: usize = 6;

    /// Byte 0 selects the variant; bytes 1.. are a union and only the active
    /// variant's bytes are read.
    ///
    /// ```text
    /// ARM_SYNCED  : [1] arm, [2] x_direction
    /// POSE        : [1..3] pose (u16 LE)
    /// SYNC_FAILED : [1] sync_result
    /// ```
    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let raw = exact::<6>(Self::KIND, data)?;
        let event = match enum_value::<ClassifierEventType>(raw[0])? {
            ClassifierEventType::ArmSynced => ClassifierEvent::ArmSynced {
                arm: enum_value::<Arm>(raw[1])?,
                x_direction: enum_value::<XDirection>(raw[2])?,
            },
            ClassifierEventType::ArmUnsynced => ClassifierEvent::ArmUnsynced,
            ClassifierEventType::Pose => ClassifierEvent::Pose {
                pose: enum_value::<Pose>(read_u16_le(raw, 1))?,
            },
            ClassifierEventType::Unlocked => ClassifierEvent::Unlocked,
            ClassifierEventType::Locked => ClassifierEvent::Locked,
            ClassifierEventType::SyncFailed => ClassifierEvent::SyncFailed {
                reason: enum_value::<SyncResult>(raw[1])?,
            },
            ClassifierEventType::WarmupCompleted => ClassifierEvent::WarmupCompleted,
        };
        Ok(event)
    }
}

// ── Read-only characteristics ─────────────────────────────────────────────────

impl Decode for FirmwareVersion {
    const KIND: &'static str = "firmware version";
    const WIRE_LEN: usize = 8;

    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let raw = exact::<8>(Self::KIND, data)?;
        Ok(FirmwareVersion {
            major: read_u16_le(raw, 0),
            minor: read_u16_le(raw, 2),
            patch: read_u16_le(raw, 4),
            hardware_rev: enum_value::<HardwareRev>(read_u16_le(raw, 6))?,
        })
    }
}

impl Decode for FirmwareInfo {
    const KIND: &'static str = "firmware info";
    const WIRE_LEN: usize = 20;

    /// ```text
    /// [0..6]   serial number, least significant byte first
    /// [6..8]   unlock pose (u16 LE)
    /// [8]      active classifier type
    /// [9]      active classifier index
    /// [10]     has custom classifier
    /// [11]     stream indicating
    /// [12]     SKU
    /// [13..20] reserved
    /// ```
    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let raw = exact::<20>(Self::KIND, data)?;
        let serial_number = raw[..6]
            .iter()
            .rev()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":");

        Ok(FirmwareInfo {
            serial_number,
            unlock_pose: enum_value::<Pose>(read_u16_le(raw, 6))?,
            active_classifier_type: enum_value::<ClassifierModelType>(raw[8])?,
            active_classifier_index: raw[9],
            has_custom_classifier: raw[10] != 0,
            stream_indicating: raw[11] != 0,
            sku: enum_value::<Sku>(raw[12])?,
        })
    }
}

/// Decode the standard battery level characteristic (percent).
pub fn parse_battery_level(data: &[u8]) -> Result<u8, DecodeError> {
    let raw = exact::<1>("battery level", data)?;
    Ok(raw[0])
}

/// Decode the manufacturer name string.  Invalid UTF-8 is replaced and
/// trailing NULs are dropped.
pub fn parse_manufacturer_name(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_end_matches('\0')
        .to_owned()
}
