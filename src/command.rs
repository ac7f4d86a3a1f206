//! Commands written to the Myo command characteristic.
//!
//! Every command is framed the same way:
//!
//! ```text
//! byte 0     : opcode
//! byte 1     : payload length
//! bytes 2..N : payload
//! ```
//!
//! | Command | Opcode | Payload |
//! |---|---|---|
//! | `SetMode` | `0x01` | `emg_mode, imu_mode, classifier_mode` |
//! | `Vibrate` | `0x03` | `vibration_type` |
//! | `DeepSleep` | `0x04` | – |
//! | `Led` | `0x06` | `logo_r, logo_g, logo_b, line_r, line_g, line_b` |
//! | `Vibrate2` | `0x07` | `duration_hi, duration_lo, strength` |
//! | `SetSleepMode` | `0x09` | `sleep_mode` |
//! | `Unlock` | `0x0A` | `unlock_type` |
//! | `UserAction` | `0x0B` | `user_action_type` |
//!
//! Range checks happen when a command is built; [`Command::encode`] never
//! fails.

use std::time::Duration;

use num_enum::IntoPrimitive;

use crate::error::ValidationError;
use crate::types::{ModeConfig, Rgb, SleepMode, UnlockType, UserActionType, VibrationType};

/// Command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive)]
#[repr(u8)]
pub enum Opcode {
    SetMode = 0x01,
    Vibrate = 0x03,
    DeepSleep = 0x04,
    Led = 0x06,
    Vibrate2 = 0x07,
    SetSleepMode = 0x09,
    Unlock = 0x0A,
    UserAction = 0x0B,
}

/// A command for the Myo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    SetMode(ModeConfig),
    Vibrate(VibrationType),
    DeepSleep,
    Led { logo: Rgb, line: Rgb },
    /// Custom vibration.  `strength` 0 turns the motor off, 255 is full speed.
    Vibrate2 { duration_ms: u16, strength: u8 },
    SetSleepMode(SleepMode),
    Unlock(UnlockType),
    UserAction(UserActionType),
}

impl Command {
    pub fn set_mode(modes: ModeConfig) -> Self {
        Command::SetMode(modes)
    }

    pub fn vibrate(kind: VibrationType) -> Self {
        Command::Vibrate(kind)
    }

    pub fn led(logo: Rgb, line: Rgb) -> Self {
        Command::Led { logo, line }
    }

    /// Build a `Vibrate2` command.  The duration is sent as whole
    /// milliseconds and must fit in 16 bits.
    pub fn vibrate2(duration: Duration, strength: u8) -> Result<Self, ValidationError> {
        let millis = duration.as_millis();
        let duration_ms = u16::try_from(millis)
            .map_err(|_| ValidationError::VibrationDuration { millis })?;
        Ok(Command::Vibrate2 {
            duration_ms,
            strength,
        })
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Command::SetMode(_) => Opcode::SetMode,
            Command::Vibrate(_) => Opcode::Vibrate,
            Command::DeepSleep => Opcode::DeepSleep,
            Command::Led { .. } => Opcode::Led,
            Command::Vibrate2 { .. } => Opcode::Vibrate2,
            Command::SetSleepMode(_) => Opcode::SetSleepMode,
            Command::Unlock(_) => Opcode::Unlock,
            Command::UserAction(_) => Opcode::UserAction,
        }
    }

    /// The payload without the 2-byte header.
    pub fn payload(&self) -> Vec<u8> {
        match *self {
            // Wire order is EMG, IMU, classifier.
            Command::SetMode(modes) => {
                vec![modes.emg.into(), modes.imu.into(), modes.classifier.into()]
            }
            Command::Vibrate(kind) => vec![kind.into()],
            Command::DeepSleep => Vec::new(),
            Command::Led { logo, line } => {
                let mut payload = Vec::with_capacity(6);
                payload.extend_from_slice(&logo.to_bytes());
                payload.extend_from_slice(&line.to_bytes());
                payload
            }
            // The duration is big-endian inside the payload, unlike the rest of
            // the protocol.  The firmware expects it this way.
            Command::Vibrate2 {
                duration_ms,
                strength,
            } => {
                let [hi, lo] = duration_ms.to_be_bytes();
                vec![hi, lo, strength]
            }
            Command::SetSleepMode(mode) => vec![mode.into()],
            Command::Unlock(kind) => vec![kind.into()],
            Command::UserAction(kind) => vec![kind.into()],
        }
    }

    /// Encode the full frame: `[opcode, payload_len, payload...]`.
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload();
        let mut frame = Vec::with_capacity(2 + payload.len());
        frame.push(self.opcode().into());
        frame.push(payload.len() as u8);
        frame.extend_from_slice(&payload);
        frame
    }
}

impl TryFrom<&[i64]> for Rgb {
    type Error = ValidationError;

    /// Validate an untyped `[r, g, b]` triple, e.g. parsed from user input.
    fn try_from(components: &[i64]) -> Result<Self, Self::Error> {
        if components.len() != 3 {
            return Err(ValidationError::RgbLength(components.len()));
        }
        let mut rgb = [0u8; 3];
        for (out, &value) in rgb.iter_mut().zip(components) {
            *out = u8::try_from(value).map_err(|_| ValidationError::RgbComponent { value })?;
        }
        Ok(Rgb::new(rgb[0], rgb[1], rgb[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassifierMode, EmgMode, ImuMode};

    fn every_variant() -> Vec<Command> {
        vec![
            Command::set_mode(ModeConfig::default()),
            Command::vibrate(VibrationType::Short),
            Command::DeepSleep,
            Command::led(Rgb::new(1, 2, 3), Rgb::new(4, 5, 6)),
            Command::vibrate2(Duration::from_millis(1000), 255).unwrap(),
            Command::SetSleepMode(SleepMode::NeverSleep),
            Command::Unlock(UnlockType::Hold),
            Command::UserAction(UserActionType::Single),
        ]
    }

    #[test]
    fn test_header_matches_opcode_and_length() {
        for cmd in every_variant() {
            let frame = cmd.encode();
            assert_eq!(frame[0], u8::from(cmd.opcode()), "{cmd:?}");
            assert_eq!(frame[1] as usize, cmd.payload().len(), "{cmd:?}");
            assert_eq!(frame.len(), 2 + frame[1] as usize, "{cmd:?}");
        }
    }

    #[test]
    fn test_set_mode_payload_order() {
        let cmd = Command::set_mode(ModeConfig::new(
            ClassifierMode::Enabled,
            EmgMode::SendEmg,
            ImuMode::SendAll,
        ));
        assert_eq!(cmd.encode(), vec![0x01, 0x03, 0x02, 0x03, 0x01]);
    }

    #[test]
    fn test_led_frame() {
        let cmd = Command::led(Rgb::new(255, 0, 0), Rgb::new(0, 0, 255));
        assert_eq!(cmd.encode(), vec![0x06, 0x06, 255, 0, 0, 0, 0, 255]);
    }

    #[test]
    fn test_vibrate2_duration_is_big_endian() {
        let cmd = Command::vibrate2(Duration::from_millis(0x1234), 0x80).unwrap();
        assert_eq!(cmd.encode(), vec![0x07, 0x03, 0x12, 0x34, 0x80]);
    }

    #[test]
    fn test_vibrate2_rejects_long_duration() {
        let err = Command::vibrate2(Duration::from_secs(70), 10).unwrap_err();
        assert_eq!(err, ValidationError::VibrationDuration { millis: 70_000 });
    }

    #[test]
    fn test_single_byte_commands() {
        assert_eq!(
            Command::vibrate(VibrationType::Long).encode(),
            vec![0x03, 0x01, 0x03]
        );
        assert_eq!(
            Command::SetSleepMode(SleepMode::NeverSleep).encode(),
            vec![0x09, 0x01, 0x01]
        );
        assert_eq!(
            Command::Unlock(UnlockType::Timed).encode(),
            vec![0x0A, 0x01, 0x01]
        );
        assert_eq!(
            Command::UserAction(UserActionType::Single).encode(),
            vec![0x0B, 0x01, 0x00]
        );
        assert_eq!(Command::DeepSleep.encode(), vec![0x04, 0x00]);
    }

    #[test]
    fn test_rgb_validation() {
        assert_eq!(
            Rgb::try_from(&[10i64, 20, 30][..]).unwrap(),
            Rgb::new(10, 20, 30)
        );
        assert_eq!(
            Rgb::try_from(&[10i64, 20][..]).unwrap_err(),
            ValidationError::RgbLength(2)
        );
        assert_eq!(
            Rgb::try_from(&[0i64, 256, 0][..]).unwrap_err(),
            ValidationError::RgbComponent { value: 256 }
        );
        assert_eq!(
            Rgb::try_from(&[-1i64, 0, 0][..]).unwrap_err(),
            ValidationError::RgbComponent { value: -1 }
        );
    }
}
