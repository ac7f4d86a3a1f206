//! # myo-rs
//!
//! Async Rust driver for the [Thalmic Labs Myo](https://github.com/thalmiclabs/myo-bluetooth)
//! EMG/IMU armband over Bluetooth Low Energy.
//!
//! The protocol core (command encoding, payload decoding, the GATT profile,
//! the session state machine) is independent of any Bluetooth stack.  The
//! `ble` feature adds a [`btleplug`](https://docs.rs/btleplug)-backed
//! transport and the `myo-rs` driver binary.
//!
//! ## Data streams
//!
//! | Stream | Mode | Rate | Hook |
//! |---|---|---|---|
//! | EMG (4 characteristics, 2 samples each) | `EmgMode::SendEmg` / `SendRaw` | 200 Hz | `on_emg_data` |
//! | Filtered EMG values | `EmgMode::SendFilt` | 50 Hz | `on_fv_data` |
//! | IMU | `ImuMode::SendData` / `SendAll` | 50 Hz | `on_imu_data` |
//! | Motion events | `ImuMode::SendEvents` / `SendAll` | – | `on_motion_event` |
//! | Classifier events | `ClassifierMode::Enabled` | – | `on_classifier_event` |
//!
//! ## Quick start
//!
//! ```no_run
//! # #[cfg(feature = "ble")]
//! # async fn run() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use myo_rs::prelude::*;
//!
//! let transport = BtleTransport::new(BleConfig::default()).await?;
//! let (handler, mut rx) = ChannelHandler::new(256);
//! let mut session = Session::new(transport, Arc::new(handler), SessionConfig::default());
//!
//! session.discover_with_retry(None).await?;
//! session.connect().await?;
//! session.setup(ModeConfig::default()).await?;
//! session.start().await?;
//!
//! while let Some(event) = rx.recv().await {
//!     if let MyoEvent::Fv(fv) = event {
//!         println!("{:?}", fv.values);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`prelude`] | One-line glob import of the most commonly needed types |
//! | [`session`] | Connection lifecycle: discover, connect, setup, start, stop, sleep |
//! | [`dispatch`] | [`dispatch::MyoHandler`] hooks and notification routing |
//! | [`aggregate`] | FV + IMU pairing |
//! | [`transport`] | The [`transport::Transport`] trait a BLE stack implements |
//! | `ble` | `btleplug` transport (feature `ble`) |
//! | [`command`] | Command frames written to the device |
//! | [`parse`] | Decoders for notification and read payloads |
//! | [`protocol`] | GATT handles, UUIDs, scaling constants, LED colours |
//! | [`types`] | Protocol enums and decoded value types |
//! | [`error`] | Error types |

pub mod aggregate;
#[cfg(feature = "ble")]
pub mod ble;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod parse;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// ── Prelude ───────────────────────────────────────────────────────────────────

/// Convenience re-exports for downstream crates.
pub mod prelude {
    // ── Session ───────────────────────────────────────────────────────────────
    pub use crate::dispatch::{ChannelHandler, DispatchOptions, MyoHandler};
    pub use crate::session::{Session, SessionConfig, SessionState};
    pub use crate::transport::{Advertisement, DeviceFilter, Transport};

    #[cfg(feature = "ble")]
    pub use crate::ble::{BleConfig, BtleTransport, MyoDevice};

    // ── Errors ────────────────────────────────────────────────────────────────
    pub use crate::error::{MyoError, Result};

    // ── Events and data types ─────────────────────────────────────────────────
    pub use crate::types::{
        AggregatedData, ClassifierEvent, ClassifierMode, EmgData, EmgMode, EmgSample, FvData,
        ImuData, ImuMode, ModeConfig, MotionEvent, MyoEvent, Pose, Rgb, SleepMode, UnlockType,
        UserActionType, VibrationType,
    };

    // ── Protocol constants ────────────────────────────────────────────────────
    pub use crate::protocol::{
        DEFAULT_IMU_SAMPLE_RATE, EMG_DEFAULT_STREAMING_RATE, RGB_BLACK, RGB_BLUE, RGB_CYAN,
        RGB_GREEN, RGB_PINK, RGB_PURPLE, RGB_RED, RGB_WHITE, RGB_YELLOW,
    };
}
