use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{error, info};

use myo_rs::prelude::*;

/// Stream data from a Myo armband as JSON lines.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// MAC address (or CoreBluetooth UUID on macOS) of the Myo to connect to.
    /// Without it, the first device advertising the Myo service is used.
    #[arg(short, long, value_name = "ADDRESS")]
    mac: Option<String>,

    /// Set the log level to debug.
    #[arg(short, long)]
    debug: bool,

    #[arg(long, value_enum, default_value_t = EmgArg::Filt)]
    emg: EmgArg,

    #[arg(long, value_enum, default_value_t = ImuArg::Off)]
    imu: ImuArg,

    /// Enable the on-device pose classifier.
    #[arg(long)]
    classifier: bool,

    /// Seconds to stream before stopping.  0 streams until Ctrl-C.
    #[arg(short, long, default_value_t = 5)]
    seconds: u64,

    /// Deliver EMG as individual 8-channel samples.
    #[arg(long)]
    aggregate_emg: bool,

    /// Also pair filtered EMG values with IMU samples.
    #[arg(long)]
    aggregate: bool,

    /// LED colour while streaming, as `R,G,B` (0-255 each).
    #[arg(long, value_delimiter = ',', num_args = 3, allow_negative_numbers = true)]
    led: Option<Vec<i64>>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmgArg {
    #[value(name = "none")]
    Off,
    Filt,
    Emg,
    Raw,
}

impl From<EmgArg> for EmgMode {
    fn from(arg: EmgArg) -> Self {
        match arg {
            EmgArg::Off => EmgMode::None,
            EmgArg::Filt => EmgMode::SendFilt,
            EmgArg::Emg => EmgMode::SendEmg,
            EmgArg::Raw => EmgMode::SendRaw,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ImuArg {
    #[value(name = "none")]
    Off,
    Data,
    Events,
    All,
    Raw,
}

impl From<ImuArg> for ImuMode {
    fn from(arg: ImuArg) -> Self {
        match arg {
            ImuArg::Off => ImuMode::None,
            ImuArg::Data => ImuMode::SendData,
            ImuArg::Events => ImuMode::SendEvents,
            ImuArg::All => ImuMode::SendAll,
            ImuArg::Raw => ImuMode::SendRaw,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── Logging ───────────────────────────────────────────────────────────────
    // RUST_LOG overrides, e.g. RUST_LOG=myo_rs=trace
    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let modes = ModeConfig::new(
        if args.classifier {
            ClassifierMode::Enabled
        } else {
            ClassifierMode::Disabled
        },
        args.emg.into(),
        args.imu.into(),
    );
    let config = SessionConfig {
        dispatch: DispatchOptions {
            aggregate_emg: args.aggregate_emg,
            aggregate_fv_imu: args.aggregate,
        },
        ..SessionConfig::default()
    };

    let streaming_led = args.led.as_deref().map(Rgb::try_from).transpose()?;

    // ── Connect ───────────────────────────────────────────────────────────────
    let transport = BtleTransport::new(BleConfig::default()).await?;
    let (handler, mut rx) = ChannelHandler::new(256);
    let mut session = Session::new(transport, Arc::new(handler), config);

    info!("Scanning for a Myo device …");
    session.discover_with_retry(args.mac.as_deref()).await?;
    session.connect().await?;

    let services = session.get_services().await?;
    println!("{}", serde_json::to_string_pretty(&services)?);

    // ── Stream ────────────────────────────────────────────────────────────────
    session.setup(modes).await?;

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => error!("Could not serialise event: {e}"),
            }
        }
    });

    session.start().await?;
    if let Some(color) = streaming_led {
        session.led(color, color).await?;
    }
    if args.seconds == 0 {
        info!("Streaming. Press Ctrl-C to stop.");
        tokio::signal::ctrl_c().await?;
    } else {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(args.seconds)) => {}
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        }
    }
    session.stop().await?;

    // ── Shutdown ──────────────────────────────────────────────────────────────
    info!("bye bye!");
    session.vibrate(VibrationType::Long).await?;
    session.led(RGB_BLACK, RGB_BLACK).await?;
    session.disconnect().await?;

    // Dropping the session drops the last event sender, which ends the printer.
    drop(session);
    printer.await?;
    Ok(())
}
