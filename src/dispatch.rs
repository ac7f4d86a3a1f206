//! Notification routing: handle → decoder → consumer hook.
//!
//! A consumer implements [`MyoHandler`].  Every data kind has a required
//! hook, so a handler that forgets one does not compile.  The two derived
//! streams (split EMG samples, FV/IMU pairs) have no-op defaults because they
//! are only produced when the matching [`DispatchOptions`] flag is set.
//!
//! [`ChannelHandler`] is a ready-made handler that forwards everything into a
//! `tokio::sync::mpsc` channel as [`MyoEvent`]s.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::aggregate::Aggregator;
use crate::error::DecodeError;
use crate::parse::decode;
use crate::protocol::{role_of, Role};
use crate::transport::NotificationCallback;
use crate::types::{
    AggregatedData, ClassifierEvent, EmgData, EmgSample, FvData, ImuData, MotionEvent, MyoEvent,
};

/// Consumer of decoded Myo data.
///
/// Hooks run on the transport's notification task; keep them short.
pub trait MyoHandler: Send + Sync {
    fn on_classifier_event(&self, event: ClassifierEvent);

    /// A full EMG notification.  `channel` is the EMG characteristic index
    /// (0–3), not an electrode.
    fn on_emg_data(&self, channel: u8, data: EmgData);

    fn on_fv_data(&self, data: FvData);

    fn on_imu_data(&self, data: ImuData);

    fn on_motion_event(&self, event: MotionEvent);

    /// One 8-channel EMG sample.  Called twice per notification, oldest
    /// first, instead of [`MyoHandler::on_emg_data`] when EMG aggregation is
    /// on.
    fn on_emg_sample(&self, _sample: EmgSample) {}

    /// An FV sample paired with an IMU sample.  Only called when FV/IMU
    /// aggregation is on.
    fn on_aggregated_data(&self, _data: AggregatedData) {}
}

/// Routing switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Split each EMG notification into two [`MyoHandler::on_emg_sample`]
    /// calls.
    pub aggregate_emg: bool,
    /// Feed FV and IMU samples to the [`Aggregator`] as well as their own
    /// hooks.
    pub aggregate_fv_imu: bool,
}

/// Decodes notifications and routes them to a [`MyoHandler`].
pub struct EventDispatcher<H: ?Sized> {
    handler: Arc<H>,
    aggregator: Aggregator,
    options: DispatchOptions,
}

impl<H: MyoHandler + ?Sized + 'static> EventDispatcher<H> {
    pub fn new(handler: Arc<H>, options: DispatchOptions) -> Self {
        Self {
            handler,
            aggregator: Aggregator::new(),
            options,
        }
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Handle one notification.
    ///
    /// Handles outside the data set (descriptors, unlisted attributes,
    /// readable-only characteristics) are logged and dropped.  A malformed
    /// payload on a data handle is returned as an error.
    pub fn on_notification(&self, handle: u16, data: &[u8]) -> Result<(), DecodeError> {
        let Some(role) = role_of(handle) else {
            debug!("Dropping notification from unknown handle 0x{handle:04X}");
            return Ok(());
        };

        match role {
            Role::ClassifierEvent => self.handler.on_classifier_event(decode(data)?),
            Role::MotionEvent => self.handler.on_motion_event(decode(data)?),
            Role::FvData => {
                let fv: FvData = decode(data)?;
                self.handler.on_fv_data(fv);
                if self.options.aggregate_fv_imu {
                    self.forward_pair(self.aggregator.ingest(fv));
                }
            }
            Role::ImuData => {
                let imu: ImuData = decode(data)?;
                self.handler.on_imu_data(imu);
                if self.options.aggregate_fv_imu {
                    self.forward_pair(self.aggregator.ingest(imu));
                }
            }
            Role::EmgData(channel) => {
                let emg: EmgData = decode(data)?;
                if self.options.aggregate_emg {
                    self.handler.on_emg_sample(emg.sample1);
                    self.handler.on_emg_sample(emg.sample2);
                } else {
                    self.handler.on_emg_data(channel, emg);
                }
            }
            other => {
                debug!("Ignoring notification from non-data handle 0x{handle:04X} ({other:?})");
            }
        }
        Ok(())
    }

    fn forward_pair(&self, pair: Option<AggregatedData>) {
        if let Some(pair) = pair {
            self.handler.on_aggregated_data(pair);
        }
    }

    /// Wrap a shared dispatcher as a transport callback.
    pub fn callback(self: &Arc<Self>) -> NotificationCallback {
        let dispatcher = Arc::clone(self);
        Arc::new(move |handle, data| dispatcher.on_notification(handle, data))
    }
}

// ── ChannelHandler ────────────────────────────────────────────────────────────

/// Forwards every hook into an mpsc channel.
///
/// Sends never block the notification task: when the receiver lags and the
/// channel is full, the event is dropped with a warning.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::Sender<MyoEvent>,
}

impl ChannelHandler {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<MyoEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    fn send(&self, event: MyoEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Event channel full, dropping {}", event_name(&event));
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Event receiver dropped");
            }
        }
    }
}

fn event_name(event: &MyoEvent) -> &'static str {
    match event {
        MyoEvent::Emg { .. } => "EMG data",
        MyoEvent::EmgSample(_) => "EMG sample",
        MyoEvent::Fv(_) => "FV data",
        MyoEvent::Imu(_) => "IMU data",
        MyoEvent::Aggregated(_) => "aggregated data",
        MyoEvent::Motion(_) => "motion event",
        MyoEvent::Classifier(_) => "classifier event",
    }
}

impl MyoHandler for ChannelHandler {
    fn on_classifier_event(&self, event: ClassifierEvent) {
        self.send(MyoEvent::Classifier(event));
    }

    fn on_emg_data(&self, channel: u8, data: EmgData) {
        self.send(MyoEvent::Emg { channel, data });
    }

    fn on_fv_data(&self, data: FvData) {
        self.send(MyoEvent::Fv(data));
    }

    fn on_imu_data(&self, data: ImuData) {
        self.send(MyoEvent::Imu(data));
    }

    fn on_motion_event(&self, event: MotionEvent) {
        self.send(MyoEvent::Motion(event));
    }

    fn on_emg_sample(&self, sample: EmgSample) {
        self.send(MyoEvent::EmgSample(sample));
    }

    fn on_aggregated_data(&self, data: AggregatedData) {
        self.send(MyoEvent::Aggregated(data));
    }
}
