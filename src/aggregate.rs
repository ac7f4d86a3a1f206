//! Pairs filtered-value and IMU samples into [`AggregatedData`] records.
//!
//! FV and IMU both stream at ~50 Hz on separate characteristics, so a
//! notification for one can race a notification for the other.  The
//! aggregator keeps at most one pending sample of each kind behind a single
//! mutex; when both slots are filled it emits the pair and clears them in the
//! same critical section.
//!
//! EMG (~200 Hz) is not aggregated here.

use parking_lot::Mutex;

use crate::types::{AggregatedData, FvData, ImuData};

/// A sample the aggregator accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Fv(FvData),
    Imu(ImuData),
}

impl From<FvData> for Sample {
    fn from(fv: FvData) -> Self {
        Sample::Fv(fv)
    }
}

impl From<ImuData> for Sample {
    fn from(imu: ImuData) -> Self {
        Sample::Imu(imu)
    }
}

#[derive(Debug, Default)]
struct Pending {
    fv: Option<FvData>,
    imu: Option<ImuData>,
}

/// Latest-wins FV/IMU pairing.
#[derive(Debug, Default)]
pub struct Aggregator {
    pending: Mutex<Pending>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `sample`, replacing any pending sample of the same kind.
    ///
    /// Returns the pair when this sample completes it; both slots are empty
    /// afterwards.
    pub fn ingest(&self, sample: impl Into<Sample>) -> Option<AggregatedData> {
        let mut pending = self.pending.lock();
        match sample.into() {
            Sample::Fv(fv) => pending.fv = Some(fv),
            Sample::Imu(imu) => pending.imu = Some(imu),
        }

        match (pending.fv, pending.imu) {
            (Some(fv), Some(imu)) => {
                pending.fv = None;
                pending.imu = None;
                Some(AggregatedData { fv, imu })
            }
            _ => None,
        }
    }

    /// Drop any pending samples.
    pub fn reset(&self) {
        *self.pending.lock() = Pending::default();
    }

    /// `(fv_pending, imu_pending)`
    pub fn pending(&self) -> (bool, bool) {
        let pending = self.pending.lock();
        (pending.fv.is_some(), pending.imu.is_some())
    }
}
