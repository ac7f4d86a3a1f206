//! End-to-end session flows against a scripted in-memory transport.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use myo_rs::error::{DecodeError, TransportError};
use myo_rs::prelude::*;
use myo_rs::protocol::{Handle, MYO_SERVICE_UUID};
use myo_rs::transport::NotificationCallback;

// ── Scripted transport ────────────────────────────────────────────────────────

#[derive(Default)]
struct Radio {
    connected: bool,
    commands: Vec<Vec<u8>>,
    subscribed: HashMap<u16, NotificationCallback>,
}

#[derive(Clone, Default)]
struct ScriptedTransport {
    radio: Arc<Mutex<Radio>>,
}

impl ScriptedTransport {
    fn push(&self, handle: Handle, data: &[u8]) -> Result<(), DecodeError> {
        let callback = self.radio.lock().subscribed.get(&handle.raw()).cloned();
        callback.map_or(Ok(()), |cb| cb(handle.raw(), data))
    }

    fn subscribed(&self) -> Vec<u16> {
        let mut handles: Vec<_> = self.radio.lock().subscribed.keys().copied().collect();
        handles.sort_unstable();
        handles
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Device = Advertisement;

    async fn find_device(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Option<Advertisement>, TransportError> {
        let myo = Advertisement {
            address: "E4:10:6B:1A:2B:3C".into(),
            name: Some("Myo".into()),
            service_uuids: vec![MYO_SERVICE_UUID],
        };
        Ok(filter.matches(&myo).then_some(myo))
    }

    async fn connect(&mut self, _device: &Advertisement) -> Result<(), TransportError> {
        self.radio.lock().connected = true;
        Ok(())
    }

    async fn write(
        &self,
        handle: u16,
        data: &[u8],
        _with_response: bool,
    ) -> Result<(), TransportError> {
        let mut radio = self.radio.lock();
        if !radio.connected {
            return Err(TransportError::NotConnected);
        }
        if handle != Handle::Command.raw() {
            return Err(TransportError::CharacteristicNotFound(handle));
        }
        radio.commands.push(data.to_vec());
        Ok(())
    }

    async fn read(&self, handle: u16) -> Result<Vec<u8>, TransportError> {
        match Handle::from_raw(handle) {
            Some(Handle::BatteryLevel) => Ok(vec![64]),
            Some(Handle::ManufacturerName) => Ok(b"Thalmic Labs".to_vec()),
            Some(Handle::FirmwareVersion) => Ok(vec![1, 0, 5, 0, 0xB2, 0x07, 2, 0]),
            Some(Handle::FirmwareInfo) => {
                let mut info = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x00, 0x00];
                info.resize(20, 0);
                Ok(info)
            }
            _ => Err(TransportError::CharacteristicNotFound(handle)),
        }
    }

    async fn subscribe(
        &self,
        handle: u16,
        callback: NotificationCallback,
    ) -> Result<(), TransportError> {
        self.radio.lock().subscribed.insert(handle, callback);
        Ok(())
    }

    async fn unsubscribe(&self, handle: u16) -> Result<(), TransportError> {
        self.radio.lock().subscribed.remove(&handle);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut radio = self.radio.lock();
        radio.connected = false;
        radio.subscribed.clear();
        Ok(())
    }
}

// ── A hand-written handler ────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    emg: Mutex<Vec<(u8, EmgData)>>,
    samples: Mutex<Vec<EmgSample>>,
    fv: Mutex<Vec<FvData>>,
    imu: Mutex<Vec<ImuData>>,
    pairs: Mutex<Vec<AggregatedData>>,
    poses: Mutex<Vec<ClassifierEvent>>,
    taps: Mutex<Vec<MotionEvent>>,
}

impl MyoHandler for Recorder {
    fn on_classifier_event(&self, event: ClassifierEvent) {
        self.poses.lock().push(event);
    }

    fn on_emg_data(&self, channel: u8, data: EmgData) {
        self.emg.lock().push((channel, data));
    }

    fn on_fv_data(&self, data: FvData) {
        self.fv.lock().push(data);
    }

    fn on_imu_data(&self, data: ImuData) {
        self.imu.lock().push(data);
    }

    fn on_motion_event(&self, event: MotionEvent) {
        self.taps.lock().push(event);
    }

    fn on_emg_sample(&self, sample: EmgSample) {
        self.samples.lock().push(sample);
    }

    fn on_aggregated_data(&self, data: AggregatedData) {
        self.pairs.lock().push(data);
    }
}

fn imu_payload(w: i16, ax: i16, gz: i16) -> Vec<u8> {
    [w, 0, 0, 0, ax, 0, 0, 0, 0, gz]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

fn fv_payload(first: u16) -> Vec<u8> {
    let mut data: Vec<u8> = std::iter::once(first)
        .chain(std::iter::repeat(0).take(7))
        .flat_map(|v| v.to_le_bytes())
        .collect();
    data.push(0);
    data
}

async fn connected_session(
    transport: &ScriptedTransport,
    handler: &Arc<Recorder>,
    dispatch: DispatchOptions,
) -> Session<ScriptedTransport, Recorder> {
    let config = SessionConfig {
        dispatch,
        ..SessionConfig::default()
    };
    let mut session = Session::new(transport.clone(), Arc::clone(handler), config);
    session.discover(None).await.expect("discover");
    session.connect().await.expect("connect");
    session
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn raw_emg_session_round_trip() {
    let transport = ScriptedTransport::default();
    let handler = Arc::new(Recorder::default());
    let mut session = connected_session(&transport, &handler, DispatchOptions::default()).await;

    let modes = ModeConfig::new(ClassifierMode::Enabled, EmgMode::SendRaw, ImuMode::SendEvents);
    session.setup(modes).await.unwrap();
    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(transport.subscribed(), vec![30, 34, 42, 45, 48, 51]);

    let emg: Vec<u8> = (0..16).map(|i| (i as i8 - 8) as u8).collect();
    transport.push(Handle::Emg3Data, &emg).unwrap();
    transport.push(Handle::MotionEvent, &[0x00, 0x01, 0x02]).unwrap();
    transport
        .push(Handle::ClassifierEvent, &[0x03, 0x04, 0x00, 0, 0, 0])
        .unwrap();

    {
        let emg = handler.emg.lock();
        assert_eq!(emg.len(), 1);
        assert_eq!(emg[0].0, 3);
        assert_eq!(emg[0].1.sample1, [-8, -7, -6, -5, -4, -3, -2, -1]);
        assert_eq!(emg[0].1.sample2, [0, 1, 2, 3, 4, 5, 6, 7]);
    }
    assert_eq!(
        *handler.taps.lock(),
        vec![MotionEvent::Tap {
            direction: 1,
            count: 2
        }]
    );
    assert_eq!(
        *handler.poses.lock(),
        vec![ClassifierEvent::Pose {
            pose: Pose::FingersSpread
        }]
    );

    session.stop().await.unwrap();
    assert!(transport.subscribed().is_empty());
    assert_eq!(session.state(), SessionState::Stopped);

    // Nothing is delivered once unsubscribed.
    transport.push(Handle::Emg3Data, &emg).unwrap();
    assert_eq!(handler.emg.lock().len(), 1);

    session.disconnect().await.unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn aggregated_emg_is_split_into_samples() {
    let transport = ScriptedTransport::default();
    let handler = Arc::new(Recorder::default());
    let dispatch = DispatchOptions {
        aggregate_emg: true,
        ..DispatchOptions::default()
    };
    let mut session = connected_session(&transport, &handler, dispatch).await;

    let modes = ModeConfig::new(ClassifierMode::Disabled, EmgMode::SendEmg, ImuMode::None);
    session.setup(modes).await.unwrap();
    session.start().await.unwrap();

    let emg: Vec<u8> = (1..=16).collect();
    transport.push(Handle::Emg0Data, &emg).unwrap();
    transport.push(Handle::Emg1Data, &emg).unwrap();

    assert!(handler.emg.lock().is_empty());
    let samples = handler.samples.lock();
    assert_eq!(samples.len(), 4);
    assert_eq!(samples[0], [1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(samples[1], [9, 10, 11, 12, 13, 14, 15, 16]);
}

#[tokio::test]
async fn fv_and_imu_are_paired() {
    let transport = ScriptedTransport::default();
    let handler = Arc::new(Recorder::default());
    let dispatch = DispatchOptions {
        aggregate_fv_imu: true,
        ..DispatchOptions::default()
    };
    let mut session = connected_session(&transport, &handler, dispatch).await;

    let modes = ModeConfig::new(ClassifierMode::Disabled, EmgMode::SendFilt, ImuMode::SendData);
    session.setup(modes).await.unwrap();
    session.start().await.unwrap();
    assert_eq!(transport.subscribed(), vec![27, 38]);

    transport.push(Handle::FvData, &fv_payload(10)).unwrap();
    transport.push(Handle::FvData, &fv_payload(20)).unwrap();
    transport
        .push(Handle::ImuData, &imu_payload(16384, 2048, 16))
        .unwrap();
    transport
        .push(Handle::ImuData, &imu_payload(-16384, 0, 0))
        .unwrap();

    assert_eq!(handler.fv.lock().len(), 2);
    assert_eq!(handler.imu.lock().len(), 2);

    let pairs = handler.pairs.lock();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].fv.values[0], 20);
    assert_eq!(pairs[0].imu.orientation.w, 1.0);
    assert_eq!(pairs[0].imu.accelerometer.x, 1.0);
    assert_eq!(pairs[0].imu.gyroscope.z, 1.0);
}

#[tokio::test]
async fn malformed_notification_reaches_transport_as_error() {
    let transport = ScriptedTransport::default();
    let handler = Arc::new(Recorder::default());
    let mut session = connected_session(&transport, &handler, DispatchOptions::default()).await;
    session.setup(ModeConfig::default()).await.unwrap();
    session.start().await.unwrap();

    let err = transport.push(Handle::FvData, &[0u8; 16]).unwrap_err();
    assert_eq!(
        err,
        DecodeError::InvalidLength {
            kind: "FV data",
            expected: 17,
            actual: 16
        }
    );
    assert!(handler.fv.lock().is_empty());
}

#[tokio::test]
async fn setup_writes_expected_frames() {
    let transport = ScriptedTransport::default();
    let handler = Arc::new(Recorder::default());
    let mut session = connected_session(&transport, &handler, DispatchOptions::default()).await;

    session.setup(ModeConfig::default()).await.unwrap();

    let commands = transport.radio.lock().commands.clone();
    assert_eq!(
        commands,
        vec![
            vec![0x06, 0x06, 255, 255, 0, 255, 255, 0],
            vec![0x03, 0x01, 0x01],
            vec![0x03, 0x01, 0x01],
            vec![0x03, 0x01, 0x01],
            vec![0x09, 0x01, 0x01],
            vec![0x01, 0x03, 0x01, 0x00, 0x00],
            vec![0x06, 0x06, 255, 105, 180, 255, 105, 180],
        ]
    );
}

#[tokio::test]
async fn device_reads_and_service_listing() {
    let transport = ScriptedTransport::default();
    let handler = Arc::new(Recorder::default());
    let session = connected_session(&transport, &handler, DispatchOptions::default()).await;

    assert_eq!(session.battery_level().await.unwrap(), 64);
    assert_eq!(
        session.firmware_version().await.unwrap().to_string(),
        "1.5.1970.REVD"
    );
    assert_eq!(
        session.firmware_info().await.unwrap().serial_number,
        "06:05:04:03:02:01"
    );

    let services = session.get_services().await.unwrap();
    let json = serde_json::to_value(&services).unwrap();
    let control = json
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == "CONTROL_SERVICE")
        .unwrap();
    assert_eq!(control["characteristics"][0]["value"]["sku"], "UNKNOWN");
    assert_eq!(control["characteristics"][1]["value"], "1.5.1970.REVD");
    assert!(control["characteristics"][2].get("value").is_none());
}

#[test]
fn events_serialise_as_tagged_json() {
    let event = MyoEvent::Classifier(ClassifierEvent::Pose { pose: Pose::Fist });
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "classifier");
    assert_eq!(json["data"]["type"], "POSE");
    assert_eq!(json["data"]["pose"], "FIST");
}
