use image::GrayImage;
use lockstep_core::{
    CameraImage, Estimator, ImuSample, ReplayConfig, ReplayDriver, ReplayOutcome, Synchronizer,
    Timestamp, TimingEntry, VecStream,
};
use nalgebra::Vector3;

/// One call observed by the [RecordingEstimator].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Imu(Timestamp),
    Frame { timestamp: Timestamp, index: u64 },
}

impl Event {
    pub fn timestamp(&self) -> Timestamp {
        match *self {
            Event::Imu(timestamp) | Event::Frame { timestamp, .. } => timestamp,
        }
    }
}

/// Estimator that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingEstimator {
    pub events: Vec<Event>,
    pub blocking: bool,
    pub display_calls: usize,
    pub finished: bool,
}

impl RecordingEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn frames(&self) -> Vec<(Timestamp, u64)> {
        self.events
            .iter()
            .filter_map(|event| match *event {
                Event::Frame { timestamp, index } => Some((timestamp, index)),
                Event::Imu(_) => None,
            })
            .collect()
    }

    #[allow(dead_code)]
    pub fn imu_stamps(&self) -> Vec<Timestamp> {
        self.events
            .iter()
            .filter_map(|event| match *event {
                Event::Imu(timestamp) => Some(timestamp),
                Event::Frame { .. } => None,
            })
            .collect()
    }
}

impl Estimator for RecordingEstimator {
    fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
    }

    fn add_imu_measurement(
        &mut self,
        timestamp: Timestamp,
        _linear_acceleration: &Vector3<f64>,
        _angular_velocity: &Vector3<f64>,
    ) -> bool {
        self.events.push(Event::Imu(timestamp));
        true
    }

    fn add_image_with_index(
        &mut self,
        timestamp: Timestamp,
        _camera_id: usize,
        _image: &GrayImage,
        frame_index: u64,
    ) -> bool {
        self.events.push(Event::Frame {
            timestamp,
            index: frame_index,
        });
        true
    }

    fn display(&mut self) {
        self.display_calls += 1;
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

#[allow(dead_code)]
pub fn ms(millis: u64) -> Timestamp {
    Timestamp::from_nanos(millis * 1_000_000)
}

#[allow(dead_code)]
pub fn imu_sample(timestamp: Timestamp) -> ImuSample {
    ImuSample::new(
        timestamp,
        Vector3::new(0.01, -0.02, 0.03),
        Vector3::new(0.0, 0.0, 9.81),
    )
}

#[allow(dead_code)]
pub fn camera_frame(timestamp: Timestamp) -> CameraImage {
    CameraImage {
        timestamp,
        image: GrayImage::new(4, 4),
    }
}

#[allow(dead_code)]
pub fn imu_stream(stamps: &[Timestamp]) -> VecStream<ImuSample> {
    VecStream::new("/imu0", stamps.iter().copied().map(imu_sample))
}

#[allow(dead_code)]
pub fn camera_stream(stamps: &[Timestamp]) -> VecStream<CameraImage> {
    VecStream::new("/cam0/image_raw", stamps.iter().copied().map(camera_frame))
}

/// Result of a full replay over in-memory streams.
pub struct RunResult {
    pub outcome: ReplayOutcome,
    pub estimator: RecordingEstimator,
    pub timings: Vec<TimingEntry>,
}

/// Replay the given stamps to completion.
#[allow(dead_code)]
pub fn run_replay(imu: &[Timestamp], camera: &[Timestamp], config: ReplayConfig) -> RunResult {
    let sync = Synchronizer::new(imu_stream(imu), camera_stream(camera), config).unwrap();
    let mut estimator = RecordingEstimator::new();
    let mut timings: Vec<TimingEntry> = Vec::new();
    let outcome = ReplayDriver::new(sync, &mut estimator, &mut timings)
        .run()
        .unwrap();
    RunResult {
        outcome,
        estimator,
        timings,
    }
}

/// Assert that the delivered sequence never goes back in time and that
/// samples tied with a frame come before it.
#[allow(dead_code)]
pub fn assert_causal_order(events: &[Event]) {
    for pair in events.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        assert!(
            prev.timestamp() <= next.timestamp(),
            "delivery goes back in time: {prev:?} then {next:?}"
        );
        if let (Event::Frame { timestamp, .. }, Event::Imu(imu)) = (prev, next) {
            assert!(
                imu > timestamp,
                "sample at {imu} delivered after frame at {timestamp}"
            );
        }
    }
}

/// Assert that delivered frame indices strictly increase.
#[allow(dead_code)]
pub fn assert_indices_increasing(frames: &[(Timestamp, u64)]) {
    for pair in frames.windows(2) {
        assert!(
            pair[0].1 < pair[1].1,
            "frame indices not increasing: {:?}",
            pair
        );
    }
}
