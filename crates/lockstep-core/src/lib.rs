//! This library replays a recorded inertial stream and a recorded camera
//! stream into an estimator in strict temporal order.
//!
//! Every camera frame is preceded by all inertial samples stamped at or
//! before it. Each estimator call blocks until the input is consumed, so
//! the replay runs exactly as fast as the estimator.
//!
//! # Usage
//!
//! ```rust
//! use image::GrayImage;
//! use lockstep_core::{
//!     CameraImage, Estimator, ImuSample, ReplayConfig, ReplayDriver, Synchronizer, Timestamp,
//!     TimingEntry, VecStream,
//! };
//! use nalgebra::Vector3;
//!
//! // An estimator that only counts its inputs
//! #[derive(Default)]
//! struct Counter {
//!     imu: usize,
//!     frames: usize,
//! }
//!
//! impl Estimator for Counter {
//!     fn set_blocking(&mut self, _blocking: bool) {}
//!
//!     fn add_imu_measurement(
//!         &mut self,
//!         _timestamp: Timestamp,
//!         _acc: &Vector3<f64>,
//!         _gyr: &Vector3<f64>,
//!     ) -> bool {
//!         self.imu += 1;
//!         true
//!     }
//!
//!     fn add_image_with_index(
//!         &mut self,
//!         _timestamp: Timestamp,
//!         _camera_id: usize,
//!         _image: &GrayImage,
//!         _frame_index: u64,
//!     ) -> bool {
//!         self.frames += 1;
//!         true
//!     }
//! }
//!
//! # fn main() -> eyre::Result<()> {
//! // 200 Hz inertial samples and 20 Hz frames over one second
//! let imu = VecStream::new(
//!     "/imu0",
//!     (0..200).map(|i| {
//!         ImuSample::new(Timestamp::from_nanos(i * 5_000_000), Vector3::zeros(), Vector3::zeros())
//!     }),
//! );
//! let camera = VecStream::new(
//!     "/cam0/image_raw",
//!     (0..20).map(|i| CameraImage {
//!         timestamp: Timestamp::from_nanos(i * 50_000_000),
//!         image: GrayImage::new(8, 8),
//!     }),
//! );
//!
//! let sync = Synchronizer::new(imu, camera, ReplayConfig::from_start())?;
//! let mut counter = Counter::default();
//! let mut timings: Vec<TimingEntry> = Vec::new();
//! let outcome = ReplayDriver::new(sync, &mut counter, &mut timings).run()?;
//!
//! // The first frame only sets the start time
//! assert_eq!(counter.frames, 19);
//! assert_eq!(timings.len(), 20);
//! assert!(!outcome.is_interrupted());
//! # Ok(())
//! # }
//! ```

pub mod cdr;
mod config;
mod driver;
mod error;
mod estimator;
pub mod log;
mod sink;
pub mod state;
mod stream;
mod sync;
pub mod timing;
mod types;

pub use cdr::{CdrError, Decode, Encode};
pub use config::{DEFAULT_PROGRESS_INTERVAL, DEFAULT_RATE_RATIO, ImuSkipPolicy, ReplayConfig};
pub use driver::{ReplayDriver, ReplayOutcome, ReplaySummary};
pub use error::ReplayError;
pub use estimator::{Estimator, OdometryObserver, ResultSinks};
pub use log::{LogWriter, McapLog, TopicInfo, TopicStream};
pub use sink::{DEFAULT_TIMING_FILE, DEFAULT_TRAJECTORY_FILE, FileSink, OutputPaths, SinkHandle};
pub use state::{Phase, ReplayStats, RunState};
pub use stream::{MessageStream, VecStream};
pub use sync::Synchronizer;
pub use timing::{LatencyStats, Stopwatch, TimingEntry, TimingRecorder, TimingSink};
pub use types::*;
