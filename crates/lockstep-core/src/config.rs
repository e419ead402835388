use std::time::Duration;

/// Default number of inertial records skipped per skipped camera frame.
pub const DEFAULT_RATE_RATIO: u64 = 10;

/// Default number of frames between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 20;

/// How the inertial stream is advanced when the replay starts at a
/// later camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImuSkipPolicy {
    /// Skip `ratio × start_frame_index` inertial records.
    ///
    /// Assumes a fixed rate ratio between the two sensors. Cheap, but it
    /// can leave stale samples or drop fresh ones when the ratio is off.
    RateRatio { ratio: u64 },

    /// Skip inertial records strictly older than the first retained
    /// camera frame.
    Timestamp,
}

impl Default for ImuSkipPolicy {
    fn default() -> Self {
        Self::RateRatio {
            ratio: DEFAULT_RATE_RATIO,
        }
    }
}

/// Parameters consumed by the [Synchronizer](crate::Synchronizer) and the
/// [ReplayDriver](crate::ReplayDriver).
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    /// Number of leading camera frames skipped before the replay starts.
    /// The frame counter starts at this value.
    pub start_frame_index: u64,
    /// Records within this span of the first frame are not forwarded.
    pub minimum_delta: Duration,
    /// Start-offset policy for the inertial stream.
    pub imu_skip: ImuSkipPolicy,
    /// Camera identifier passed along with every frame.
    pub camera_id: usize,
    /// Frames between progress log lines. Zero disables progress logs.
    pub progress_interval: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            start_frame_index: 0,
            minimum_delta: Duration::ZERO,
            imu_skip: ImuSkipPolicy::default(),
            camera_id: 0,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ReplayConfig {
    /// Replay from the first frame with no bootstrap window.
    pub fn from_start() -> Self {
        Self::default()
    }

    /// Replay starting at `start_frame_index` with the given bootstrap
    /// window.
    pub fn starting_at(start_frame_index: u64, minimum_delta: Duration) -> Self {
        Self {
            start_frame_index,
            minimum_delta,
            ..Self::default()
        }
    }

    /// Set the inertial skip policy
    pub fn with_imu_skip(mut self, imu_skip: ImuSkipPolicy) -> Self {
        self.imu_skip = imu_skip;
        self
    }

    /// Set the camera identifier
    pub fn with_camera_id(mut self, camera_id: usize) -> Self {
        self.camera_id = camera_id;
        self
    }

    /// Set the progress log interval
    pub fn with_progress_interval(mut self, progress_interval: u64) -> Self {
        self.progress_interval = progress_interval;
        self
    }
}
