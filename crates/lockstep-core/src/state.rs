use crate::types::Timestamp;

/// Where the [Synchronizer](crate::Synchronizer) is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Read the next camera frame.
    #[default]
    AwaitFrame,
    /// Deliver inertial samples up to the frame being held.
    DrainImu,
    /// Deliver the held frame.
    DeliverFrame,
    /// One of the streams ran out.
    Done,
}

/// Counters kept over a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Camera records skipped by the start offset.
    pub frames_skipped: u64,
    /// Inertial records skipped by the start offset.
    pub imu_skipped: u64,
    /// Camera frames read after the start offset.
    pub frames_observed: u64,
    /// Camera frames handed to the estimator.
    pub frames_delivered: u64,
    /// Inertial samples handed to the estimator.
    pub imu_delivered: u64,
    /// Records withheld because they fell inside the bootstrap window.
    pub frames_suppressed: u64,
    pub imu_suppressed: u64,
    /// Inputs the estimator declined.
    pub frames_rejected: u64,
    pub imu_rejected: u64,
}

/// The mutable state of a replay, advanced once per step.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Stamp of the first frame after the start offset. Set once.
    pub start_time: Option<Timestamp>,
    /// Index given to the next observed frame.
    pub frame_counter: u64,
    /// Stamp of the frame currently held between phases.
    pub current_frame: Option<Timestamp>,
    /// Set when a drain emptied the inertial stream.
    pub imu_exhausted: bool,
    pub phase: Phase,
    pub stats: ReplayStats,
}

impl RunState {
    pub fn new(start_frame_index: u64) -> Self {
        Self {
            frame_counter: start_frame_index,
            ..Self::default()
        }
    }

    /// Record the stamp of the first frame. Later calls are ignored.
    pub fn mark_start(&mut self, timestamp: Timestamp) -> Timestamp {
        *self.start_time.get_or_insert(timestamp)
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Hand out the index for the next frame.
    pub fn next_frame_index(&mut self) -> u64 {
        let index = self.frame_counter;
        self.frame_counter += 1;
        index
    }
}
