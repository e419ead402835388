use crate::{
    estimator::Estimator,
    state::{Phase, ReplayStats},
    stream::MessageStream,
    sync::Synchronizer,
    timing::{LatencyStats, TimingRecorder, TimingSink},
    types::{CameraImage, ImuSample},
};
use eyre::Result;
use tokio::sync::watch;
use tracing::{info, warn};

/// What a finished replay did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaySummary {
    pub stats: ReplayStats,
    pub latency: LatencyStats,
}

/// How a replay ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplayOutcome {
    /// A stream ran out.
    Completed(ReplaySummary),
    /// A shutdown was requested between frames.
    Interrupted(ReplaySummary),
}

impl ReplayOutcome {
    pub fn summary(&self) -> &ReplaySummary {
        match self {
            ReplayOutcome::Completed(summary) | ReplayOutcome::Interrupted(summary) => summary,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, ReplayOutcome::Interrupted(_))
    }
}

/// Runs a [Synchronizer] to completion against an estimator.
///
/// The driver puts the estimator in blocking mode, so every call returns
/// only after the input is consumed. A shutdown request is only honoured
/// between frames.
pub struct ReplayDriver<I, C, E, S> {
    sync: Synchronizer<I, C>,
    estimator: E,
    recorder: TimingRecorder<S>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<I, C, E, S> ReplayDriver<I, C, E, S>
where
    I: MessageStream<Item = ImuSample>,
    C: MessageStream<Item = CameraImage>,
    E: Estimator,
    S: TimingSink,
{
    pub fn new(sync: Synchronizer<I, C>, estimator: E, timing_sink: S) -> Self {
        Self {
            sync,
            estimator,
            recorder: TimingRecorder::new(timing_sink),
            shutdown: None,
        }
    }

    /// Stop between frames once `shutdown` reads `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn run(mut self) -> Result<ReplayOutcome> {
        let result = self.run_loop();

        self.estimator.finish();
        let flushed = self.recorder.flush();

        let outcome = result?;
        flushed?;

        let ReplaySummary { stats, latency } = *outcome.summary();
        info!(
            frames_delivered = stats.frames_delivered,
            frames_suppressed = stats.frames_suppressed,
            imu_delivered = stats.imu_delivered,
            imu_suppressed = stats.imu_suppressed,
            mean_latency = ?latency.mean(),
            max_latency = ?latency.max,
            interrupted = outcome.is_interrupted(),
            "replay finished"
        );
        Ok(outcome)
    }

    fn run_loop(&mut self) -> Result<ReplayOutcome> {
        self.estimator.set_blocking(true);
        self.sync.apply_start_offset()?;

        let total = self.sync.frames_total();
        let interval = self.sync.config().progress_interval;
        info!(frames = total, "replay started");

        loop {
            if self.shutdown_requested() {
                warn!(
                    frame = self.sync.state().frame_counter,
                    "shutdown requested, stopping replay"
                );
                return Ok(ReplayOutcome::Interrupted(self.summary()));
            }

            self.estimator.display();

            let phase = self.sync.step(&mut self.estimator, &mut self.recorder)?;
            if phase == Phase::Done {
                return Ok(ReplayOutcome::Completed(self.summary()));
            }

            let stats = self.sync.stats();
            if interval > 0 && stats.frames_observed % interval == 0 {
                let read = stats.frames_skipped + stats.frames_observed;
                let percent = if total == 0 {
                    100.0
                } else {
                    read as f64 * 100.0 / total as f64
                };
                info!(
                    frame = self.sync.state().frame_counter,
                    total,
                    "progress: {percent:.1}%"
                );
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn summary(&self) -> ReplaySummary {
        ReplaySummary {
            stats: self.sync.stats(),
            latency: self.recorder.stats(),
        }
    }
}
