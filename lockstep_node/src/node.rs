//! ReplayNode implementation.

use crate::{config::Config, dry_run::DryRunEstimator};
use eyre::{Result, WrapErr};
use lockstep_core::{
    CameraImage, ImuSample, McapLog, ReplayDriver, ReplayOutcome, ResultSinks, SinkHandle,
    Synchronizer,
};
use std::path::Path;
use tokio::sync::watch;
use tracing::info;

/// Replays one recorded log through the dry-run estimator and writes the
/// trajectory and timing files.
pub struct ReplayNode {
    config: Config,
}

impl ReplayNode {
    /// Create a new ReplayNode with the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        info!(
            log = %config.log.path.display(),
            imu_topic = %config.log.imu_topic,
            camera_topic = %config.log.camera_topic,
            start_frame_index = config.replay.start_frame_index,
            minimum_delta = ?config.replay.minimum_delta,
            imu_skip = ?config.replay.imu_skip,
            "Creating ReplayNode"
        );

        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the replay until a stream ends or `shutdown` reads `true`.
    ///
    /// This blocks for the whole replay and is meant to run on a blocking
    /// thread.
    pub fn run(self, shutdown: watch::Receiver<bool>) -> Result<ReplayOutcome> {
        let Self { config } = self;

        let log = McapLog::open(&config.log.path)?;
        let imu = log.topic_stream::<ImuSample>(&config.log.imu_topic)?;
        let camera = log.topic_stream::<CameraImage>(&config.log.camera_topic)?;
        let sync = Synchronizer::new(imu, camera, config.to_replay_config())?;

        let paths = config.output_paths();
        let sink = SinkHandle::create(&paths)?;
        let estimator =
            DryRunEstimator::new(ResultSinks::new().with_odometry(sink.odometry_observer()));

        let outcome = ReplayDriver::new(sync, estimator, sink.clone())
            .with_shutdown(shutdown)
            .run()?;

        info!(
            trajectory = %paths.trajectory.display(),
            poses = sink.poses_written()?,
            timing = %paths.timing.display(),
            rows = sink.timings_written()?,
            "outputs written"
        );

        Ok(outcome)
    }
}

/// Log the topics of a recorded log.
pub fn describe_log(path: &Path) -> Result<()> {
    let log = McapLog::open(path)
        .wrap_err_with(|| format!("Failed to inspect log: {}", path.display()))?;

    info!(log = %log.path().display(), topics = log.topics().len(), "log summary");
    for (topic, info) in log.topics() {
        info!(
            topic = %topic,
            messages = info.message_count,
            encoding = %info.message_encoding,
            schema = info.schema_name.as_deref().unwrap_or("-"),
            "topic"
        );
    }

    Ok(())
}
