use crate::{
    config::{ImuSkipPolicy, ReplayConfig},
    error::ReplayError,
    estimator::Estimator,
    state::{Phase, ReplayStats, RunState},
    stream::MessageStream,
    timing::{TimingRecorder, TimingSink},
    types::{CameraImage, ImuSample, SensorKind, Timestamp},
};
use eyre::{Result, WrapErr};
use tracing::{debug, info, warn};

/// Merges an inertial stream and a camera stream into one causally
/// ordered sequence of estimator calls.
///
/// Every camera frame is preceded by all inertial samples whose stamp is
/// not later than the frame's. Records that fall within
/// [minimum_delta](ReplayConfig::minimum_delta) of the first frame are
/// consumed but not forwarded.
pub struct Synchronizer<I, C> {
    imu: I,
    camera: C,
    config: ReplayConfig,
    state: RunState,
    held_frame: Option<CameraImage>,
    offset_applied: bool,
}

impl<I, C> Synchronizer<I, C>
where
    I: MessageStream<Item = ImuSample>,
    C: MessageStream<Item = CameraImage>,
{
    /// Fails with [ReplayError::MissingTopic] if either stream has no
    /// records.
    pub fn new(imu: I, camera: C, config: ReplayConfig) -> Result<Self> {
        if !imu.has_topic() {
            return Err(ReplayError::MissingTopic {
                sensor: SensorKind::Imu,
                topic: imu.topic().to_string(),
            }
            .into());
        }
        if !camera.has_topic() {
            return Err(ReplayError::MissingTopic {
                sensor: SensorKind::Camera,
                topic: camera.topic().to_string(),
            }
            .into());
        }

        let state = RunState::new(config.start_frame_index);
        Ok(Self {
            imu,
            camera,
            config,
            state,
            held_frame: None,
            offset_applied: false,
        })
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn stats(&self) -> ReplayStats {
        self.state.stats
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// Total camera records in the log, skipped ones included.
    pub fn frames_total(&self) -> usize {
        self.camera.len()
    }

    /// Skip the configured number of leading frames and the matching
    /// inertial prefix. Runs at most once.
    pub fn apply_start_offset(&mut self) -> Result<()> {
        if self.offset_applied {
            return Ok(());
        }
        self.offset_applied = true;

        let frames = self.config.start_frame_index;
        if frames == 0 && matches!(self.config.imu_skip, ImuSkipPolicy::RateRatio { .. }) {
            return Ok(());
        }

        let frames_skipped = self
            .camera
            .skip(to_usize(frames))
            .wrap_err("unable to skip camera records")?;
        if (frames_skipped as u64) < frames {
            warn!(
                requested = frames,
                available = frames_skipped,
                "start offset lies past the last camera frame"
            );
        }

        let imu_skipped = match self.config.imu_skip {
            ImuSkipPolicy::RateRatio { ratio } => self.imu.skip(to_usize(ratio.saturating_mul(frames))),
            ImuSkipPolicy::Timestamp => match self.camera.peek_timestamp() {
                Some(first_frame) => self.imu.skip_before(first_frame),
                None => Ok(0),
            },
        }
        .wrap_err("unable to skip inertial records")?;

        self.state.stats.frames_skipped = frames_skipped as u64;
        self.state.stats.imu_skipped = imu_skipped as u64;

        info!(
            frames_skipped,
            imu_skipped,
            policy = ?self.config.imu_skip,
            "applied start offset"
        );
        Ok(())
    }

    /// Run one full cycle: read a frame, drain the inertial samples up to
    /// it and deliver it. Returns the phase reached, which is either
    /// [Phase::AwaitFrame] or [Phase::Done].
    pub fn step<E, S>(
        &mut self,
        estimator: &mut E,
        recorder: &mut TimingRecorder<S>,
    ) -> Result<Phase>
    where
        E: Estimator + ?Sized,
        S: TimingSink,
    {
        self.apply_start_offset()?;

        loop {
            let phase = self.advance_phase(estimator, recorder)?;
            if matches!(phase, Phase::AwaitFrame | Phase::Done) {
                return Ok(phase);
            }
        }
    }

    /// Step until one of the streams runs out.
    pub fn run_to_end<E, S>(
        &mut self,
        estimator: &mut E,
        recorder: &mut TimingRecorder<S>,
    ) -> Result<ReplayStats>
    where
        E: Estimator + ?Sized,
        S: TimingSink,
    {
        while self.step(estimator, recorder)? != Phase::Done {}
        Ok(self.stats())
    }

    fn advance_phase<E, S>(
        &mut self,
        estimator: &mut E,
        recorder: &mut TimingRecorder<S>,
    ) -> Result<Phase>
    where
        E: Estimator + ?Sized,
        S: TimingSink,
    {
        let next = match self.state.phase {
            Phase::AwaitFrame => self.await_frame()?,
            Phase::DrainImu => self.drain_imu(estimator)?,
            Phase::DeliverFrame => self.deliver_frame(estimator, recorder)?,
            Phase::Done => Phase::Done,
        };
        self.state.phase = next;
        Ok(next)
    }

    fn await_frame(&mut self) -> Result<Phase> {
        if self.camera.at_end() {
            debug!("camera stream exhausted");
            return Ok(Phase::Done);
        }
        if self.state.imu_exhausted {
            debug!("inertial stream exhausted");
            return Ok(Phase::Done);
        }

        let frame = self.camera.advance()?;
        let stamp = frame.timestamp;
        if self.state.start_time.is_none() {
            debug!(%stamp, "replay start time set");
        }
        self.state.mark_start(stamp);

        self.state.current_frame = Some(stamp);
        self.state.stats.frames_observed += 1;
        self.held_frame = Some(frame);
        Ok(Phase::DrainImu)
    }

    fn drain_imu<E>(&mut self, estimator: &mut E) -> Result<Phase>
    where
        E: Estimator + ?Sized,
    {
        let (frame_stamp, start) = self.frame_window()?;
        let delta = self.config.minimum_delta;

        while let Some(stamp) = self.imu.peek_timestamp()
            && stamp <= frame_stamp
        {
            let sample = self.imu.advance()?;
            let stats = &mut self.state.stats;

            if !sample.timestamp.is_after(start, delta) {
                stats.imu_suppressed += 1;
                debug!(%stamp, "inertial sample inside bootstrap window");
                continue;
            }

            let accepted = estimator.add_imu_measurement(
                sample.timestamp,
                &sample.linear_acceleration,
                &sample.angular_velocity,
            );
            stats.imu_delivered += 1;
            if !accepted {
                stats.imu_rejected += 1;
                debug!(%stamp, "estimator declined inertial sample");
            }
        }

        if self.imu.at_end() {
            self.state.imu_exhausted = true;
        }
        Ok(Phase::DeliverFrame)
    }

    fn deliver_frame<E, S>(
        &mut self,
        estimator: &mut E,
        recorder: &mut TimingRecorder<S>,
    ) -> Result<Phase>
    where
        E: Estimator + ?Sized,
        S: TimingSink,
    {
        let (stamp, start) = self.frame_window()?;
        let Some(frame) = self.held_frame.take() else {
            eyre::bail!("no camera frame held for delivery");
        };
        let index = self.state.next_frame_index();
        let admitted = stamp.is_after(start, self.config.minimum_delta);
        let camera_id = self.config.camera_id;

        let outcome = recorder.time(stamp, || {
            admitted.then(|| estimator.add_image_with_index(stamp, camera_id, &frame.image, index))
        })?;

        let stats = &mut self.state.stats;
        match outcome {
            Some(accepted) => {
                stats.frames_delivered += 1;
                if !accepted {
                    stats.frames_rejected += 1;
                    debug!(%stamp, index, "estimator declined frame");
                }
            }
            None => {
                stats.frames_suppressed += 1;
                debug!(%stamp, index, "frame inside bootstrap window");
            }
        }

        self.state.current_frame = None;
        Ok(Phase::AwaitFrame)
    }

    fn frame_window(&self) -> Result<(Timestamp, Timestamp)> {
        let (Some(frame), Some(start)) = (self.state.current_frame, self.state.start_time) else {
            eyre::bail!("phase {:?} reached without a current frame", self.state.phase);
        };
        Ok((frame, start))
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}
