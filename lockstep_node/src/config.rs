//! Configuration parsing and validation for the lockstep node.

use eyre::{Result, WrapErr, ensure};
use lockstep_core::{
    DEFAULT_PROGRESS_INTERVAL, DEFAULT_RATE_RATIO, DEFAULT_TIMING_FILE, DEFAULT_TRAJECTORY_FILE,
    ImuSkipPolicy, OutputPaths, ReplayConfig,
};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The recorded log to replay.
    pub log: LogConfig,

    /// Replay parameters.
    #[serde(default)]
    pub replay: ReplaySettings,

    /// Where results are written.
    #[serde(default)]
    pub output: OutputConfig,

    /// Log verbosity.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.log.path.as_os_str().is_empty(),
            "log.path cannot be empty"
        );
        ensure!(
            !self.log.imu_topic.is_empty(),
            "log.imu_topic cannot be empty"
        );
        ensure!(
            !self.log.camera_topic.is_empty(),
            "log.camera_topic cannot be empty"
        );
        ensure!(
            self.log.imu_topic != self.log.camera_topic,
            "log.imu_topic and log.camera_topic must differ"
        );

        if let ImuSkipSetting::RateRatio { ratio } = self.replay.imu_skip {
            ensure!(ratio > 0, "replay.imu_skip.ratio must be greater than zero");
        }

        ensure!(
            !self.output.trajectory_file.as_os_str().is_empty(),
            "output.trajectory_file cannot be empty"
        );
        ensure!(
            !self.output.timing_file.as_os_str().is_empty(),
            "output.timing_file cannot be empty"
        );
        ensure!(
            self.output.trajectory_file != self.output.timing_file,
            "output.trajectory_file and output.timing_file must differ"
        );

        self.logging
            .level
            .parse::<tracing::Level>()
            .map_err(|_| eyre::eyre!("Unknown logging.level: {}", self.logging.level))?;

        Ok(())
    }

    /// Convert to lockstep-core ReplayConfig.
    pub fn to_replay_config(&self) -> ReplayConfig {
        let imu_skip = match self.replay.imu_skip {
            ImuSkipSetting::RateRatio { ratio } => ImuSkipPolicy::RateRatio { ratio },
            ImuSkipSetting::Timestamp => ImuSkipPolicy::Timestamp,
        };

        ReplayConfig::starting_at(self.replay.start_frame_index, self.replay.minimum_delta)
            .with_imu_skip(imu_skip)
            .with_camera_id(self.replay.camera_id)
            .with_progress_interval(self.replay.progress_interval)
    }

    /// Full paths of the output files.
    pub fn output_paths(&self) -> OutputPaths {
        OutputPaths {
            trajectory: self.output.trace_dir.join(&self.output.trajectory_file),
            timing: self.output.trace_dir.join(&self.output.timing_file),
        }
    }
}

/// The recorded log and the topics read from it.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Path to the MCAP file.
    pub path: PathBuf,

    /// Topic carrying `sensor_msgs/msg/Imu`.
    #[serde(default = "default_imu_topic")]
    pub imu_topic: String,

    /// Topic carrying mono8 `sensor_msgs/msg/Image`.
    #[serde(default = "default_camera_topic")]
    pub camera_topic: String,
}

fn default_imu_topic() -> String {
    "/imu0".to_string()
}

fn default_camera_topic() -> String {
    "/cam0/image_raw".to_string()
}

/// Replay parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaySettings {
    /// Camera frames skipped before the replay starts.
    #[serde(default)]
    pub start_frame_index: u64,

    /// Records this close to the first frame are not forwarded.
    #[serde(default, with = "humantime_serde")]
    pub minimum_delta: Duration,

    /// How inertial records are skipped together with the leading frames.
    #[serde(default)]
    pub imu_skip: ImuSkipSetting,

    /// Camera identifier passed with every frame.
    #[serde(default)]
    pub camera_id: usize,

    /// Frames between progress log lines. Zero disables them.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Keep the process alive after the replay until interrupted.
    #[serde(default)]
    pub hold_on_finish: bool,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            start_frame_index: 0,
            minimum_delta: Duration::ZERO,
            imu_skip: ImuSkipSetting::default(),
            camera_id: 0,
            progress_interval: default_progress_interval(),
            hold_on_finish: false,
        }
    }
}

fn default_progress_interval() -> u64 {
    DEFAULT_PROGRESS_INTERVAL
}

/// Inertial skip policy setting.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ImuSkipSetting {
    /// Skip `ratio` inertial records per skipped frame.
    RateRatio {
        #[serde(default = "default_rate_ratio")]
        ratio: u64,
    },
    /// Skip inertial records older than the first retained frame.
    Timestamp,
}

impl Default for ImuSkipSetting {
    fn default() -> Self {
        Self::RateRatio {
            ratio: default_rate_ratio(),
        }
    }
}

fn default_rate_ratio() -> u64 {
    DEFAULT_RATE_RATIO
}

/// Output file configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the output files.
    #[serde(default = "default_trace_dir")]
    pub trace_dir: PathBuf,

    /// Trajectory file name inside `trace_dir`.
    #[serde(default = "default_trajectory_file")]
    pub trajectory_file: PathBuf,

    /// Timing file name inside `trace_dir`.
    #[serde(default = "default_timing_file")]
    pub timing_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            trace_dir: default_trace_dir(),
            trajectory_file: default_trajectory_file(),
            timing_file: default_timing_file(),
        }
    }
}

fn default_trace_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_trajectory_file() -> PathBuf {
    PathBuf::from(DEFAULT_TRAJECTORY_FILE)
}

fn default_timing_file() -> PathBuf {
    PathBuf::from(DEFAULT_TIMING_FILE)
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
