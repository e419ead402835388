use crate::{
    timing::TimingSink,
    types::{Odometry, Timestamp},
};
use eyre::{Result, WrapErr, bail, eyre};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{error, info};

pub const DEFAULT_TRAJECTORY_FILE: &str = "traj_estimate.txt";
pub const DEFAULT_TIMING_FILE: &str = "trace.csv";

const TIMING_HEADER: &str = "timestamp,elapsed";

/// Where the replay results are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Estimated trajectory, one TUM row per odometry message.
    pub trajectory: PathBuf,
    /// Per-frame processing time.
    pub timing: PathBuf,
}

impl OutputPaths {
    /// Default file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            trajectory: dir.join(DEFAULT_TRAJECTORY_FILE),
            timing: dir.join(DEFAULT_TIMING_FILE),
        }
    }
}

/// Text-file sink for trajectory and timing output.
#[derive(Debug)]
pub struct FileSink {
    trajectory: BufWriter<File>,
    timing: BufWriter<File>,
    poses_written: u64,
    timings_written: u64,
    /// First write failure seen by an observer, reported on flush.
    deferred_error: Option<String>,
}

impl FileSink {
    pub fn create(paths: &OutputPaths) -> Result<Self> {
        let trajectory = create_file(&paths.trajectory)?;
        let mut timing = create_file(&paths.timing)?;
        writeln!(timing, "{TIMING_HEADER}")
            .wrap_err_with(|| format!("unable to write {}", paths.timing.display()))?;

        info!(
            trajectory = %paths.trajectory.display(),
            timing = %paths.timing.display(),
            "writing trajectory and timing output"
        );

        Ok(Self {
            trajectory,
            timing,
            poses_written: 0,
            timings_written: 0,
            deferred_error: None,
        })
    }

    /// Append one row `t tx ty tz qx qy qz qw`.
    pub fn write_odometry(&mut self, odometry: &Odometry) -> Result<()> {
        let t = odometry.pose.translation.vector;
        let q = odometry.pose.rotation.coords;
        writeln!(
            self.trajectory,
            "{:.9} {:.9} {:.9} {:.9} {:.9} {:.9} {:.9} {:.9}",
            odometry.timestamp.as_secs_f64(),
            t.x,
            t.y,
            t.z,
            q.x,
            q.y,
            q.z,
            q.w,
        )
        .wrap_err("unable to write trajectory row")?;
        self.poses_written += 1;
        Ok(())
    }

    pub fn poses_written(&self) -> u64 {
        self.poses_written
    }

    pub fn timings_written(&self) -> u64 {
        self.timings_written
    }
}

impl TimingSink for FileSink {
    fn record_timing(&mut self, timestamp: Timestamp, elapsed: Duration) -> Result<()> {
        writeln!(
            self.timing,
            "{:.9},{:.9}",
            timestamp.as_secs_f64(),
            elapsed.as_secs_f64()
        )
        .wrap_err("unable to write timing row")?;
        self.timings_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.trajectory.flush().wrap_err("unable to flush trajectory")?;
        self.timing.flush().wrap_err("unable to flush timing")?;
        if let Some(err) = self.deferred_error.take() {
            bail!("trajectory output failed: {err}");
        }
        Ok(())
    }
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("unable to create directory {}", parent.display()))?;
    }
    let file =
        File::create(path).wrap_err_with(|| format!("unable to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Shared handle to a [FileSink].
///
/// The driver records timings through it while estimator observers append
/// odometry rows.
#[derive(Debug, Clone)]
pub struct SinkHandle {
    inner: Arc<Mutex<FileSink>>,
}

impl SinkHandle {
    pub fn new(sink: FileSink) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    pub fn create(paths: &OutputPaths) -> Result<Self> {
        Ok(Self::new(FileSink::create(paths)?))
    }

    fn with<R>(&self, f: impl FnOnce(&mut FileSink) -> Result<R>) -> Result<R> {
        let mut guard = self.inner.lock().map_err(|_| eyre!("output sink lock poisoned"))?;
        f(&mut guard)
    }

    /// An odometry observer that appends rows to the trajectory file.
    ///
    /// Write failures are logged and reported by the next
    /// [flush](TimingSink::flush).
    pub fn odometry_observer(&self) -> impl FnMut(&Odometry) + Send + 'static {
        let inner = self.inner.clone();
        move |odometry: &Odometry| {
            let Ok(mut sink) = inner.lock() else {
                error!("output sink lock poisoned, dropping odometry");
                return;
            };
            if let Err(err) = sink.write_odometry(odometry) {
                error!("{err:#}");
                sink.deferred_error.get_or_insert_with(|| format!("{err:#}"));
            }
        }
    }

    pub fn poses_written(&self) -> Result<u64> {
        self.with(|sink| Ok(sink.poses_written()))
    }

    pub fn timings_written(&self) -> Result<u64> {
        self.with(|sink| Ok(sink.timings_written()))
    }
}

impl TimingSink for SinkHandle {
    fn record_timing(&mut self, timestamp: Timestamp, elapsed: Duration) -> Result<()> {
        self.with(|sink| sink.record_timing(timestamp, elapsed))
    }

    fn flush(&mut self) -> Result<()> {
        self.with(|sink| sink.flush())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

    #[test]
    fn test_output_paths_defaults() {
        let paths = OutputPaths::in_dir("/tmp/run");
        assert_eq!(paths.trajectory, PathBuf::from("/tmp/run/traj_estimate.txt"));
        assert_eq!(paths.timing, PathBuf::from("/tmp/run/trace.csv"));
    }

    #[test]
    fn test_file_sink_rows() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::in_dir(dir.path().join("nested"));
        let mut handle = SinkHandle::create(&paths).unwrap();

        let mut observer = handle.odometry_observer();
        observer(&Odometry {
            timestamp: Timestamp::from_ros_time(1, 500_000_000),
            pose: Isometry3::from_parts(
                Translation3::new(1.0, 2.0, 3.0),
                UnitQuaternion::identity(),
            ),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        });
        handle
            .record_timing(Timestamp::from_ros_time(2, 0), Duration::from_millis(15))
            .unwrap();
        handle.flush().unwrap();

        assert_eq!(handle.poses_written().unwrap(), 1);
        assert_eq!(handle.timings_written().unwrap(), 1);

        let trajectory = std::fs::read_to_string(&paths.trajectory).unwrap();
        assert_eq!(
            trajectory,
            "1.500000000 1.000000000 2.000000000 3.000000000 \
             0.000000000 0.000000000 0.000000000 1.000000000\n"
        );
        let timing = std::fs::read_to_string(&paths.timing).unwrap();
        assert_eq!(timing, "timestamp,elapsed\n2.000000000,0.015000000\n");
    }

    #[test]
    fn test_create_in_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();

        // a regular file cannot act as a directory
        let paths = OutputPaths::in_dir(blocker.join("sub"));
        assert!(FileSink::create(&paths).is_err());
    }
}
