use image::GrayImage;
use nalgebra::{Isometry3, Vector3};
use std::{fmt, time::Duration};

/// A point in time on the recording clock, with nanosecond
/// resolution.
///
/// The value is stored as the offset from the Unix epoch. Stamps that
/// precede the epoch are floored to zero, which keeps the type totally
/// ordered without a sign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    pub const fn from_duration(since_epoch: Duration) -> Self {
        Self(since_epoch)
    }

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(Duration::from_nanos(nanos))
    }

    /// Convert a ROS `builtin_interfaces/Time` stamp.
    ///
    /// ```
    /// use lockstep_core::Timestamp;
    /// use std::time::Duration;
    ///
    /// let t = Timestamp::from_ros_time(1000, 500_000_000);
    /// assert_eq!(t.as_duration(), Duration::new(1000, 500_000_000));
    ///
    /// // Negative timestamps floor to zero
    /// assert_eq!(Timestamp::from_ros_time(-1, 0), Timestamp::ZERO);
    /// ```
    pub fn from_ros_time(sec: i32, nanosec: u32) -> Self {
        if sec >= 0 {
            Self(Duration::new(sec as u64, nanosec))
        } else {
            Self::ZERO
        }
    }

    /// Split back into ROS `(sec, nanosec)`, saturating at `i32::MAX`.
    pub fn to_ros_time(self) -> (i32, u32) {
        let sec = i32::try_from(self.0.as_secs()).unwrap_or(i32::MAX);
        (sec, self.0.subsec_nanos())
    }

    pub const fn as_duration(self) -> Duration {
        self.0
    }

    /// Nanoseconds since the epoch, saturating at `u64::MAX`.
    pub fn as_nanos(self) -> u64 {
        u64::try_from(self.0.as_nanos()).unwrap_or(u64::MAX)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }

    /// The time elapsed from `earlier` to `self`, or `None` if `earlier`
    /// is later than `self`.
    pub fn checked_duration_since(self, earlier: Timestamp) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }

    /// Whether `self` lies strictly more than `delta` after `start`.
    pub fn is_after(self, start: Timestamp, delta: Duration) -> bool {
        self.checked_duration_since(start)
            .is_some_and(|elapsed| elapsed > delta)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0.as_secs(), self.0.subsec_nanos())
    }
}

/// Creates a timestamp from the records fed to the synchronizer.
pub trait WithTimestamp {
    fn timestamp(&self) -> Timestamp;
}

/// Which of the two replayed sensors a stream belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Imu,
    Camera,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Imu => f.write_str("imu"),
            SensorKind::Camera => f.write_str("camera"),
        }
    }
}

/// One inertial measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct ImuSample {
    pub timestamp: Timestamp,
    /// Angular rate in rad/s.
    pub angular_velocity: Vector3<f64>,
    /// Linear acceleration in m/s².
    pub linear_acceleration: Vector3<f64>,
}

impl ImuSample {
    pub fn new(
        timestamp: Timestamp,
        angular_velocity: Vector3<f64>,
        linear_acceleration: Vector3<f64>,
    ) -> Self {
        Self {
            timestamp,
            angular_velocity,
            linear_acceleration,
        }
    }
}

impl WithTimestamp for ImuSample {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// A decoded single-channel camera image as read from the log.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraImage {
    pub timestamp: Timestamp,
    pub image: GrayImage,
}

impl WithTimestamp for CameraImage {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// A camera image tagged with the replay's own frame counter.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub timestamp: Timestamp,
    pub image: GrayImage,
    pub index: u64,
}

impl WithTimestamp for FrameRecord {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// A state estimate published by an estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct Odometry {
    pub timestamp: Timestamp,
    /// Pose of the sensor body in the world frame.
    pub pose: Isometry3<f64>,
    /// Linear velocity in the world frame.
    pub velocity: Vector3<f64>,
    /// Angular velocity in the body frame.
    pub angular_velocity: Vector3<f64>,
}
