//! A stand-in estimator for running the replay without a fusion engine.

use image::GrayImage;
use lockstep_core::{Estimator, Odometry, ResultSinks, Timestamp};
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use tracing::{debug, info};

/// Integrates gyroscope readings into an orientation and publishes one
/// pose per accepted frame.
///
/// The position never moves. The point is to exercise the replay and the
/// output files end to end with realistic call patterns.
#[derive(Debug)]
pub struct DryRunEstimator {
    sinks: ResultSinks,
    blocking: bool,
    orientation: UnitQuaternion<f64>,
    angular_velocity: Vector3<f64>,
    last_imu: Option<Timestamp>,
    imu_count: u64,
    frame_count: u64,
    last_frame_index: Option<u64>,
}

impl DryRunEstimator {
    pub fn new(sinks: ResultSinks) -> Self {
        Self {
            sinks,
            blocking: false,
            orientation: UnitQuaternion::identity(),
            angular_velocity: Vector3::zeros(),
            last_imu: None,
            imu_count: 0,
            frame_count: 0,
            last_frame_index: None,
        }
    }

    pub fn imu_count(&self) -> u64 {
        self.imu_count
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.orientation
    }
}

impl Estimator for DryRunEstimator {
    fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
    }

    fn add_imu_measurement(
        &mut self,
        timestamp: Timestamp,
        _linear_acceleration: &Vector3<f64>,
        angular_velocity: &Vector3<f64>,
    ) -> bool {
        if let Some(last) = self.last_imu
            && let Some(dt) = timestamp.checked_duration_since(last)
        {
            let step = UnitQuaternion::from_scaled_axis(angular_velocity * dt.as_secs_f64());
            self.orientation *= step;
        }

        self.angular_velocity = *angular_velocity;
        self.last_imu = Some(timestamp);
        self.imu_count += 1;
        true
    }

    fn add_image_with_index(
        &mut self,
        timestamp: Timestamp,
        camera_id: usize,
        image: &GrayImage,
        frame_index: u64,
    ) -> bool {
        // frame indices must grow, a repeat means the caller lost track
        if self.last_frame_index.is_some_and(|last| frame_index <= last) {
            debug!(frame_index, "frame index did not advance, rejecting");
            return false;
        }
        self.last_frame_index = Some(frame_index);
        self.frame_count += 1;

        debug!(
            %timestamp,
            camera_id,
            frame_index,
            width = image.width(),
            height = image.height(),
            "frame"
        );

        self.sinks.publish_odometry(&Odometry {
            timestamp,
            pose: Isometry3::from_parts(Translation3::identity(), self.orientation),
            velocity: Vector3::zeros(),
            angular_velocity: self.angular_velocity,
        });
        true
    }

    fn finish(&mut self) {
        info!(
            imu = self.imu_count,
            frames = self.frame_count,
            "dry-run estimator finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        f64::consts::FRAC_PI_2,
        sync::{Arc, Mutex},
    };

    fn collecting() -> (ResultSinks, Arc<Mutex<Vec<Odometry>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sinks =
            ResultSinks::new().with_odometry(move |odom| sink.lock().unwrap().push(odom.clone()));
        (sinks, seen)
    }

    #[test]
    fn test_publishes_pose_per_frame() {
        let (sinks, seen) = collecting();
        let mut estimator = DryRunEstimator::new(sinks);
        estimator.set_blocking(true);
        assert!(estimator.is_blocking());

        let image = GrayImage::new(4, 4);
        assert!(estimator.add_image_with_index(Timestamp::from_nanos(10), 0, &image, 1));
        assert!(estimator.add_image_with_index(Timestamp::from_nanos(20), 0, &image, 2));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].timestamp, Timestamp::from_nanos(20));
        assert_eq!(estimator.frame_count(), 2);
    }

    #[test]
    fn test_rejects_repeated_index() {
        let (sinks, seen) = collecting();
        let mut estimator = DryRunEstimator::new(sinks);
        let image = GrayImage::new(2, 2);

        assert!(estimator.add_image_with_index(Timestamp::from_nanos(10), 0, &image, 5));
        assert!(!estimator.add_image_with_index(Timestamp::from_nanos(20), 0, &image, 5));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_integrates_gyroscope() {
        let (sinks, _seen) = collecting();
        let mut estimator = DryRunEstimator::new(sinks);
        let gyr = Vector3::new(0.0, 0.0, FRAC_PI_2);
        let acc = Vector3::zeros();

        // one second at pi/2 rad/s in 10 steps
        for i in 0..=10u64 {
            estimator.add_imu_measurement(Timestamp::from_nanos(i * 100_000_000), &acc, &gyr);
        }

        assert_eq!(estimator.imu_count(), 11);
        let yaw = estimator.orientation().euler_angles().2;
        assert!((yaw - FRAC_PI_2).abs() < 1e-9, "yaw = {yaw}");
    }
}
