use crate::types::{Odometry, Timestamp};
use image::GrayImage;
use nalgebra::Vector3;
use std::fmt;

/// A sensor-fusion engine fed by the replay.
///
/// In blocking mode every `add_*` call returns only after the input has
/// been consumed, which is what throttles the replay.
pub trait Estimator {
    fn set_blocking(&mut self, blocking: bool);

    /// Returns whether the sample was accepted.
    fn add_imu_measurement(
        &mut self,
        timestamp: Timestamp,
        linear_acceleration: &Vector3<f64>,
        angular_velocity: &Vector3<f64>,
    ) -> bool;

    /// Returns whether the frame was accepted.
    fn add_image_with_index(
        &mut self,
        timestamp: Timestamp,
        camera_id: usize,
        image: &GrayImage,
        frame_index: u64,
    ) -> bool;

    /// Refresh any attached visualization. Called once per loop
    /// iteration.
    fn display(&mut self) {}

    /// Called once when the replay stops, whatever the reason.
    fn finish(&mut self) {}
}

impl<E> Estimator for &mut E
where
    E: Estimator + ?Sized,
{
    fn set_blocking(&mut self, blocking: bool) {
        (**self).set_blocking(blocking)
    }

    fn add_imu_measurement(
        &mut self,
        timestamp: Timestamp,
        linear_acceleration: &Vector3<f64>,
        angular_velocity: &Vector3<f64>,
    ) -> bool {
        (**self).add_imu_measurement(timestamp, linear_acceleration, angular_velocity)
    }

    fn add_image_with_index(
        &mut self,
        timestamp: Timestamp,
        camera_id: usize,
        image: &GrayImage,
        frame_index: u64,
    ) -> bool {
        (**self).add_image_with_index(timestamp, camera_id, image, frame_index)
    }

    fn display(&mut self) {
        (**self).display()
    }

    fn finish(&mut self) {
        (**self).finish()
    }
}

/// Receives odometry published by an estimator.
pub type OdometryObserver = Box<dyn FnMut(&Odometry) + Send>;

/// Named observers an estimator reports its results to.
#[derive(Default)]
pub struct ResultSinks {
    odometry: Vec<OdometryObserver>,
}

impl ResultSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_odometry<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&Odometry) + Send + 'static,
    {
        self.odometry.push(Box::new(observer));
        self
    }

    /// Hand an estimate to every odometry observer.
    pub fn publish_odometry(&mut self, odometry: &Odometry) {
        for observer in &mut self.odometry {
            observer(odometry);
        }
    }

    pub fn has_odometry(&self) -> bool {
        !self.odometry.is_empty()
    }
}

impl fmt::Debug for ResultSinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSinks")
            .field("odometry", &self.odometry.len())
            .finish()
    }
}
