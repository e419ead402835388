use image::GrayImage;
use lockstep_core::{
    CameraImage, Estimator, ImuSample, ReplayConfig, ReplayDriver, Synchronizer, Timestamp,
    TimingEntry, VecStream,
};
use nalgebra::Vector3;
use std::time::Duration;

// Print every call the replay makes
struct PrintingEstimator;

impl Estimator for PrintingEstimator {
    fn set_blocking(&mut self, blocking: bool) {
        println!("blocking = {blocking}");
    }

    fn add_imu_measurement(
        &mut self,
        timestamp: Timestamp,
        linear_acceleration: &Vector3<f64>,
        _angular_velocity: &Vector3<f64>,
    ) -> bool {
        println!("imu   {timestamp}  acc.z = {:.2}", linear_acceleration.z);
        true
    }

    fn add_image_with_index(
        &mut self,
        timestamp: Timestamp,
        camera_id: usize,
        image: &GrayImage,
        frame_index: u64,
    ) -> bool {
        let (w, h) = image.dimensions();
        println!("frame {timestamp}  cam{camera_id} #{frame_index} ({w}x{h})");
        true
    }
}

fn main() -> eyre::Result<()> {
    let imu_seq = [1000, 1005, 1010, 1015, 1020, 1025, 1030, 1035, 1040];
    let cam_seq = [1000, 1020, 1040];

    macro_rules! millis {
        ($ts:expr) => {
            Timestamp::from_duration(Duration::from_millis($ts))
        };
    }

    // Create two message streams
    let imu = VecStream::new(
        "/imu0",
        imu_seq.map(|ts| ImuSample::new(millis!(ts), Vector3::zeros(), Vector3::new(0.0, 0.0, 9.81))),
    );
    let camera = VecStream::new(
        "/cam0/image_raw",
        cam_seq.map(|ts| CameraImage {
            timestamp: millis!(ts),
            image: GrayImage::new(752, 480),
        }),
    );

    // Replay them in lockstep
    let sync = Synchronizer::new(imu, camera, ReplayConfig::from_start())?;
    let mut timings: Vec<TimingEntry> = Vec::new();
    let outcome = ReplayDriver::new(sync, PrintingEstimator, &mut timings).run()?;

    println!("{:#?}", outcome.summary().stats);
    println!("{} timing entries", timings.len());

    Ok(())
}
