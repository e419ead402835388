mod common;

use common::*;
use lockstep_core::{ImuSkipPolicy, ReplayConfig, Timestamp};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::time::Duration;

/// Generate jittered, sorted stamps at `period_us` over `duration_ms`.
fn jittered_stamps(
    rng: &mut StdRng,
    period_us: u64,
    jitter_us: u64,
    duration_ms: u64,
) -> Vec<Timestamp> {
    let mut stamps: Vec<Timestamp> = (0..duration_ms * 1000 / period_us)
        .map(|i| {
            let base = 1_000_000 + i * period_us;
            let jitter = rng.random_range(0..=jitter_us * 2);
            Timestamp::from_nanos((base + jitter - jitter_us) * 1000)
        })
        .collect();
    stamps.sort();
    stamps
}

/// Number of frames read before the inertial stream runs dry.
fn expected_observed(imu: &[Timestamp], camera: &[Timestamp]) -> usize {
    let Some(last_imu) = imu.last() else {
        return camera.len().min(1);
    };
    camera
        .iter()
        .position(|frame| frame >= last_imu)
        .map(|pos| pos + 1)
        .unwrap_or(camera.len())
}

#[test]
fn test_vio_rates_with_jitter() {
    // IMU: 200Hz ± 0.5ms, camera: 20Hz ± 2ms
    let mut rng = StdRng::seed_from_u64(42);

    for round in 0..20 {
        let imu = jittered_stamps(&mut rng, 5_000, 500, 3_000);
        let camera = jittered_stamps(&mut rng, 50_000, 2_000, 2_800);
        let start_frame_index = rng.random_range(0..10u64);
        let minimum_delta = Duration::from_millis(rng.random_range(0..200));
        let config = ReplayConfig::starting_at(start_frame_index, minimum_delta)
            .with_imu_skip(ImuSkipPolicy::Timestamp);

        let result = run_replay(&imu, &camera, config);
        let events = &result.estimator.events;
        let stats = result.outcome.summary().stats;

        assert_causal_order(events);

        // nothing inside the bootstrap window is delivered
        let start = camera[start_frame_index as usize];
        for event in events {
            assert!(
                event.timestamp().is_after(start, minimum_delta),
                "round {round}: {event:?} inside the bootstrap window"
            );
        }

        // indices count every observed frame from the offset
        let frames = result.estimator.frames();
        assert_indices_increasing(&frames);
        for &(stamp, index) in &frames {
            let position = camera.iter().position(|&c| c == stamp).unwrap() as u64;
            assert_eq!(index, position, "round {round}: index drift");
        }

        // one timing entry per observed frame
        let retained_imu: Vec<_> = imu.iter().copied().filter(|&t| t >= start).collect();
        let retained_camera = &camera[start_frame_index as usize..];
        let observed = expected_observed(&retained_imu, retained_camera);
        assert_eq!(stats.frames_observed as usize, observed, "round {round}");
        assert_eq!(result.timings.len(), observed, "round {round}");
        assert_eq!(
            stats.frames_delivered + stats.frames_suppressed,
            stats.frames_observed
        );
    }
}

#[test]
fn test_every_sample_before_last_frame_is_accounted_for() {
    let mut rng = StdRng::seed_from_u64(7);
    let imu = jittered_stamps(&mut rng, 2_500, 200, 2_000);
    let camera = jittered_stamps(&mut rng, 33_333, 1_000, 1_800);

    let result = run_replay(&imu, &camera, ReplayConfig::from_start());
    let stats = result.outcome.summary().stats;
    let last_frame = *camera.last().unwrap();

    // camera runs out first, so every sample up to the last frame is
    // either forwarded or suppressed
    let consumed = imu.iter().filter(|&&t| t <= last_frame).count() as u64;
    assert_eq!(stats.imu_delivered + stats.imu_suppressed, consumed);
    assert_eq!(stats.frames_observed as usize, camera.len());
    assert_causal_order(&result.estimator.events);
}

#[test]
fn test_duplicate_stamps_keep_imu_first() {
    // camera frames land exactly on inertial stamps
    let imu: Vec<_> = (0..500).map(|i| ms(i * 2)).collect();
    let camera: Vec<_> = (0..50).map(|i| ms(i * 20)).collect();

    let result = run_replay(&imu, &camera, ReplayConfig::from_start());
    let events = &result.estimator.events;
    assert_causal_order(events);

    let frame_pos = events
        .iter()
        .position(|e| matches!(e, Event::Frame { timestamp, .. } if *timestamp == ms(100)))
        .unwrap();
    assert_eq!(events[frame_pos - 1], Event::Imu(ms(100)));
}
