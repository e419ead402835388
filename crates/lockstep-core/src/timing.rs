use crate::types::Timestamp;
use eyre::Result;
use std::time::{Duration, Instant};

/// Wall-clock stopwatch.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    started: Option<Instant>,
    elapsed: Duration,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or resume measuring.
    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    /// Stop measuring and return the accumulated time.
    pub fn stop(&mut self) -> Duration {
        if let Some(started) = self.started.take() {
            self.elapsed += started.elapsed();
        }
        self.elapsed
    }

    pub fn reset(&mut self) {
        self.started = None;
        self.elapsed = Duration::ZERO;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) => self.elapsed + started.elapsed(),
            None => self.elapsed,
        }
    }
}

/// One per-frame latency measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingEntry {
    pub timestamp: Timestamp,
    pub elapsed: Duration,
}

/// Destination of per-frame latency measurements.
pub trait TimingSink {
    fn record_timing(&mut self, timestamp: Timestamp, elapsed: Duration) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl TimingSink for Vec<TimingEntry> {
    fn record_timing(&mut self, timestamp: Timestamp, elapsed: Duration) -> Result<()> {
        self.push(TimingEntry { timestamp, elapsed });
        Ok(())
    }
}

impl<S> TimingSink for &mut S
where
    S: TimingSink + ?Sized,
{
    fn record_timing(&mut self, timestamp: Timestamp, elapsed: Duration) -> Result<()> {
        (**self).record_timing(timestamp, elapsed)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Running latency summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

impl LatencyStats {
    pub fn add(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
    }

    pub fn mean(&self) -> Option<Duration> {
        let count = u32::try_from(self.count).ok().filter(|&n| n > 0)?;
        Some(self.total / count)
    }
}

/// Times frame deliveries and forwards each measurement to a
/// [TimingSink].
#[derive(Debug)]
pub struct TimingRecorder<S> {
    stopwatch: Stopwatch,
    sink: S,
    stats: LatencyStats,
}

impl<S> TimingRecorder<S>
where
    S: TimingSink,
{
    pub fn new(sink: S) -> Self {
        Self {
            stopwatch: Stopwatch::new(),
            sink,
            stats: LatencyStats::default(),
        }
    }

    /// Run `deliver` under the stopwatch and record `(timestamp, elapsed)`.
    pub fn time<R>(&mut self, timestamp: Timestamp, deliver: impl FnOnce() -> R) -> Result<R> {
        self.stopwatch.reset();
        self.stopwatch.start();
        let output = deliver();
        let elapsed = self.stopwatch.stop();

        self.stats.add(elapsed);
        self.sink.record_timing(timestamp, elapsed)?;
        Ok(output)
    }

    pub fn stats(&self) -> LatencyStats {
        self.stats
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
