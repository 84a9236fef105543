//! Turns cumulative counters into per-interval rates.
//!
//! The counter window is an explicit [`CounterHistory`] value: each call to
//! [`Sampler::sample`] takes the previous history and hands back the
//! advanced one, so the caller owns the state between iterations.

use crate::error::{Counter, SampleError};
use crate::metrics::{ByteCounters, CounterSource, CpuSource};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use std::time::{Duration, Instant};

/// What to do when a cumulative counter goes backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum RolloverPolicy {
    /// Report zero throughput for the interval and log a warning
    #[default]
    Clamp,
    /// Fail the sample
    Reject,
}

/// Per-second byte rates over one interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rates {
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
}

/// One utilization sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Busy percentage per logical core, in core-index order
    pub cpu_util: Vec<f64>,
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
}

/// Previous counter reading and when it was taken.
#[derive(Debug, Clone, Copy)]
pub struct CounterHistory {
    previous: ByteCounters,
    taken_at: Instant,
}

impl CounterHistory {
    pub fn new(previous: ByteCounters, taken_at: Instant) -> Self {
        Self { previous, taken_at }
    }

    pub fn previous(&self) -> ByteCounters {
        self.previous
    }

    /// Rates from the stored reading to `current` over an explicit interval.
    pub fn rates(
        &self,
        current: ByteCounters,
        interval: Duration,
        policy: RolloverPolicy,
    ) -> Result<Rates, SampleError> {
        if interval.is_zero() {
            return Err(SampleError::EmptyInterval);
        }

        Ok(Rates {
            rx_bytes_per_sec: checked_rate(
                Counter::RxBytes,
                self.previous.rx_bytes,
                current.rx_bytes,
                interval,
                policy,
            )?,
            tx_bytes_per_sec: checked_rate(
                Counter::TxBytes,
                self.previous.tx_bytes,
                current.tx_bytes,
                interval,
                policy,
            )?,
        })
    }

    /// Computes rates over the time since the stored reading, then moves the
    /// window forward to `current`.
    pub fn advance(
        self,
        current: ByteCounters,
        taken_at: Instant,
        policy: RolloverPolicy,
    ) -> Result<(Rates, CounterHistory), SampleError> {
        let interval = taken_at.saturating_duration_since(self.taken_at);
        let rates = self.rates(current, interval, policy)?;
        Ok((rates, CounterHistory::new(current, taken_at)))
    }
}

/// `(current - previous) / interval`, or `None` if the counter went backwards.
pub fn byte_rate(previous: u64, current: u64, interval: Duration) -> Option<f64> {
    let delta = current.checked_sub(previous)?;
    Some(delta as f64 / interval.as_secs_f64())
}

fn checked_rate(
    counter: Counter,
    previous: u64,
    current: u64,
    interval: Duration,
    policy: RolloverPolicy,
) -> Result<f64, SampleError> {
    if let Some(rate) = byte_rate(previous, current, interval) {
        return Ok(rate);
    }

    match policy {
        RolloverPolicy::Clamp => {
            tracing::warn!(%counter, previous, current, "counter rollback, reporting zero rate");
            Ok(0.0)
        }
        RolloverPolicy::Reject => Err(SampleError::CounterRollback {
            counter,
            previous,
            current,
        }),
    }
}

/// Measures CPU over a blocking window, then reads interface counters.
pub struct Sampler<C, N> {
    cpu: C,
    counters: N,
    window: Duration,
    policy: RolloverPolicy,
}

impl<C: CpuSource, N: CounterSource> Sampler<C, N> {
    pub fn new(cpu: C, counters: N, window: Duration, policy: RolloverPolicy) -> Self {
        Self {
            cpu,
            counters,
            window,
            policy,
        }
    }

    /// Takes the first counter reading, the baseline for the first sample.
    pub fn baseline(&mut self) -> Result<CounterHistory, SampleError> {
        let counters = self.counters.read()?;
        Ok(CounterHistory::new(counters, Instant::now()))
    }

    /// Takes one sample. Blocks for the measurement window.
    pub fn sample(
        &mut self,
        history: CounterHistory,
    ) -> Result<(Sample, CounterHistory), SampleError> {
        let cpu_util = self.cpu.measure(self.window)?;
        let timestamp = Utc::now();
        let current = self.counters.read()?;
        let (rates, history) = history.advance(current, Instant::now(), self.policy)?;

        tracing::debug!(
            cores = cpu_util.len(),
            rx = rates.rx_bytes_per_sec,
            tx = rates.tx_bytes_per_sec,
            "sampled"
        );

        let sample = Sample {
            timestamp,
            cpu_util,
            rx_bytes_per_sec: rates.rx_bytes_per_sec,
            tx_bytes_per_sec: rates.tx_bytes_per_sec,
        };
        Ok((sample, history))
    }
}
