//! The report loop: sample, send, wait out the rest of the interval.

use crate::logging::{RecordLogger, ReportRecord};
use crate::metrics::{CounterSource, CpuSource};
use crate::reporter::Reporter;
use crate::sampler::{CounterHistory, Sampler};
use crate::wire::{bytes_per_sec_to_mbps, UtilStatMessage};
use anyhow::{Context, Result};
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

pub struct Agent<C, N, W> {
    sampler: Sampler<C, N>,
    reporter: Reporter<W>,
    history: CounterHistory,
    report_interval: Duration,
    record_log: Option<RecordLogger>,
    echo: bool,
}

impl<C: CpuSource, N: CounterSource, W: Write> Agent<C, N, W> {
    /// Takes the baseline counter reading; fails if the interface cannot be read.
    pub fn new(
        mut sampler: Sampler<C, N>,
        reporter: Reporter<W>,
        report_interval: Duration,
    ) -> Result<Self> {
        let history = sampler
            .baseline()
            .context("Failed to take baseline counter reading")?;

        Ok(Self {
            sampler,
            reporter,
            history,
            report_interval,
            record_log: None,
            echo: false,
        })
    }

    pub fn with_record_log(mut self, logger: RecordLogger) -> Self {
        self.record_log = Some(logger);
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// One iteration without the trailing wait.
    pub fn tick(&mut self) -> Result<UtilStatMessage> {
        let (sample, history) = self.sampler.sample(self.history)?;
        self.history = history;

        let msg = self
            .reporter
            .send(&sample)
            .context("Failed to send utilization record")?;

        let record = ReportRecord {
            timestamp: sample.timestamp,
            ticket: msg.ticket,
            node_ip: self.reporter.node_ip(),
            port: msg.port,
            rx_mbps: bytes_per_sec_to_mbps(sample.rx_bytes_per_sec),
            tx_mbps: bytes_per_sec_to_mbps(sample.tx_bytes_per_sec),
            cpu: sample.cpu_util,
        };

        if self.echo {
            println!("{}", record.summary_line(&msg));
        }
        if let Some(logger) = self.record_log.as_mut() {
            logger.log(&record)?;
        }

        Ok(msg)
    }

    /// Runs `count` iterations, or forever when `count` is `None`.
    /// The first error ends the loop.
    pub fn run(&mut self, count: Option<u64>) -> Result<()> {
        let mut completed: u64 = 0;

        loop {
            if count.is_some_and(|n| completed >= n) {
                break;
            }

            let started = Instant::now();
            self.tick()?;
            completed += 1;

            if count.is_some_and(|n| completed >= n) {
                break;
            }

            if let Some(rest) = self.report_interval.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }

        if let Some(logger) = self.record_log.as_mut() {
            logger.flush()?;
        }
        tracing::info!(reports = self.reporter.sent(), "report loop finished");
        Ok(())
    }

    pub fn reporter(&self) -> &Reporter<W> {
        &self.reporter
    }
}
