//! Diagnostic output: tracing setup, the stdout record echo and the
//! optional JSON Lines log of every record sent.

use crate::wire::UtilStatMessage;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A sent record with the unrounded rates it was built from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportRecord {
    pub timestamp: DateTime<Utc>,
    pub ticket: i64,
    pub node_ip: Ipv4Addr,
    pub port: i32,
    pub rx_mbps: f64,
    pub tx_mbps: f64,
    pub cpu: Vec<f64>,
}

impl ReportRecord {
    /// One-line form echoed to stdout after each send.
    pub fn summary_line(&self, msg: &UtilStatMessage) -> String {
        let cores: Vec<String> = msg.cpu_util.iter().map(|u| u.to_string()).collect();
        format!(
            "ticket={} node={}:{} rx={}Mbps tx={}Mbps cores={} cpu=[{}]",
            msg.ticket,
            self.node_ip,
            msg.port,
            msg.rx_mbps,
            msg.tx_mbps,
            msg.cpu_util.len(),
            cores.join(",")
        )
    }
}

/// Logger for writing sent records to a JSON Lines file
pub struct RecordLogger {
    writer: BufWriter<File>,
    records_written: u64,
}

impl RecordLogger {
    /// Create a new logger, truncating any existing file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path.as_ref())
            .with_context(|| format!("Failed to create log file {}", path.as_ref().display()))?;

        Ok(Self {
            writer: BufWriter::new(file),
            records_written: 0,
        })
    }

    /// Append a record to the log file
    pub fn log(&mut self, record: &ReportRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", json)?;
        self.records_written += 1;

        // Flush every 10 records to avoid losing data on crash
        if self.records_written % 10 == 0 {
            self.writer.flush()?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

impl Drop for RecordLogger {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
