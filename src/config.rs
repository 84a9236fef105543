//! Command-line and environment configuration.

use crate::sampler::RolloverPolicy;
use anyhow::{bail, Result};
use clap::Parser;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

/// Reports per-core CPU and network utilization of this node to a controller
#[derive(Parser, Debug, Clone)]
#[command(name = "utilstat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Controller host name or address
    #[arg(long, env = "UTILSTAT_CONTROLLER_HOST", default_value = "10.1.47.178")]
    pub controller_host: String,

    /// Controller port
    #[arg(long, env = "UTILSTAT_CONTROLLER_PORT", default_value = "2345")]
    pub controller_port: u16,

    /// Port this node serves data on, reported in every record
    #[arg(long, env = "UTILSTAT_DATA_PORT", default_value = "50030")]
    pub data_port: u16,

    /// CPU measurement window in seconds
    #[arg(long, env = "UTILSTAT_SAMPLE_WINDOW", default_value = "1")]
    pub sample_window: f64,

    /// Time between reports in seconds
    #[arg(long, env = "UTILSTAT_REPORT_INTERVAL", default_value = "1")]
    pub report_interval: f64,

    /// Interface to read byte counters from (default: the default-route interface)
    #[arg(short, long, env = "UTILSTAT_INTERFACE")]
    pub interface: Option<String>,

    /// Address to report instead of discovering one
    #[arg(long, env = "UTILSTAT_NODE_IP")]
    pub node_ip: Option<Ipv4Addr>,

    /// What to do when a byte counter goes backwards
    #[arg(long, env = "UTILSTAT_ON_ROLLBACK", value_enum, default_value_t = RolloverPolicy::Clamp)]
    pub on_rollback: RolloverPolicy,

    /// Append every sent record to this JSON Lines file
    #[arg(short, long, env = "UTILSTAT_LOG")]
    pub log: Option<PathBuf>,

    /// Stop after this many reports (default: run until killed)
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,

    /// Do not echo sent records to stdout
    #[arg(short, long)]
    pub quiet: bool,
}

/// Validated settings for one agent run
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub controller_host: String,
    pub controller_port: u16,
    pub data_port: u16,
    pub sample_window: Duration,
    pub report_interval: Duration,
    pub interface: Option<String>,
    pub node_ip: Option<Ipv4Addr>,
    pub on_rollback: RolloverPolicy,
    pub log: Option<PathBuf>,
    pub count: Option<u64>,
    pub echo: bool,
}

impl AgentConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let sample_window = seconds("sample-window", args.sample_window)?;
        let report_interval = seconds("report-interval", args.report_interval)?;

        if sample_window > report_interval {
            tracing::warn!(
                ?sample_window,
                ?report_interval,
                "sample window exceeds report interval; reports follow the window"
            );
        }

        Ok(Self {
            controller_host: args.controller_host,
            controller_port: args.controller_port,
            data_port: args.data_port,
            sample_window,
            report_interval,
            interface: args.interface,
            node_ip: args.node_ip,
            on_rollback: args.on_rollback,
            log: args.log,
            count: args.count,
            echo: !args.quiet,
        })
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        bail!("--{name} must be a positive number of seconds, got {value}");
    }
    Ok(Duration::from_secs_f64(value))
}
