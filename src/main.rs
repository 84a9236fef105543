//! utilstat - pushes this node's CPU and network utilization to a controller.

use anyhow::{Context, Result};
use clap::Parser;
use utilstat::config::{AgentConfig, Args};
use utilstat::identity::{default_strategies, resolve_node_ip};
use utilstat::logging::{init_tracing, RecordLogger};
use utilstat::metrics::network::default_interface;
use utilstat::metrics::{ProcNetDev, ProcStatCpu};
use utilstat::{Agent, Reporter, Sampler};

fn main() -> Result<()> {
    init_tracing();
    let config = AgentConfig::from_args(Args::parse())?;

    let interface = match config.interface.clone() {
        Some(name) => name,
        None => default_interface().context("Cannot pick an interface to measure")?,
    };
    let node_ip = resolve_node_ip(&default_strategies(config.node_ip))?;

    let reporter = Reporter::connect(
        &config.controller_host,
        config.controller_port,
        node_ip,
        config.data_port,
    )
    .with_context(|| {
        format!(
            "Failed to connect to controller {}:{}",
            config.controller_host, config.controller_port
        )
    })?;

    let counters = ProcNetDev::new(interface);
    tracing::info!(interface = counters.interface(), "measuring interface");

    let sampler = Sampler::new(
        ProcStatCpu::new(),
        counters,
        config.sample_window,
        config.on_rollback,
    );

    let mut agent = Agent::new(sampler, reporter, config.report_interval)?.with_echo(config.echo);
    if let Some(ref path) = config.log {
        agent = agent.with_record_log(RecordLogger::new(path)?);
    }

    agent.run(config.count)?;

    if let Some(ref path) = config.log {
        eprintln!("Records logged to: {}", path.display());
    }
    Ok(())
}
