//! Node utilization reporter.
//!
//! Samples per-core CPU busy time and default-interface throughput from
//! /proc, and pushes each sample to a controller as a fixed big-endian
//! binary record over one long-lived TCP connection.

pub mod agent;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod reporter;
pub mod sampler;
pub mod wire;

pub use agent::Agent;
pub use error::{IdentityError, SampleError, WireError};
pub use reporter::Reporter;
pub use sampler::{CounterHistory, RolloverPolicy, Sample, Sampler};
pub use wire::UtilStatMessage;
