//! Linux /proc readers for CPU time and interface byte counters.

pub mod cpu;
pub mod network;

pub use cpu::{CpuSource, ProcStatCpu};
pub use network::{ByteCounters, CounterSource, ProcNetDev};
