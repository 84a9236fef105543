//! Error types for sampling, wire decoding and identity discovery.

use std::fmt;
use std::io;
use thiserror::Error;

/// Which cumulative counter a rollback was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    RxBytes,
    TxBytes,
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counter::RxBytes => write!(f, "rx_bytes"),
            Counter::TxBytes => write!(f, "tx_bytes"),
        }
    }
}

/// Failures while reading counters or deriving rates.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed line in {path}: {line:?}")]
    Parse { path: String, line: String },

    #[error("no default route found in /proc/net/route")]
    NoDefaultInterface,

    #[error("interface {0:?} not present in /proc/net/dev")]
    InterfaceNotFound(String),

    #[error("{counter} counter went backwards ({previous} -> {current})")]
    CounterRollback {
        counter: Counter,
        previous: u64,
        current: u64,
    },

    #[error("rate interval must be non-zero")]
    EmptyInterval,
}

/// Failures while decoding a utilization record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated record: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("msgLen says {declared} bytes but record is {actual}")]
    LengthMismatch { declared: i32, actual: usize },

    #[error("negative core count {0}")]
    NegativeCoreCount(i32),

    #[error("{num_cores} cores need {expected} bytes but msgLen is {declared}")]
    CoreCountMismatch {
        num_cores: i32,
        expected: usize,
        declared: i32,
    },

    #[error("unexpected command code {0}")]
    UnexpectedCommand(i16),
}

/// Failure to settle on an address for this node.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("could not determine node address (tried: {})", .attempted.join(", "))]
    Unresolved { attempted: Vec<&'static str> },
}
