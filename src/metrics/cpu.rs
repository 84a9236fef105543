//! Per-core CPU utilization from /proc/stat.

use crate::error::SampleError;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

const PROC_STAT: &str = "/proc/stat";

/// Raw CPU time values from /proc/stat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

/// Source of per-core utilization over a measurement window.
pub trait CpuSource {
    /// Blocks for `window` and returns one percentage per logical core,
    /// in core-index order.
    fn measure(&mut self, window: Duration) -> Result<Vec<f64>, SampleError>;
}

/// Reads /proc/stat before and after the window.
pub struct ProcStatCpu {
    path: PathBuf,
}

impl ProcStatCpu {
    pub fn new() -> Self {
        Self::with_path(PROC_STAT)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<BTreeMap<usize, CpuTimes>, SampleError> {
        let path = self.path.display().to_string();
        let content = fs::read_to_string(&self.path).map_err(|source| SampleError::Read {
            path: path.clone(),
            source,
        })?;
        parse_proc_stat(&content).map_err(|line| SampleError::Parse { path, line })
    }
}

impl Default for ProcStatCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSource for ProcStatCpu {
    fn measure(&mut self, window: Duration) -> Result<Vec<f64>, SampleError> {
        let before = self.read()?;
        thread::sleep(window);
        let after = self.read()?;

        if !before.keys().eq(after.keys()) {
            tracing::warn!(
                before = before.len(),
                after = after.len(),
                "core count changed during measurement window; reporting only cores present in both readings"
            );
        }

        Ok(per_core_utilization(&before, &after))
    }
}

/// Parses the `cpuN` lines of /proc/stat, keyed by core index.
///
/// The aggregate `cpu` line is skipped. On a malformed core line the
/// offending line is returned as the error.
pub fn parse_proc_stat(content: &str) -> Result<BTreeMap<usize, CpuTimes>, String> {
    let mut cores = BTreeMap::new();

    for line in content.lines() {
        let Some(rest) = line.strip_prefix("cpu") else {
            continue;
        };
        if rest.starts_with(' ') {
            // Aggregate line
            continue;
        }

        let mut fields = rest.split_whitespace();
        let core_id: usize = fields
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| line.to_string())?;

        let values = fields
            .map(|s| s.parse::<u64>())
            .collect::<Result<Vec<u64>, _>>()
            .map_err(|_| line.to_string())?;
        if values.len() < 4 {
            return Err(line.to_string());
        }

        cores.insert(core_id, times_from_fields(&values));
    }

    Ok(cores)
}

fn times_from_fields(parts: &[u64]) -> CpuTimes {
    // Older kernels stop after idle/iowait; missing columns are zero.
    CpuTimes {
        user: *parts.first().unwrap_or(&0),
        nice: *parts.get(1).unwrap_or(&0),
        system: *parts.get(2).unwrap_or(&0),
        idle: *parts.get(3).unwrap_or(&0),
        iowait: *parts.get(4).unwrap_or(&0),
        irq: *parts.get(5).unwrap_or(&0),
        softirq: *parts.get(6).unwrap_or(&0),
        steal: *parts.get(7).unwrap_or(&0),
    }
}

/// Busy percentage of one core between two readings.
pub fn utilization(prev: &CpuTimes, curr: &CpuTimes) -> f64 {
    let total_delta = curr.total().saturating_sub(prev.total());
    if total_delta == 0 {
        return 0.0;
    }

    let idle_delta = curr.idle_total().saturating_sub(prev.idle_total());
    100.0 * (1.0 - (idle_delta as f64 / total_delta as f64))
}

/// Pairs readings by core index, in index order. Cores present in only one
/// reading are dropped.
pub fn per_core_utilization(
    before: &BTreeMap<usize, CpuTimes>,
    after: &BTreeMap<usize, CpuTimes>,
) -> Vec<f64> {
    after
        .iter()
        .filter_map(|(id, curr)| before.get(id).map(|prev| utilization(prev, curr)))
        .collect()
}
