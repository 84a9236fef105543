//! Interface byte counters from /proc/net/dev and default-route lookup
//! from /proc/net/route.

use crate::error::SampleError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const PROC_NET_DEV: &str = "/proc/net/dev";
const PROC_NET_ROUTE: &str = "/proc/net/route";

const RTF_UP: u32 = 0x0001;

/// Cumulative byte counters of one interface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Source of cumulative counters for a single interface.
pub trait CounterSource {
    fn read(&mut self) -> Result<ByteCounters, SampleError>;
}

/// Reads one interface's row out of /proc/net/dev.
pub struct ProcNetDev {
    interface: String,
    path: PathBuf,
}

impl ProcNetDev {
    pub fn new(interface: impl Into<String>) -> Self {
        Self::with_path(interface, PROC_NET_DEV)
    }

    pub fn with_path(interface: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            interface: interface.into(),
            path: path.into(),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl CounterSource for ProcNetDev {
    fn read(&mut self) -> Result<ByteCounters, SampleError> {
        let content = fs::read_to_string(&self.path).map_err(|source| SampleError::Read {
            path: self.path.display().to_string(),
            source,
        })?;

        parse_net_dev(&content)
            .remove(&self.interface)
            .ok_or_else(|| SampleError::InterfaceNotFound(self.interface.clone()))
    }
}

/// Parses /proc/net/dev into per-interface byte counters.
///
/// Rows that do not carry the full receive and transmit column groups are
/// ignored, as are the two header lines.
pub fn parse_net_dev(content: &str) -> HashMap<String, ByteCounters> {
    let mut counters = HashMap::new();

    for line in content.lines().skip(2) {
        // The name is separated by ':' which may touch the first counter
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if parts.len() < 16 {
            continue;
        }

        let (Ok(rx_bytes), Ok(tx_bytes)) = (parts[0].parse::<u64>(), parts[8].parse::<u64>())
        else {
            continue;
        };

        counters.insert(name.trim().to_string(), ByteCounters { rx_bytes, tx_bytes });
    }

    counters
}

/// Returns the interface carrying the default IPv4 route.
pub fn default_interface() -> Result<String, SampleError> {
    let content = fs::read_to_string(PROC_NET_ROUTE).map_err(|source| SampleError::Read {
        path: PROC_NET_ROUTE.to_string(),
        source,
    })?;

    parse_default_route(&content).ok_or(SampleError::NoDefaultInterface)
}

/// Picks the up route with destination 0.0.0.0 and the lowest metric.
pub fn parse_default_route(content: &str) -> Option<String> {
    let mut best: Option<(u32, &str)> = None;

    for line in content.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 8 {
            continue;
        }

        let (iface, destination, flags, metric, mask) =
            (parts[0], parts[1], parts[3], parts[6], parts[7]);
        if destination != "00000000" || mask != "00000000" {
            continue;
        }

        let flags = u32::from_str_radix(flags, 16).unwrap_or(0);
        if flags & RTF_UP == 0 {
            continue;
        }

        let metric: u32 = metric.parse().unwrap_or(u32::MAX);
        if best.map_or(true, |(m, _)| metric < m) {
            best = Some((metric, iface));
        }
    }

    best.map(|(_, iface)| iface.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 5000000    4000    0    0    0     0          0         0  5000000    4000    0    0    0     0       0          0
  eth0: 123456789  98765    1    2    0     0          0        10 987654321  87654    3    4    0     0       0          0
wlan0:42 1 0 0 0 0 0 0 84 2 0 0 0 0 0 0
";

    const ROUTE: &str = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
wlan0\t00000000\t0101A8C0\t0003\t0\t0\t600\t00000000\t0\t0\t0
eth0\t00000000\t0100000A\t0003\t0\t0\t100\t00000000\t0\t0\t0
eth0\t0000000A\t00000000\t0001\t0\t0\t100\t000000FF\t0\t0\t0
";

    #[test]
    fn parses_rx_and_tx_bytes() {
        let counters = parse_net_dev(NET_DEV);
        assert_eq!(
            counters["eth0"],
            ByteCounters {
                rx_bytes: 123456789,
                tx_bytes: 987654321
            }
        );
        assert_eq!(counters["lo"].rx_bytes, 5000000);
    }

    #[test]
    fn name_glued_to_first_counter_is_split() {
        let counters = parse_net_dev(NET_DEV);
        assert_eq!(counters["wlan0"].rx_bytes, 42);
        assert_eq!(counters["wlan0"].tx_bytes, 84);
    }

    #[test]
    fn default_route_prefers_lowest_metric() {
        assert_eq!(parse_default_route(ROUTE).as_deref(), Some("eth0"));
    }

    #[test]
    fn down_default_route_is_ignored() {
        let route = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth0\t00000000\t0100000A\t0002\t0\t0\t100\t00000000\t0\t0\t0
";
        assert_eq!(parse_default_route(route), None);
    }

    #[test]
    fn no_default_route() {
        let route = "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT\n";
        assert_eq!(parse_default_route(route), None);
    }

    #[test]
    fn reads_named_interface() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(NET_DEV.as_bytes()).unwrap();

        let mut reader = ProcNetDev::with_path("eth0", file.path());
        assert_eq!(reader.read().unwrap().tx_bytes, 987654321);

        let mut missing = ProcNetDev::with_path("eth9", file.path());
        assert!(matches!(
            missing.read(),
            Err(SampleError::InterfaceNotFound(name)) if name == "eth9"
        ));
    }
}
