//! Binary utilization record sent to the controller.
//!
//! All fields are big-endian. The record is self-delimiting: `msgLen` counts
//! every byte including itself.
//!
//! ```text
//! msgLen:i32 ticket:i64 cmd:i16 datanodeIp:i32 port:i32
//! rxMbps:i32 txMbps:i32 numCores:i32 cpuUtil:i32 * numCores
//! ```

use crate::error::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{self, Read};

/// Command code the controller dispatches utilization records on.
pub const UTIL_STAT_CMD: i16 = 15;

/// Bytes before the per-core array.
pub const HEADER_LEN: usize = 4 + 8 + 2 + 5 * 4;

const CORE_ENTRY_LEN: usize = 4;

/// Largest core count a reader will accept.
pub const MAX_CORES: usize = 65536;

/// Largest record a reader will buffer.
pub const MAX_RECORD_LEN: usize = HEADER_LEN + CORE_ENTRY_LEN * MAX_CORES;

/// One utilization report as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtilStatMessage {
    /// Send-time Unix timestamp in seconds
    pub ticket: i64,
    pub cmd: i16,
    /// Node IPv4 address as a host-order integer, written big-endian
    pub node_ip: u32,
    /// Data-serving port of the reporting node
    pub port: i32,
    pub rx_mbps: i32,
    pub tx_mbps: i32,
    pub cpu_util: Vec<i32>,
}

impl UtilStatMessage {
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + CORE_ENTRY_LEN * self.cpu_util.len()
    }

    pub fn encode(&self) -> Bytes {
        let len = self.encoded_len();
        let mut buf = BytesMut::with_capacity(len);

        buf.put_i32(len as i32);
        buf.put_i64(self.ticket);
        buf.put_i16(self.cmd);
        buf.put_u32(self.node_ip);
        buf.put_i32(self.port);
        buf.put_i32(self.rx_mbps);
        buf.put_i32(self.tx_mbps);
        buf.put_i32(self.cpu_util.len() as i32);
        for util in &self.cpu_util {
            buf.put_i32(*util);
        }

        buf.freeze()
    }

    /// Decodes exactly one record; `buf` must hold nothing else.
    pub fn decode(mut buf: &[u8]) -> Result<Self, WireError> {
        let actual = buf.len();
        if actual < HEADER_LEN {
            return Err(WireError::Truncated {
                needed: HEADER_LEN,
                available: actual,
            });
        }

        let declared = buf.get_i32();
        if usize::try_from(declared).ok() != Some(actual) {
            return Err(WireError::LengthMismatch { declared, actual });
        }

        let ticket = buf.get_i64();
        let cmd = buf.get_i16();
        if cmd != UTIL_STAT_CMD {
            return Err(WireError::UnexpectedCommand(cmd));
        }
        let node_ip = buf.get_u32();
        let port = buf.get_i32();
        let rx_mbps = buf.get_i32();
        let tx_mbps = buf.get_i32();

        let num_cores = buf.get_i32();
        if num_cores < 0 {
            return Err(WireError::NegativeCoreCount(num_cores));
        }
        let expected = HEADER_LEN + CORE_ENTRY_LEN * num_cores as usize;
        if expected != actual {
            return Err(WireError::CoreCountMismatch {
                num_cores,
                expected,
                declared,
            });
        }

        let cpu_util = (0..num_cores).map(|_| buf.get_i32()).collect();

        Ok(Self {
            ticket,
            cmd,
            node_ip,
            port,
            rx_mbps,
            tx_mbps,
            cpu_util,
        })
    }
}

/// Reads one length-prefixed record from a stream.
pub fn read_message<R: Read>(reader: &mut R) -> io::Result<UtilStatMessage> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;

    let declared = i32::from_be_bytes(prefix);
    let len = usize::try_from(declared)
        .ok()
        .filter(|len| (HEADER_LEN..=MAX_RECORD_LEN).contains(len))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad record length {declared}"),
            )
        })?;

    let mut frame = BytesMut::zeroed(len);
    frame[..4].copy_from_slice(&prefix);
    reader.read_exact(&mut frame[4..])?;

    UtilStatMessage::decode(&frame).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Bytes per second to megabits per second.
pub fn bytes_per_sec_to_mbps(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * 8.0 / 1e6
}

/// Drops the fractional part; out-of-range values saturate and NaN becomes 0.
pub fn truncate(value: f64) -> i32 {
    value as i32
}
