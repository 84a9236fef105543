//! Encodes samples and writes them to the controller connection.

use crate::identity::ip_to_wire;
use crate::sampler::Sample;
use crate::wire::{bytes_per_sec_to_mbps, truncate, UtilStatMessage, UTIL_STAT_CMD};
use chrono::Utc;
use std::io::{self, Write};
use std::net::{Ipv4Addr, TcpStream};

/// Builds the wire record for one sample.
pub fn build_message(
    node_ip: Ipv4Addr,
    port: u16,
    cpu_util: &[f64],
    rx_bytes_per_sec: f64,
    tx_bytes_per_sec: f64,
    ticket: i64,
) -> UtilStatMessage {
    UtilStatMessage {
        ticket,
        cmd: UTIL_STAT_CMD,
        node_ip: ip_to_wire(node_ip),
        port: i32::from(port),
        rx_mbps: truncate(bytes_per_sec_to_mbps(rx_bytes_per_sec)),
        tx_mbps: truncate(bytes_per_sec_to_mbps(tx_bytes_per_sec)),
        cpu_util: cpu_util.iter().map(|u| truncate(*u)).collect(),
    }
}

/// Writes the whole record in one call. Short writes and closed connections
/// come back as errors; nothing is retried.
pub fn send_message<W: Write>(conn: &mut W, msg: &UtilStatMessage) -> io::Result<()> {
    conn.write_all(&msg.encode())?;
    conn.flush()
}

/// Stamps a ticket at send time, encodes and writes one report.
pub fn send_util_stat<W: Write>(
    conn: &mut W,
    node_ip: Ipv4Addr,
    port: u16,
    cpu_util: &[f64],
    rx_bytes_per_sec: f64,
    tx_bytes_per_sec: f64,
) -> io::Result<UtilStatMessage> {
    let ticket = Utc::now().timestamp();
    let msg = build_message(
        node_ip,
        port,
        cpu_util,
        rx_bytes_per_sec,
        tx_bytes_per_sec,
        ticket,
    );
    send_message(conn, &msg)?;
    Ok(msg)
}

/// Owns the controller connection and this node's identity.
pub struct Reporter<W> {
    conn: W,
    node_ip: Ipv4Addr,
    data_port: u16,
    sent: u64,
}

impl Reporter<TcpStream> {
    /// Opens the single stream used for the life of the process.
    pub fn connect(
        host: &str,
        port: u16,
        node_ip: Ipv4Addr,
        data_port: u16,
    ) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        tracing::info!(controller = %stream.peer_addr()?, "connected to controller");
        Ok(Self::new(stream, node_ip, data_port))
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(conn: W, node_ip: Ipv4Addr, data_port: u16) -> Self {
        Self {
            conn,
            node_ip,
            data_port,
            sent: 0,
        }
    }

    pub fn send(&mut self, sample: &Sample) -> io::Result<UtilStatMessage> {
        let msg = send_util_stat(
            &mut self.conn,
            self.node_ip,
            self.data_port,
            &sample.cpu_util,
            sample.rx_bytes_per_sec,
            sample.tx_bytes_per_sec,
        )?;
        self.sent += 1;
        Ok(msg)
    }

    pub fn node_ip(&self) -> Ipv4Addr {
        self.node_ip
    }

    /// Number of records written so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn into_inner(self) -> W {
        self.conn
    }
}
