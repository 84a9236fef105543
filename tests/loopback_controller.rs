use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, TcpListener};
use std::thread;
use std::time::{Duration, Instant};
use utilstat::metrics::{ByteCounters, CounterSource, CpuSource};
use utilstat::wire::{read_message, UTIL_STAT_CMD};
use utilstat::{Agent, Reporter, RolloverPolicy, SampleError, Sampler};

struct FixedCpu(Vec<f64>);

impl CpuSource for FixedCpu {
    fn measure(&mut self, window: Duration) -> Result<Vec<f64>, SampleError> {
        thread::sleep(window);
        Ok(self.0.clone())
    }
}

struct ScriptedCounters(VecDeque<ByteCounters>);

impl CounterSource for ScriptedCounters {
    fn read(&mut self) -> Result<ByteCounters, SampleError> {
        self.0
            .pop_front()
            .ok_or_else(|| SampleError::InterfaceNotFound("scripted".into()))
    }
}

fn counters(rx_bytes: u64, tx_bytes: u64) -> ByteCounters {
    ByteCounters { rx_bytes, tx_bytes }
}

fn sampler(
    readings: Vec<ByteCounters>,
    policy: RolloverPolicy,
) -> Sampler<FixedCpu, ScriptedCounters> {
    Sampler::new(
        FixedCpu(vec![10.4, 55.9, 99.99]),
        ScriptedCounters(readings.into()),
        Duration::from_millis(5),
        policy,
    )
}

#[test]
fn controller_receives_one_record_per_report() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let controller = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        (0..2)
            .map(|_| read_message(&mut stream).unwrap())
            .collect::<Vec<_>>()
    });

    let node_ip = Ipv4Addr::new(192, 168, 1, 1);
    let reporter = Reporter::connect("127.0.0.1", port, node_ip, 50030).unwrap();
    let readings = vec![counters(0, 0), counters(1000, 0), counters(2000, 0)];
    let mut agent = Agent::new(
        sampler(readings, RolloverPolicy::Clamp),
        reporter,
        Duration::from_millis(20),
    )
    .unwrap();

    let started = Instant::now();
    agent.run(Some(2)).unwrap();
    // Second report waits out the first interval
    assert!(started.elapsed() >= Duration::from_millis(20));
    assert_eq!(agent.reporter().sent(), 2);

    let received = controller.join().unwrap();
    assert_eq!(received.len(), 2);
    for msg in &received {
        assert_eq!(msg.cmd, UTIL_STAT_CMD);
        assert_eq!(msg.node_ip.to_be_bytes(), [192, 168, 1, 1]);
        assert_eq!(msg.port, 50030);
        assert_eq!(msg.cpu_util, vec![10, 55, 99]);
        assert_eq!(msg.tx_mbps, 0);
        assert!(msg.rx_mbps >= 0);
        assert_eq!(msg.encoded_len(), 46);
    }
    assert!(received[1].ticket >= received[0].ticket);
}

#[test]
fn rollback_never_reports_positive_throughput() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let controller = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_message(&mut stream).unwrap()
    });

    let reporter =
        Reporter::connect("127.0.0.1", port, Ipv4Addr::new(10, 0, 0, 1), 50030).unwrap();
    let readings = vec![counters(5000, 0), counters(2000, 0)];
    let mut agent = Agent::new(
        sampler(readings, RolloverPolicy::Clamp),
        reporter,
        Duration::from_millis(1),
    )
    .unwrap();
    agent.run(Some(1)).unwrap();

    assert_eq!(controller.join().unwrap().rx_mbps, 0);
}

#[test]
fn rejected_rollback_stops_the_loop_before_sending() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let reporter =
        Reporter::connect("127.0.0.1", port, Ipv4Addr::new(10, 0, 0, 1), 50030).unwrap();
    let readings = vec![counters(5000, 0), counters(2000, 0)];
    let mut agent = Agent::new(
        sampler(readings, RolloverPolicy::Reject),
        reporter,
        Duration::from_millis(1),
    )
    .unwrap();

    let err = agent.run(None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SampleError>(),
        Some(SampleError::CounterRollback {
            previous: 5000,
            current: 2000,
            ..
        })
    ));
    assert_eq!(agent.reporter().sent(), 0);
}

#[test]
fn closed_controller_ends_the_loop_with_the_write_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let reporter =
        Reporter::connect("127.0.0.1", port, Ipv4Addr::new(10, 0, 0, 1), 50030).unwrap();
    let (accepted, _) = listener.accept().unwrap();
    drop(accepted);
    drop(listener);

    // Far more readings than the loop should ever consume
    let readings = (0..1000).map(|i| counters(i * 100, 0)).collect();
    let mut agent = Agent::new(
        sampler(readings, RolloverPolicy::Clamp),
        reporter,
        Duration::from_millis(1),
    )
    .unwrap();

    let err = agent.run(None).unwrap_err();
    let io_err = err
        .downcast_ref::<io::Error>()
        .unwrap_or_else(|| panic!("expected a write error, got: {err:#}"));
    assert!(
        matches!(
            io_err.kind(),
            io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
        ),
        "unexpected error kind: {io_err}"
    );
    assert!(agent.reporter().sent() < 10);
}

#[test]
fn zero_count_sends_nothing() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let reporter =
        Reporter::connect("127.0.0.1", port, Ipv4Addr::new(10, 0, 0, 1), 50030).unwrap();
    let readings = vec![counters(0, 0), counters(100, 0)];
    let mut agent = Agent::new(
        sampler(readings, RolloverPolicy::Clamp),
        reporter,
        Duration::from_millis(1),
    )
    .unwrap();

    agent.run(Some(0)).unwrap();
    assert_eq!(agent.reporter().sent(), 0);
}
