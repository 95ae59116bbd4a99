//! ICMP/UDP ping probe.
//!
//! The privileged/unprivileged split is hidden behind the [`Pinger`] trait,
//! a testing seam rather than a polymorphism requirement. Production code
//! uses [`SystemPinger`]; tests inject fakes with canned statistics.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::model::{CheckOutcome, CheckResult, Monitor, MonitorSpec, PingResult};

use super::{down_result, up_result};

const DEFAULT_COUNT: u16 = 3;
const ECHO_REQUEST: u8 = 8;
const ECHO_REPLY: u8 = 0;

#[derive(Debug, Clone, Default)]
pub struct PingStatistics {
    pub sent: u16,
    pub rtts: Vec<Option<Duration>>,
}

impl PingStatistics {
    pub fn received(&self) -> u16 {
        self.rtts.iter().filter(|r| r.is_some()).count() as u16
    }

    pub fn loss_pct(&self) -> f64 {
        if self.sent == 0 {
            return 100.0;
        }
        100.0 * (1.0 - self.received() as f64 / self.sent as f64)
    }

    pub fn min(&self) -> Option<Duration> {
        self.rtts.iter().flatten().min().copied()
    }

    pub fn max(&self) -> Option<Duration> {
        self.rtts.iter().flatten().max().copied()
    }

    pub fn avg(&self) -> Option<Duration> {
        let received: Vec<Duration> = self.rtts.iter().flatten().copied().collect();
        if received.is_empty() {
            return None;
        }
        let total: Duration = received.iter().sum();
        Some(total / received.len() as u32)
    }
}

#[async_trait]
pub trait Pinger: Send {
    fn set_count(&mut self, count: u16);
    fn set_timeout(&mut self, timeout: Duration);
    fn set_privileged(&mut self, privileged: bool);
    async fn run(&mut self, target: IpAddr) -> Result<(), String>;
    fn privileged(&self) -> bool;
    fn statistics(&self) -> PingStatistics;
}

/// Real pinger: tries a privileged raw-socket ICMP echo first, falling back
/// to an unprivileged `SOCK_DGRAM` ICMP exchange on permission failure.
pub struct SystemPinger {
    count: u16,
    timeout: Duration,
    privileged: bool,
    stats: PingStatistics,
}

impl SystemPinger {
    pub fn new() -> Self {
        Self {
            count: DEFAULT_COUNT,
            timeout: Duration::from_secs(2),
            privileged: true,
            stats: PingStatistics::default(),
        }
    }
}

impl Default for SystemPinger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pinger for SystemPinger {
    fn set_count(&mut self, count: u16) {
        self.count = count;
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn set_privileged(&mut self, privileged: bool) {
        self.privileged = privileged;
    }

    /// Runs one attempt in the pinger's current mode. On a privileged
    /// failure it downgrades `self.privileged` to `false` before returning
    /// `Err`, so the caller's retry lands in unprivileged mode.
    async fn run(&mut self, target: IpAddr) -> Result<(), String> {
        if self.privileged {
            match ping_privileged(target, self.count, self.timeout).await {
                Ok(stats) => {
                    self.stats = stats;
                    Ok(())
                }
                Err(err) => {
                    self.privileged = false;
                    Err(err)
                }
            }
        } else {
            let stats = ping_unprivileged(target, self.count, self.timeout).await?;
            self.stats = stats;
            Ok(())
        }
    }

    fn privileged(&self) -> bool {
        self.privileged
    }

    fn statistics(&self) -> PingStatistics {
        self.stats.clone()
    }
}

async fn ping_privileged(target: IpAddr, count: u16, timeout: Duration) -> Result<PingStatistics, String> {
    let client = surge_ping::Client::new(&surge_ping::Config::default())
        .map_err(|e| format!("raw socket unavailable: {e}"))?;
    let mut pinger = client
        .pinger(target, surge_ping::PingIdentifier(std::process::id() as u16))
        .await;
    pinger.timeout(timeout);

    let mut stats = PingStatistics {
        sent: count,
        rtts: Vec::with_capacity(count as usize),
    };
    let payload = [0u8; 56];
    for seq in 0..count {
        let rtt = match pinger.ping(surge_ping::PingSequence(seq), &payload).await {
            Ok((_, duration)) => Some(duration),
            Err(_) => None,
        };
        stats.rtts.push(rtt);
    }
    Ok(stats)
}

async fn ping_unprivileged(target: IpAddr, count: u16, timeout: Duration) -> Result<PingStatistics, String> {
    let target = match target {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => return Err("unprivileged ICMPv6 ping not supported".to_string()),
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(SockProtocol::ICMPV4))
        .map_err(|e| format!("failed to open unprivileged icmp socket: {e}"))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| format!("failed to configure socket: {e}"))?;
    let std_socket: std::net::UdpSocket = socket.into();
    let udp = UdpSocket::from_std(std_socket).map_err(|e| format!("failed to bind socket: {e}"))?;

    let identifier = (std::process::id() & 0xffff) as u16;
    let mut stats = PingStatistics {
        sent: count,
        rtts: Vec::with_capacity(count as usize),
    };

    for seq in 0..count {
        let request = build_echo_request(identifier, seq, &[0u8; 32]);
        let addr = SocketAddr::new(IpAddr::V4(target), 0);
        let started = Instant::now();
        let rtt = match udp.send_to(&request, addr).await {
            Ok(_) => {
                let mut buf = [0u8; 512];
                match tokio::time::timeout(timeout, udp.recv_from(&mut buf)).await {
                    Ok(Ok((n, _))) if matches_reply(&buf[..n], identifier, seq) => Some(started.elapsed()),
                    _ => None,
                }
            }
            Err(_) => None,
        };
        stats.rtts.push(rtt);
    }

    Ok(stats)
}

fn build_echo_request(identifier: u16, sequence: u16, payload: &[u8]) -> Vec<u8> {
    let mut packet = vec![0u8; 8 + payload.len()];
    packet[0] = ECHO_REQUEST;
    packet[1] = 0;
    packet[4..6].copy_from_slice(&identifier.to_be_bytes());
    packet[6..8].copy_from_slice(&sequence.to_be_bytes());
    packet[8..].copy_from_slice(payload);

    let checksum = internet_checksum(&packet);
    packet[2..4].copy_from_slice(&checksum.to_be_bytes());
    packet
}

fn matches_reply(buf: &[u8], identifier: u16, sequence: u16) -> bool {
    if buf.len() < 8 || buf[0] != ECHO_REPLY {
        return false;
    }
    let reply_id = u16::from_be_bytes([buf[4], buf[5]]);
    let reply_seq = u16::from_be_bytes([buf[6], buf[7]]);
    reply_id == identifier && reply_seq == sequence
}

fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

pub async fn check(monitor: &Monitor) -> CheckResult {
    check_with(monitor, &mut SystemPinger::new()).await
}

/// Entry point used by both production dispatch and tests; the pinger is
/// injected so tests can supply canned loss/RTT statistics without sending
/// real packets.
pub async fn check_with(monitor: &Monitor, pinger: &mut dyn Pinger) -> CheckResult {
    let MonitorSpec::Ping { target, count } = &monitor.spec else {
        unreachable!("dispatch guarantees Ping variant")
    };

    let started_at = Utc::now();
    let start = Instant::now();

    let ip = match resolve(target).await {
        Ok(ip) => ip,
        Err(err) => return down_result(monitor, started_at, start.elapsed(), err, None),
    };

    let effective_count = if *count == 0 { DEFAULT_COUNT } else { (*count).min(100) };
    pinger.set_count(effective_count);
    pinger.set_timeout(monitor.timeout);
    pinger.set_privileged(true);

    // One attempt in privileged mode, one retry in unprivileged mode if the
    // first fails.
    let mut last_err = match pinger.run(ip).await {
        Ok(()) => None,
        Err(err) => Some(err),
    };
    if last_err.is_some() && !pinger.privileged() {
        last_err = match pinger.run(ip).await {
            Ok(()) => None,
            Err(err) => Some(err),
        };
    }
    if let Some(err) = last_err {
        return down_result(monitor, started_at, start.elapsed(), err, None);
    }

    let stats = pinger.statistics();
    let duration = start.elapsed();
    let loss = stats.loss_pct();

    let ping_result = PingResult {
        packets_sent: stats.sent,
        packets_received: stats.received(),
        packet_loss_pct: loss,
        min_rtt: stats.min(),
        max_rtt: stats.max(),
        avg_rtt: stats.avg(),
    };

    if loss >= 100.0 {
        down_result(
            monitor,
            started_at,
            duration,
            "100% packet loss",
            Some(CheckOutcome::Ping(ping_result)),
        )
    } else if loss >= 50.0 {
        down_result(
            monitor,
            started_at,
            duration,
            format!("high packet loss: {loss}%"),
            Some(CheckOutcome::Ping(ping_result)),
        )
    } else {
        up_result(monitor, started_at, duration, CheckOutcome::Ping(ping_result))
    }
}

async fn resolve(target: &str) -> Result<IpAddr, String> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut addrs = tokio::net::lookup_host((target, 0))
        .await
        .map_err(|e| format!("failed to resolve '{target}': {e}"))?
        .map(|addr| addr.ip())
        .collect::<Vec<_>>();
    addrs.sort_by_key(|ip| !ip.is_ipv4());
    addrs
        .into_iter()
        .next()
        .ok_or_else(|| format!("no addresses found for '{target}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn monitor(target: &str, count: u16) -> Monitor {
        Monitor {
            name: "test".to_string(),
            group: "default".to_string(),
            enabled: true,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(2),
            ssl_warning_days: 14,
            labels: HashMap::new(),
            spec: MonitorSpec::Ping {
                target: target.to_string(),
                count,
            },
        }
    }

    struct FakePinger {
        privileged: bool,
        fail_privileged: bool,
        stats: PingStatistics,
        run_count: AtomicUsize,
    }

    #[async_trait]
    impl Pinger for FakePinger {
        fn set_count(&mut self, _count: u16) {}
        fn set_timeout(&mut self, _timeout: Duration) {}
        fn set_privileged(&mut self, privileged: bool) {
            self.privileged = privileged;
        }
        async fn run(&mut self, _target: IpAddr) -> Result<(), String> {
            self.run_count.fetch_add(1, Ordering::SeqCst);
            if self.privileged && self.fail_privileged {
                self.privileged = false;
                return Err("icmp not permitted".to_string());
            }
            Ok(())
        }
        fn privileged(&self) -> bool {
            self.privileged
        }
        fn statistics(&self) -> PingStatistics {
            self.stats.clone()
        }
    }

    #[tokio::test]
    async fn high_loss_reports_down_with_percentage() {
        let mut pinger = FakePinger {
            privileged: true,
            fail_privileged: false,
            stats: PingStatistics {
                sent: 4,
                rtts: vec![Some(Duration::from_millis(10)), None, None, None],
            },
            run_count: AtomicUsize::new(0),
        };
        let result = check_with(&monitor("127.0.0.1", 4), &mut pinger).await;
        assert_eq!(result.status, crate::model::Status::Down);
        assert!(result.error.as_deref().unwrap().contains("75"));
    }

    #[tokio::test]
    async fn falls_back_to_unprivileged_on_permission_failure() {
        let mut pinger = FakePinger {
            privileged: true,
            fail_privileged: true,
            stats: PingStatistics {
                sent: 3,
                rtts: vec![Some(Duration::from_millis(5)); 3],
            },
            run_count: AtomicUsize::new(0),
        };
        let result = check_with(&monitor("127.0.0.1", 3), &mut pinger).await;
        assert_eq!(result.status, crate::model::Status::Up);
        assert_eq!(pinger.run_count.load(Ordering::SeqCst), 2);
        assert!(!pinger.privileged());
    }
}
