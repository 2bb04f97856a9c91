use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

const MAX_PING_HISTORY: usize = 30;
const MAX_TRACKED_PACKETS: usize = 100;

/// Coarse connection quality, for UI indicators and stability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Quality {
    Disconnected,
    Terrible,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Quality::Excellent => "excellent",
            Quality::Good => "good",
            Quality::Fair => "fair",
            Quality::Poor => "poor",
            Quality::Terrible => "terrible",
            Quality::Disconnected => "disconnected",
        };
        f.write_str(text)
    }
}

/// Tracks ping, jitter and packet loss for one connection and classifies
/// the result. Silence past the timeout reads as disconnected; the
/// facade escalates that to an actual disconnect.
#[derive(Debug)]
pub struct ConnectionMonitor {
    current_ping: u32,
    ping_history: VecDeque<u32>,
    jitter: u32,

    packets_sent: u64,
    packets_received: u64,
    sent_ids: VecDeque<u64>,

    quality: Quality,
    last_packet_at_ms: Option<u64>,
    timeout_ms: u64,
    epoch: Instant,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self {
            current_ping: 0,
            ping_history: VecDeque::with_capacity(MAX_PING_HISTORY),
            jitter: 0,
            packets_sent: 0,
            packets_received: 0,
            sent_ids: VecDeque::with_capacity(MAX_TRACKED_PACKETS),
            quality: Quality::Disconnected,
            last_packet_at_ms: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn set_timeout_ms(&mut self, timeout: u64) {
        self.timeout_ms = timeout;
    }

    pub fn record_ping(&mut self, ping_ms: u32) {
        let now = self.now_ms();
        self.record_ping_at(ping_ms, now);
    }

    pub fn record_ping_at(&mut self, ping_ms: u32, now_ms: u64) {
        self.current_ping = ping_ms;
        self.ping_history.push_back(ping_ms);
        while self.ping_history.len() > MAX_PING_HISTORY {
            self.ping_history.pop_front();
        }
        self.update_jitter();
        self.last_packet_at_ms = Some(now_ms);
        self.classify(now_ms);
    }

    pub fn record_packet_sent(&mut self, packet_id: u64) {
        self.packets_sent += 1;
        self.sent_ids.push_back(packet_id);
        while self.sent_ids.len() > MAX_TRACKED_PACKETS {
            self.sent_ids.pop_front();
        }
    }

    pub fn record_packet_received(&mut self, _packet_id: u64) {
        let now = self.now_ms();
        self.record_packet_received_at(_packet_id, now);
    }

    pub fn record_packet_received_at(&mut self, _packet_id: u64, now_ms: u64) {
        self.packets_received += 1;
        self.last_packet_at_ms = Some(now_ms);
    }

    /// Re-classify against the current clock; call once per frame.
    pub fn update(&mut self) {
        let now = self.now_ms();
        self.update_at(now);
    }

    pub fn update_at(&mut self, now_ms: u64) {
        self.classify(now_ms);
    }

    pub fn ping(&self) -> u32 {
        self.current_ping
    }

    pub fn average_ping(&self) -> u32 {
        if self.ping_history.is_empty() {
            return 0;
        }
        let sum: u64 = self.ping_history.iter().map(|&p| p as u64).sum();
        (sum / self.ping_history.len() as u64) as u32
    }

    pub fn jitter(&self) -> u32 {
        self.jitter
    }

    /// Loss over the whole session, percent.
    pub fn packet_loss(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        let lost = self.packets_sent.saturating_sub(self.packets_received);
        lost as f64 / self.packets_sent as f64 * 100.0
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn is_stable(&self) -> bool {
        self.quality >= Quality::Fair && self.jitter <= 50 && self.packet_loss() <= 5.0
    }

    pub fn is_timed_out(&self) -> bool {
        self.is_timed_out_at(self.now_ms())
    }

    pub fn is_timed_out_at(&self, now_ms: u64) -> bool {
        match self.last_packet_at_ms {
            Some(last) => now_ms.saturating_sub(last) > self.timeout_ms,
            None => false,
        }
    }

    pub fn time_since_last_packet_ms(&self) -> u64 {
        match self.last_packet_at_ms {
            Some(last) => self.now_ms().saturating_sub(last),
            None => 0,
        }
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    fn update_jitter(&mut self) {
        if self.ping_history.len() < 2 {
            self.jitter = 0;
            return;
        }
        let mean = self.average_ping() as f64;
        let variance: f64 = self
            .ping_history
            .iter()
            .map(|&p| {
                let diff = p as f64 - mean;
                diff * diff
            })
            .sum::<f64>()
            / self.ping_history.len() as f64;
        self.jitter = variance.sqrt() as u32;
    }

    fn classify(&mut self, now_ms: u64) {
        if self.last_packet_at_ms.is_none() || self.is_timed_out_at(now_ms) {
            self.quality = Quality::Disconnected;
            return;
        }

        let ping = self.average_ping();
        let loss = self.packet_loss();

        self.quality = if ping < 50 && loss < 1.0 {
            Quality::Excellent
        } else if ping < 100 && loss < 3.0 {
            Quality::Good
        } else if ping < 200 && loss < 10.0 {
            Quality::Fair
        } else if ping < 500 && loss < 25.0 {
            Quality::Poor
        } else {
            Quality::Terrible
        };
    }
}
