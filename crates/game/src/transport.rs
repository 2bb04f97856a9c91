use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};
use thiserror::Error;

pub const MAX_PACKET_SIZE: usize = 65_000;
const UDP_PEER_TIMEOUT: Duration = Duration::from_secs(15);

/// Opaque handle for one remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

/// Connection events and packets, delivered through a polled FIFO queue
/// that the simulation thread drains during input processing.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected(PeerId),
    Disconnected(PeerId),
    Packet(PeerId, Vec<u8>),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("unknown peer {0:?}")]
    UnknownPeer(PeerId),
    #[error("packet of {0} bytes exceeds maximum size")]
    Oversized(usize),
    #[error("transport is not open")]
    NotOpen,
}

/// Raw traffic counters for one endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// The unreliable-ordered datagram layer the simulation talks through.
/// Packets may be lost; ordering holds per channel; no per-packet
/// reliability is promised, because fresh snapshots supersede stale ones.
pub trait Transport {
    fn start_server(&mut self, port: u16) -> Result<(), TransportError>;
    fn start_client(&mut self, host: &str, port: u16) -> Result<(), TransportError>;
    fn shutdown(&mut self);
    fn send(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), TransportError>;
    fn poll_event(&mut self) -> Option<TransportEvent>;
}

/// Non-blocking UDP transport. Peers are identified by source address;
/// the first datagram from an unknown address raises `Connected`, and a
/// peer that goes silent past the timeout raises `Disconnected`.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    peers: HashMap<SocketAddr, PeerId>,
    addrs: HashMap<PeerId, SocketAddr>,
    last_seen: HashMap<PeerId, Instant>,
    next_peer: u64,
    events: VecDeque<TransportEvent>,
    recv_buf: Box<[u8; MAX_PACKET_SIZE]>,
    server_mode: bool,
    stats: TransportStats,
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UdpTransport {
    pub fn new() -> Self {
        Self {
            socket: None,
            peers: HashMap::new(),
            addrs: HashMap::new(),
            last_seen: HashMap::new(),
            next_peer: 1,
            events: VecDeque::new(),
            recv_buf: Box::new([0u8; MAX_PACKET_SIZE]),
            server_mode: false,
            stats: TransportStats::default(),
        }
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    fn bind<A: ToSocketAddrs>(addr: A) -> Result<UdpSocket, TransportError> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        Ok(socket)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn peer_for(&mut self, addr: SocketAddr) -> PeerId {
        if let Some(&peer) = self.peers.get(&addr) {
            return peer;
        }
        let peer = PeerId(self.next_peer);
        self.next_peer += 1;
        self.peers.insert(addr, peer);
        self.addrs.insert(peer, addr);
        self.events.push_back(TransportEvent::Connected(peer));
        debug!("new peer {:?} at {}", peer, addr);
        peer
    }

    fn drop_peer(&mut self, peer: PeerId) {
        if let Some(addr) = self.addrs.remove(&peer) {
            self.peers.remove(&addr);
        }
        self.last_seen.remove(&peer);
        self.events.push_back(TransportEvent::Disconnected(peer));
    }

    fn pump(&mut self) {
        if self.socket.is_none() {
            return;
        }
        loop {
            let received = match self.socket.as_ref() {
                Some(socket) => socket.recv_from(&mut self.recv_buf[..]),
                None => return,
            };
            match received {
                Ok((size, addr)) => {
                    let bytes = self.recv_buf[..size].to_vec();
                    let peer = self.peer_for(addr);
                    self.last_seen.insert(peer, Instant::now());
                    self.stats.packets_received += 1;
                    self.stats.bytes_received += size as u64;
                    self.events.push_back(TransportEvent::Packet(peer, bytes));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("udp receive error: {}", e);
                    break;
                }
            }
        }

        // Server mode sweeps idle peers; a client keeps its one peer and
        // leaves timeout policy to the connection monitor.
        if self.server_mode {
            let now = Instant::now();
            let idle: Vec<PeerId> = self
                .last_seen
                .iter()
                .filter(|(_, seen)| now.duration_since(**seen) > UDP_PEER_TIMEOUT)
                .map(|(&peer, _)| peer)
                .collect();
            for peer in idle {
                debug!("peer {:?} timed out", peer);
                self.drop_peer(peer);
            }
        }
    }
}

impl Transport for UdpTransport {
    fn start_server(&mut self, port: u16) -> Result<(), TransportError> {
        self.socket = Some(Self::bind(("0.0.0.0", port))?);
        self.server_mode = true;
        Ok(())
    }

    fn start_client(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        let socket = Self::bind(("0.0.0.0", 0))?;
        socket.connect((host, port))?;
        let server_addr = socket.peer_addr()?;
        self.socket = Some(socket);
        self.server_mode = false;
        // The server is peer 1 from the client's point of view, live
        // immediately so the facade can send its first packet.
        let peer = self.peer_for(server_addr);
        self.last_seen.insert(peer, Instant::now());
        Ok(())
    }

    fn shutdown(&mut self) {
        self.socket = None;
        let peers: Vec<PeerId> = self.addrs.keys().copied().collect();
        for peer in peers {
            self.drop_peer(peer);
        }
    }

    fn send(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), TransportError> {
        if bytes.len() > MAX_PACKET_SIZE {
            return Err(TransportError::Oversized(bytes.len()));
        }
        let socket = self.socket.as_ref().ok_or(TransportError::NotOpen)?;
        let addr = *self.addrs.get(&peer).ok_or(TransportError::UnknownPeer(peer))?;
        let sent = socket.send_to(bytes, addr)?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += sent as u64;
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        if self.events.is_empty() {
            self.pump();
        }
        self.events.pop_front()
    }
}

#[derive(Debug, Default)]
struct MemoryHub {
    /// Queued events per endpoint; endpoint 0 is the server.
    inboxes: HashMap<u64, VecDeque<TransportEvent>>,
    next_peer: u64,
}

/// Loopback transport over shared in-memory queues, for tests and the
/// single-process embedding. A connected pair shares one hub; sends from
/// either side land in the other's FIFO.
#[derive(Clone)]
pub struct MemoryTransport {
    hub: Arc<Mutex<MemoryHub>>,
    endpoint: Option<u64>,
    open: bool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            hub: Arc::new(Mutex::new(MemoryHub {
                inboxes: HashMap::new(),
                next_peer: 1,
            })),
            endpoint: None,
            open: false,
        }
    }

    /// A client endpoint attached to the same hub as this server.
    pub fn client_endpoint(&self) -> MemoryTransport {
        MemoryTransport {
            hub: Arc::clone(&self.hub),
            endpoint: None,
            open: false,
        }
    }
}

impl Transport for MemoryTransport {
    fn start_server(&mut self, _port: u16) -> Result<(), TransportError> {
        let mut hub = self.hub.lock().unwrap_or_else(|e| e.into_inner());
        hub.inboxes.entry(0).or_default();
        self.endpoint = Some(0);
        self.open = true;
        Ok(())
    }

    fn start_client(&mut self, _host: &str, _port: u16) -> Result<(), TransportError> {
        let mut hub = self.hub.lock().unwrap_or_else(|e| e.into_inner());
        let id = hub.next_peer;
        hub.next_peer += 1;
        hub.inboxes.entry(id).or_default();
        // The server learns of the new peer; the client sees the server
        // as its single peer.
        hub.inboxes
            .entry(0)
            .or_default()
            .push_back(TransportEvent::Connected(PeerId(id)));
        if let Some(inbox) = hub.inboxes.get_mut(&id) {
            inbox.push_back(TransportEvent::Connected(PeerId(0)));
        }
        self.endpoint = Some(id);
        self.open = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(endpoint) = self.endpoint {
            let mut hub = self.hub.lock().unwrap_or_else(|e| e.into_inner());
            if endpoint != 0 {
                hub.inboxes
                    .entry(0)
                    .or_default()
                    .push_back(TransportEvent::Disconnected(PeerId(endpoint)));
            }
            hub.inboxes.remove(&endpoint);
        }
        self.open = false;
        self.endpoint = None;
    }

    fn send(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let from = self.endpoint.ok_or(TransportError::NotOpen)?;
        let mut hub = self.hub.lock().unwrap_or_else(|e| e.into_inner());
        let inbox = hub
            .inboxes
            .get_mut(&peer.0)
            .ok_or(TransportError::UnknownPeer(peer))?;
        inbox.push_back(TransportEvent::Packet(PeerId(from), bytes.to_vec()));
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        let endpoint = self.endpoint?;
        let mut hub = self.hub.lock().unwrap_or_else(|e| e.into_inner());
        hub.inboxes.get_mut(&endpoint)?.pop_front()
    }
}
