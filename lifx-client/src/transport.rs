//! UDP transport: sends frames and matches replies to the requests that caused them.
//!
//! Every request that waits for a reply gets its own random `source` identifier, which devices
//! echo back.  A single background task reads the socket and hands each decoded reply to the
//! waiter registered under its `source`.  Datagrams nobody is waiting for go to the device
//! registry instead.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use get_if_addrs::{IfAddr, Ifv4Addr};
use lifx_core::{BuildOptions, Message, RawMessage};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::manager::Manager;

/// Source identifier used for discovery broadcasts.  It is never handed to a request, so the
/// announcements that answer a broadcast always reach the registry.
pub(crate) const DISCOVERY_SOURCE: u32 = 0x4c49_4658;

const MAX_DATAGRAM: usize = 2048;

type Waiter = oneshot::Sender<std::result::Result<Reply, lifx_core::Error>>;
type PendingMap = Arc<Mutex<HashMap<u32, Waiter>>>;

/// What a request waits for before it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Sets `ack_required`; completes on the device's [Message::Acknowledgement].
    Ack,
    /// Sets `res_required`; completes on the device's state message.
    Response,
}

/// A decoded reply, as matched to its request.
#[derive(Debug, Clone)]
pub struct Reply {
    pub addr: SocketAddr,
    pub target: u64,
    pub source: u32,
    pub sequence: u8,
    pub message: Message,
}

/// Removes a pending entry when the request finishes, fails, or is dropped mid-flight.
struct PendingGuard<'a> {
    source: u32,
    pending: &'a PendingMap,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.source);
    }
}

pub(crate) struct Transport {
    socket: Arc<UdpSocket>,
    pending: PendingMap,
    sequence: AtomicU8,
    timeout: Duration,
    receiver: JoinHandle<()>,
}

impl Transport {
    pub(crate) async fn bind(
        addr: SocketAddr,
        timeout: Duration,
        manager: Arc<Manager>,
    ) -> Result<Transport> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| Error::socket("bind", e))?;
        socket
            .set_broadcast(true)
            .map_err(|e| Error::socket("set_broadcast", e))?;
        let socket = Arc::new(socket);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let receiver = tokio::spawn(receive_loop(
            Arc::clone(&socket),
            Arc::clone(&pending),
            manager,
        ));

        Ok(Transport {
            socket,
            pending,
            sequence: AtomicU8::new(rand::random()),
            timeout,
            receiver,
        })
    }

    pub(crate) fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| Error::socket("local_addr", e))
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn next_sequence(&self) -> u8 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Picks an unused source identifier and registers `waiter` under it.
    fn register(&self, waiter: Waiter) -> u32 {
        let mut pending = self.pending.lock();
        loop {
            let source: u32 = rand::random();
            if source == 0 || source == DISCOVERY_SOURCE || pending.contains_key(&source) {
                continue;
            }
            pending.insert(source, waiter);
            return source;
        }
    }

    async fn send(&self, addr: SocketAddr, options: &BuildOptions, message: Message) -> Result<()> {
        let typ = message.get_num();
        let bytes = RawMessage::build(options, message)?.pack()?;
        debug!(
            typ,
            %addr,
            source = options.source,
            sequence = options.sequence,
            "sending {} bytes",
            bytes.len()
        );
        self.socket
            .send_to(&bytes, addr)
            .await
            .map_err(|e| Error::socket("send_to", e))?;
        Ok(())
    }

    /// Sends a message with neither an acknowledgement nor a response requested.
    pub(crate) async fn fire(&self, addr: SocketAddr, target: Option<u64>, message: Message) -> Result<()> {
        let options = BuildOptions {
            target,
            sequence: self.next_sequence(),
            source: DISCOVERY_SOURCE,
            ..Default::default()
        };
        self.send(addr, &options, message).await
    }

    /// Sends a message and waits for the reply selected by `expect`.
    ///
    /// Fails with [Error::Timeout] if nothing arrives in time, and with [Error::Closed] without
    /// sending anything once the receive task has stopped.  However the request ends, its
    /// pending entry is gone afterwards.
    pub(crate) async fn request(
        &self,
        addr: SocketAddr,
        target: Option<u64>,
        message: Message,
        expect: Expect,
    ) -> Result<Reply> {
        if self.receiver.is_finished() {
            return Err(Error::Closed);
        }
        let typ = message.get_num();
        let (tx, rx) = oneshot::channel();
        let source = self.register(tx);
        let _guard = PendingGuard {
            source,
            pending: &self.pending,
        };

        let options = BuildOptions {
            target,
            ack_required: expect == Expect::Ack,
            res_required: expect == Expect::Response,
            sequence: self.next_sequence(),
            source,
        };
        self.send(addr, &options, message).await?;

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply?),
            Ok(Err(_)) => Err(Error::Closed),
            Err(_) => {
                debug!(typ, %addr, source, "request timed out");
                Err(Error::Timeout {
                    typ,
                    addr,
                    timeout: self.timeout,
                })
            }
        }
    }

    /// Sends the same message, untargeted, to every address in `targets`.
    ///
    /// Only fails if every send failed.
    pub(crate) async fn broadcast(&self, targets: &[SocketAddr], message: Message) -> Result<()> {
        let options = BuildOptions {
            source: DISCOVERY_SOURCE,
            sequence: self.next_sequence(),
            ..Default::default()
        };
        let bytes = RawMessage::build(&options, message)?.pack()?;

        let mut last_err = None;
        let mut sent = 0;
        for addr in targets {
            match self.socket.send_to(&bytes, addr).await {
                Ok(_) => {
                    trace!(%addr, "broadcast sent");
                    sent += 1;
                }
                Err(e) => {
                    warn!(%addr, error = %e, "broadcast failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if sent == 0 => Err(Error::socket("broadcast", e)),
            _ => Ok(()),
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

/// Reads datagrams off the socket until it fails.
async fn receive_loop(socket: Arc<UdpSocket>, pending: PendingMap, manager: Arc<Manager>) {
    let mut buf = [0; MAX_DATAGRAM];
    loop {
        let (amt, addr) = match socket.recv_from(&mut buf).await {
            Ok(x) => x,
            // an ICMP "port unreachable" for an earlier send, on some platforms
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
                ) =>
            {
                debug!(error = %e, "ignoring receive error");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "receive failed, stopping");
                break;
            }
        };

        let raw = match RawMessage::unpack(&buf[..amt]) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(%addr, error = %e, "dropping undecodable datagram");
                continue;
            }
        };
        trace!(%addr, typ = raw.protocol_header.typ, source = raw.frame.source, "received");

        let decoded = Message::from_raw(&raw);
        let waiter = pending.lock().remove(&raw.frame.source);
        match (waiter, decoded) {
            (Some(waiter), decoded) => {
                let reply = decoded.map(|message| Reply {
                    addr,
                    target: raw.frame_addr.target,
                    source: raw.frame.source,
                    sequence: raw.frame_addr.sequence,
                    message,
                });
                // the requester may have given up in the meantime
                let _ = waiter.send(reply);
            }
            (None, Ok(message)) => manager.observe(&raw, message, addr),
            (None, Err(e)) => {
                debug!(%addr, error = %e, "dropping undecodable message");
            }
        }
    }

    // wake everybody up; they'll see the channel closed
    pending.lock().clear();
}

/// The addresses a discovery broadcast is sent to.
pub(crate) fn broadcast_targets(configured: &[Ipv4Addr], port: u16) -> Vec<SocketAddr> {
    let mut addrs: Vec<Ipv4Addr> = configured.to_vec();
    if addrs.is_empty() {
        match get_if_addrs::get_if_addrs() {
            Ok(ifaces) => {
                for iface in ifaces {
                    if iface.is_loopback() {
                        continue;
                    }
                    if let IfAddr::V4(Ifv4Addr {
                        broadcast: Some(bcast),
                        ..
                    }) = iface.addr
                    {
                        addrs.push(bcast);
                    }
                }
            }
            Err(e) => warn!(error = %e, "unable to list network interfaces"),
        }
    }
    if addrs.is_empty() {
        addrs.push(Ipv4Addr::BROADCAST);
    }
    addrs.sort();
    addrs.dedup();
    addrs
        .into_iter()
        .map(|ip| SocketAddr::new(IpAddr::V4(ip), port))
        .collect()
}
