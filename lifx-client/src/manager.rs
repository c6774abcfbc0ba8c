use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use lifx_core::{Message, RawMessage, Service};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// A LIFX device that has announced itself on the network.
///
/// Note that the data stored in this struct is not "live".  It's a copy of what the registry knew
/// when it was handed out.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    target: u64,
    addr: SocketAddr,
    service: Service,
    port: u32,
    last_seen: DateTime<Utc>,
}

impl Device {
    /// Describes a device whose address is already known, without going through discovery.
    pub fn new(target: u64, addr: SocketAddr) -> Device {
        Device {
            target,
            addr,
            service: Service::Udp,
            port: addr.port() as u32,
            last_seen: Utc::now(),
        }
    }

    /// The device's hardware address, as used in the `target` field of a frame.
    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn service(&self) -> Service {
        self.service
    }

    /// The port as announced.  Zero means the service is temporarily unavailable.
    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    /// The hardware address formatted as a MAC address, e.g. `d0:73:d5:02:97:de`.
    pub fn mac(&self) -> String {
        self.target.to_le_bytes()[..6]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Keeps track of every device that has announced itself.
///
/// Datagrams that don't answer a pending request are passed to [Manager::observe].  The first
/// `StateService` announcement from a target is published to every subscriber; later ones only
/// refresh the stored copy.
pub(crate) struct Manager {
    devices: Mutex<HashMap<u64, Device>>,
    events: broadcast::Sender<Device>,
}

impl Manager {
    pub(crate) fn new(capacity: usize) -> Manager {
        let (events, _) = broadcast::channel(capacity.max(1));
        Manager {
            devices: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Device> {
        self.events.subscribe()
    }

    /// Updates the registry with a datagram that wasn't a reply to one of our requests.
    ///
    /// the `addr` parameter should be the sender of this message
    pub(crate) fn observe(&self, raw: &RawMessage, msg: Message, addr: SocketAddr) {
        let target = raw.frame_addr.target;
        if target == 0 {
            return;
        }

        match msg {
            Message::StateService {
                port,
                service: Service::Udp,
            } => {
                self.announce(target, addr, port);
            }
            Message::StateService { service, .. } => {
                trace!(device = target, ?service, "ignoring non-udp service");
            }
            other => {
                trace!(device = target, typ = other.get_num(), %addr, "unsolicited message");
            }
        }
    }

    /// Records an announcement.  Returns the device if it wasn't known before.
    pub(crate) fn announce(&self, target: u64, from: SocketAddr, port: u32) -> Option<Device> {
        let reply_port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .unwrap_or_else(|| from.port());
        let device = Device {
            target,
            addr: SocketAddr::new(from.ip(), reply_port),
            service: Service::Udp,
            port,
            last_seen: Utc::now(),
        };

        let previous = self.devices.lock().insert(target, device.clone());
        if previous.is_some() {
            trace!(mac = %device.mac(), addr = %device.addr, "device re-announced");
            return None;
        }

        info!(mac = %device.mac(), addr = %device.addr, "discovered device");
        if self.events.send(device.clone()).is_err() {
            debug!("no discovery subscribers");
        }
        Some(device)
    }

    pub(crate) fn get(&self, target: u64) -> Option<Device> {
        self.devices.lock().get(&target).cloned()
    }

    pub(crate) fn devices(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.devices.lock().values().cloned().collect();
        devices.sort_by_key(|d| d.target);
        devices
    }
}
