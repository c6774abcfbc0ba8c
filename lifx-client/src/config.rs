use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use lifx_core::{Catalog, FirmwareGate, LIFX_PORT};

/// Settings for a [crate::Client].
///
/// ```
/// use std::time::Duration;
/// use lifx_client::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_request_timeout(Duration::from_millis(500))
///     .with_discovery_interval(Duration::from_secs(30));
/// assert_eq!(config.port, 56700);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Local address the UDP socket is bound to.
    pub bind_addr: SocketAddr,
    /// Port devices are reached on when broadcasting.
    pub port: u16,
    /// How long a request waits for its acknowledgement or response.
    pub request_timeout: Duration,
    /// How often a discovery stream re-broadcasts `GetService`.
    pub discovery_interval: Duration,
    /// Broadcast addresses used for discovery.  When empty, the broadcast address of every
    /// non-loopback IPv4 interface is used.
    pub broadcast_addrs: Vec<Ipv4Addr>,
    /// How firmware versions are compared when deciding on extended multizone support.
    pub firmware_gate: FirmwareGate,
    /// Number of discovery events buffered for slow subscribers.
    pub event_capacity: usize,
    /// Product catalog used when resolving devices.  The bundled catalog is used when `None`.
    pub catalog: Option<Arc<Catalog>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            port: LIFX_PORT,
            request_timeout: Duration::from_secs(1),
            discovery_interval: Duration::from_secs(10),
            broadcast_addrs: Vec::new(),
            firmware_gate: FirmwareGate::AtLeast,
            event_capacity: 64,
            catalog: None,
        }
    }
}

impl ClientConfig {
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    pub fn with_broadcast_addrs(mut self, addrs: Vec<Ipv4Addr>) -> Self {
        self.broadcast_addrs = addrs;
        self
    }

    pub fn with_firmware_gate(mut self, gate: FirmwareGate) -> Self {
        self.firmware_gate = gate;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    /// The catalog set with [ClientConfig::with_catalog], or else the bundled one.
    pub(crate) fn catalog(&self) -> std::result::Result<&Catalog, lifx_core::Error> {
        match &self.catalog {
            Some(catalog) => Ok(&**catalog),
            None => Catalog::bundled(),
        }
    }
}
