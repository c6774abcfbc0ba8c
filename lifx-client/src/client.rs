use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use lifx_core::{FirmwareVersion, Message};
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Interval;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::manager::{Device, Manager};
use crate::snapshot::LightSnapshot;
use crate::transport::{broadcast_targets, Expect, Reply, Transport};

/// Called with the label and error of every failed [Client::detach] operation.
pub type ErrorSink = Arc<dyn Fn(&str, &Error) + Send + Sync + 'static>;

/// Handles network communication with LIFX devices for you.
///
/// A `Client` owns one UDP socket and a background task reading it.  It is cheap to clone; all
/// clones share the socket, the pending requests and the device registry.  The background task
/// stops when the last clone is dropped.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) transport: Transport,
    pub(crate) manager: Arc<Manager>,
    pub(crate) config: ClientConfig,
    error_sink: Mutex<Option<ErrorSink>>,
}

impl Client {
    /// Binds a client with the default configuration.  Must be called from a tokio runtime.
    pub async fn new() -> Result<Client> {
        Client::with_config(ClientConfig::default()).await
    }

    pub async fn with_config(config: ClientConfig) -> Result<Client> {
        let manager = Arc::new(Manager::new(config.event_capacity));
        let transport = Transport::bind(
            config.bind_addr,
            config.request_timeout,
            Arc::clone(&manager),
        )
        .await?;
        debug!(addr = ?transport.local_addr().ok(), "client bound");

        Ok(Client {
            inner: Arc::new(Inner {
                transport,
                manager,
                config,
                error_sink: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.transport.local_addr()
    }

    /// Every device that has announced itself so far.
    pub fn devices(&self) -> Vec<Device> {
        self.inner.manager.devices()
    }

    pub fn device(&self, target: u64) -> Option<Device> {
        self.inner.manager.get(target)
    }

    /// Number of requests currently waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.transport.pending_count()
    }

    /// Broadcasts a single `GetService`.  Devices that answer show up in [Client::devices] and
    /// on every [Client::discover] stream.
    pub async fn broadcast_discovery(&self) -> Result<()> {
        let targets = broadcast_targets(&self.inner.config.broadcast_addrs, self.inner.config.port);
        debug!(?targets, "broadcasting GetService");
        self.inner
            .transport
            .broadcast(&targets, Message::GetService)
            .await
    }

    /// Discovers devices on the network.
    ///
    /// Nothing happens until the stream is first polled.  From then on `GetService` is
    /// broadcast every [ClientConfig::discovery_interval], and each device is yielded the first
    /// time it announces itself after the stream started.  Devices found earlier are available
    /// from [Client::devices].  Dropping the stream stops the broadcasts.
    pub fn discover(&self) -> impl Stream<Item = Device> + Send + 'static {
        let client = self.clone();
        let period = self
            .inner
            .config
            .discovery_interval
            .max(Duration::from_millis(1));

        stream::unfold(
            None,
            move |state: Option<(broadcast::Receiver<Device>, Interval)>| {
                let client = client.clone();
                async move {
                    let (mut events, mut ticker) = match state {
                        Some(state) => state,
                        None => (
                            client.inner.manager.subscribe(),
                            tokio::time::interval(period),
                        ),
                    };
                    loop {
                        tokio::select! {
                            event = events.recv() => match event {
                                Ok(device) => return Some((device, Some((events, ticker)))),
                                Err(RecvError::Lagged(missed)) => {
                                    warn!(missed, "discovery stream fell behind");
                                }
                                Err(RecvError::Closed) => return None,
                            },
                            _ = ticker.tick() => {
                                if let Err(e) = client.broadcast_discovery().await {
                                    warn!(error = %e, "discovery broadcast failed");
                                }
                            }
                        }
                    }
                }
            },
        )
    }

    /// Queries a device for everything needed to build a [LightSnapshot].
    ///
    /// Asks for the version, the light state and the host firmware, then looks the product up
    /// in the catalog.  Multizone products also get their zones read, with the extended
    /// messages when the firmware supports them.
    pub async fn resolve(&self, device: &Device) -> Result<LightSnapshot> {
        let version = self.get_version(device).await?;
        let state = self.get_light_state(device).await?;
        let firmware = FirmwareVersion::from(self.get_host_firmware(device).await?.version);

        let product = self
            .inner
            .config
            .catalog()?
            .lookup(version.vendor, version.product)
            .cloned();
        if product.is_none() {
            debug!(
                vendor = version.vendor,
                product = version.product,
                "product not in catalog"
            );
        }

        let extended_multizone = product.as_ref().map_or(false, |p| {
            p.supports_extended_multizone(firmware, self.inner.config.firmware_gate)
        });
        let zones = if extended_multizone {
            Some(self.get_all_extended_color_zones(device).await?)
        } else if product.as_ref().map_or(false, |p| p.features.multizone) {
            Some(self.get_all_color_zones(device).await?)
        } else {
            None
        };

        Ok(LightSnapshot {
            device: device.clone(),
            label: state.label,
            power: state.on,
            color: state.color,
            vendor: version.vendor,
            product_id: version.product,
            firmware,
            product,
            zones,
            extended_multizone,
        })
    }

    /// Registers the callback that receives the errors of detached operations.
    pub fn on_detached_error<F>(&self, sink: F)
    where
        F: Fn(&str, &Error) + Send + Sync + 'static,
    {
        *self.inner.error_sink.lock() = Some(Arc::new(sink));
    }

    /// Runs an operation in the background without waiting for it.
    ///
    /// A failure is logged and passed to the callback set with [Client::on_detached_error].
    pub fn detach<F>(&self, label: &'static str, operation: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = operation.await {
                warn!(operation = label, error = %e, "detached operation failed");
                // not called under the lock, so a sink may replace itself
                let sink = client.inner.error_sink.lock().clone();
                if let Some(sink) = sink {
                    sink(label, &e);
                }
            }
        });
    }

    /// Sends a message to a device without asking for any reply.
    pub async fn send_message(&self, device: &Device, message: Message) -> Result<()> {
        self.inner
            .transport
            .fire(device.addr(), Some(device.target()), message)
            .await
    }

    /// Sends a message to a device and waits for its acknowledgement or response.
    pub async fn request(&self, device: &Device, message: Message, expect: Expect) -> Result<Reply> {
        self.inner
            .transport
            .request(device.addr(), Some(device.target()), message, expect)
            .await
    }

    pub(crate) async fn query(&self, device: &Device, message: Message) -> Result<Message> {
        Ok(self.request(device, message, Expect::Response).await?.message)
    }

    pub(crate) async fn acked(&self, device: &Device, message: Message) -> Result<()> {
        match self.request(device, message, Expect::Ack).await?.message {
            Message::Acknowledgement { .. } => Ok(()),
            other => Err(Error::unexpected("Acknowledgement", &other)),
        }
    }
}
