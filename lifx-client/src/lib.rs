//!
//! A library for discovering and controlling your LIFX bulbs over the LAN.
//!
//! There are a few levels you can use:
//!
//!  * [lifx_core::RawMessage] is used to speak the low-level LIFX protocol.  You will have to
//!  send/receive packets to/from the network yourself.
//!  * [Client::request] and [Client::send_message] send a [lifx_core::Message] to a device and
//!  hand back the matching reply, with timeouts.
//!  * The typed operations ([Client::set_power], [Client::set_color], [Client::set_colors],
//!  [Client::resolve], ...) validate their arguments and decode the replies for you.
//!
//! ```no_run
//! use futures::StreamExt;
//! use lifx_client::Client;
//!
//! # async fn run() -> lifx_client::Result<()> {
//! let client = Client::new().await?;
//! let mut found = Box::pin(client.discover());
//! while let Some(device) = found.next().await {
//!     let light = client.resolve(&device).await?;
//!     println!("{} is {}", light.label(), if light.is_on() { "on" } else { "off" });
//! }
//! # Ok(())
//! # }
//! ```
//!
//! All operations must be run from within a tokio runtime.

mod client;
mod config;
mod error;
mod light;
mod manager;
mod snapshot;
mod transport;

pub use client::{Client, ErrorSink};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use light::{transition_millis, ExtendedZones, HostFirmware, LightState, Version, ZoneWindow};
pub use manager::Device;
pub use snapshot::LightSnapshot;
pub use transport::{Expect, Reply};

pub use lifx_core::{ApplicationRequest, FirmwareGate, FirmwareVersion, Message, HSBK};
