//! Discovers every light on the LAN for a few seconds, then prints what each one reports.
//!
//! Usage: `get_all_info [SECONDS]` (see `--help`).  Set `RUST_LOG=debug` to see the traffic.

use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use futures::StreamExt;
use lifx_client::{Client, Device, LightSnapshot};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "get_all_info")]
#[command(about = "Discover LIFX lights on the LAN and print what they report", long_about = None)]
struct Args {
    /// How long to listen for devices, in seconds
    #[arg(default_value_t = 3)]
    seconds: u64,
}

fn print(light: &LightSnapshot) {
    let device = light.device();
    print!(
        "{} ({:0>16X} - {})",
        light.label(),
        device.target(),
        device.addr()
    );
    match light.product() {
        Some(info) => println!(" - {}", info.name),
        None => println!(" - Unknown model {}/{}", light.vendor(), light.product_id()),
    }

    print!("  Host FW:{} ", light.firmware());
    if light.supports_extended_multizone() {
        print!("(extended multizone) ");
    }
    println!("  last seen {}", device.last_seen().with_timezone(&Local));

    if !light.is_on() {
        println!("  Powered off");
        return;
    }
    match light.zones() {
        Some(zones) => {
            print!("  Powered On  {} zones: ", zones.len());
            for zone in zones {
                print!("{} ", zone.describe(true));
            }
            println!();
        }
        None => println!("  Powered On  {}", light.color().describe(false)),
    }
}

async fn collect(client: &Client, window: Duration) -> Vec<Device> {
    let mut found = Box::pin(client.discover());
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    let mut devices = Vec::new();
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            next = found.next() => match next {
                Some(device) => {
                    info!(addr = %device.addr(), id = %device.mac(), "found device");
                    devices.push(device);
                }
                None => break,
            },
        }
    }
    devices
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let client = Client::new().await.context("binding the LIFX socket")?;
    let devices = collect(&client, Duration::from_secs(args.seconds)).await;
    info!(count = devices.len(), "discovery finished");

    for device in &devices {
        match client.resolve(device).await {
            Ok(light) => print(&light),
            Err(e) => warn!(id = %device.mac(), error = %e, "could not query device"),
        }
    }
    Ok(())
}
