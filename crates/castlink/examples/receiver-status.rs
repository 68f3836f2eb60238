//! Connect to a Cast device and ask the platform receiver for its status.
//!
//! Run with:
//!   cargo run --example receiver-status            # first device found
//!   cargo run --example receiver-status -- Kitchen # device named "Kitchen"
//!
//! The connection stays up for a few heartbeats before closing.

use std::time::Duration;

use castlink::conn::DEFAULT_RECEIVER;
use castlink::discovery::{DiscoveryService, MdnsScanner};
use castlink::logging::{init_logging, LogFormat};
use castlink::ClientConfig;
use serde_json::json;
use tokio_util::sync::CancellationToken;

const NAMESPACE_RECEIVER: &str = "urn:x-cast:com.google.cast.receiver";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LogFormat::Text, "info");

    let cancel = CancellationToken::new();
    let search = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        search.cancel();
    });

    let service = DiscoveryService::new(MdnsScanner::default());
    let device = match std::env::args().nth(1) {
        Some(name) => service.named(&cancel, &name).await?,
        None => service.first(&cancel).await?,
    };
    eprintln!("Found {device}");

    let client = castlink::connect_device(&device, ClientConfig::default()).await?;
    let receiver = client.new_channel(DEFAULT_RECEIVER, NAMESPACE_RECEIVER);
    receiver.on_message("RECEIVER_STATUS", |_, envelope| {
        eprintln!("Status update: {}", envelope.payload_utf8());
    });

    let mut request = json!({"type": "GET_STATUS"});
    let response = receiver
        .request(&mut request, Duration::from_secs(5))
        .await?;
    println!("{}", response.payload_utf8());

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(12)) => {}
        _ = client.connection().closed() => eprintln!("Connection lost"),
    }
    if client.is_closed_by_device() {
        eprintln!("Device closed the session");
    }

    client.close().await;
    Ok(())
}
