//! List Cast devices on the local network.
//!
//! Run with:
//!   cargo run --example discover
//!
//! Scans for `CASTLINK_SCAN_SECS` seconds (default 5). Set `RUST_LOG=debug`
//! to see every mDNS record, including skipped ones.

use std::time::Duration;

use castlink::discovery::{spawn_dedup, MdnsScanner, Scanner};
use castlink::logging::{init_logging, LogFormat};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let format = std::env::var("CASTLINK_LOG_FORMAT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(LogFormat::Text);
    init_logging(format, "info");

    let secs = std::env::var("CASTLINK_SCAN_SECS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(5);

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(16);
    let scanner = MdnsScanner::default();
    let token = cancel.clone();
    let scan = tokio::spawn(async move { scanner.scan(token, tx).await });
    let (mut devices, dedup_task) = spawn_dedup(rx);

    let deadline = tokio::time::sleep(Duration::from_secs(secs));
    tokio::pin!(deadline);
    let mut found = 0usize;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            device = devices.recv() => match device {
                Some(device) => {
                    found += 1;
                    println!(
                        "{}\t{}\t{}\t{}",
                        device.name,
                        device.socket_addr(),
                        device.model().unwrap_or("-"),
                        device.uuid
                    );
                }
                None => break,
            },
        }
    }

    cancel.cancel();
    scan.await??;
    drop(devices);
    dedup_task.await?;
    eprintln!("{found} device(s) found");
    Ok(())
}
