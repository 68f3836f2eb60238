use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::device::DiscoveredDevice;
use crate::error::{DiscoveryError, Result};
use crate::scanner::Scanner;

/// Buffer between the dedup task and its consumer.
const DEDUP_BUFFER: usize = 16;

/// Runs a [`Scanner`] until a wanted device shows up.
pub struct DiscoveryService<S> {
    scanner: Arc<S>,
}

impl<S: Scanner + 'static> DiscoveryService<S> {
    pub fn new(scanner: S) -> Self {
        Self {
            scanner: Arc::new(scanner),
        }
    }

    /// The first device the scanner reports.
    pub async fn first(&self, cancel: &CancellationToken) -> Result<DiscoveredDevice> {
        self.find(cancel, |_| true).await
    }

    /// The first device whose friendly name equals `name`.
    pub async fn named(&self, cancel: &CancellationToken, name: &str) -> Result<DiscoveredDevice> {
        self.find(cancel, |device| device.name == name).await
    }

    /// Scan into a single-slot buffer until `wanted` matches. The scan is
    /// cancelled and joined before this returns.
    async fn find<F>(&self, cancel: &CancellationToken, wanted: F) -> Result<DiscoveredDevice>
    where
        F: Fn(&DiscoveredDevice) -> bool,
    {
        let scan_cancel = cancel.child_token();
        let (tx, mut rx) = mpsc::channel(1);
        let scanner = Arc::clone(&self.scanner);
        let token = scan_cancel.clone();
        let scan = tokio::spawn(async move { scanner.scan(token, tx).await });

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(DiscoveryError::Cancelled),
                device = rx.recv() => match device {
                    Some(device) if wanted(&device) => break Ok(device),
                    Some(device) => debug!(device = %device, "skipping device"),
                    None => break Err(DiscoveryError::NotFound),
                },
            }
        };

        scan_cancel.cancel();
        drop(rx);
        // A scanner failure only replaces a search that found nothing.
        match scan.await.unwrap_or_else(|err| Err(err.into())) {
            Err(err) if matches!(outcome, Err(DiscoveryError::NotFound)) => Err(err),
            Err(err) => {
                warn!(error = %err, "scanner failed after search ended");
                outcome
            }
            Ok(()) => outcome,
        }
    }
}

/// Forward devices from `input` to `output`, dropping repeat sightings of
/// the same uuid. Devices with an empty uuid are always forwarded.
///
/// Returns when `input` closes (dropping `output` closes it in turn) or the
/// consumer goes away.
pub async fn dedup(
    mut input: mpsc::Receiver<DiscoveredDevice>,
    output: mpsc::Sender<DiscoveredDevice>,
) {
    let mut seen = HashSet::new();
    while let Some(device) = input.recv().await {
        if !device.uuid.is_empty() && !seen.insert(device.uuid.clone()) {
            continue;
        }
        if output.send(device).await.is_err() {
            break;
        }
    }
}

/// Run [`dedup`] on a background task and return its output together with
/// the task handle. The task ends once `input` closes or the returned
/// receiver is dropped.
pub fn spawn_dedup(
    input: mpsc::Receiver<DiscoveredDevice>,
) -> (mpsc::Receiver<DiscoveredDevice>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(DEDUP_BUFFER);
    let task = tokio::spawn(dedup(input, tx));
    (rx, task)
}
