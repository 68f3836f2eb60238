use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::device::DiscoveredDevice;
use crate::error::Result;

/// A source of discovered devices.
///
/// Implementations push devices into `results` until `cancel` fires or the
/// source is exhausted. The sender is dropped on return, which closes the
/// sink exactly once.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(
        &self,
        cancel: CancellationToken,
        results: mpsc::Sender<DiscoveredDevice>,
    ) -> Result<()>;
}

/// Push one device, giving up if `cancel` fires first.
///
/// Returns `false` when the scan should stop: cancelled or the receiver is
/// gone.
pub async fn emit(
    cancel: &CancellationToken,
    results: &mpsc::Sender<DiscoveredDevice>,
    device: DiscoveredDevice,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = results.send(device) => sent.is_ok(),
    }
}
