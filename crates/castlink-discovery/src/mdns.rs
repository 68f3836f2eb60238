use std::net::IpAddr;

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::device::DiscoveredDevice;
use crate::error::Result;
use crate::record::{ServiceRecord, SERVICE_MARKER, SERVICE_TYPE};
use crate::scanner::{emit, Scanner};

/// What to browse for and how to recognise it.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Fully qualified service type.
    pub service_type: String,
    /// Substring required in every instance name.
    pub marker: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            service_type: SERVICE_TYPE.to_string(),
            marker: SERVICE_MARKER.to_string(),
        }
    }
}

/// Multicast DNS browser for Cast devices.
///
/// Browses continuously until cancelled; devices re-announce periodically,
/// so the same device may be reported more than once (see
/// [`dedup`](crate::dedup)).
#[derive(Debug, Clone, Default)]
pub struct MdnsScanner {
    config: ScannerConfig,
}

impl MdnsScanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }
}

impl From<&ServiceInfo> for ServiceRecord {
    fn from(info: &ServiceInfo) -> Self {
        let txt: Vec<String> = info
            .get_properties()
            .iter()
            .map(|property| format!("{}={}", property.key(), property.val_str()))
            .collect();
        Self {
            fullname: info.get_fullname().to_string(),
            address: info
                .get_addresses_v4()
                .into_iter()
                .min()
                .map(|addr| IpAddr::V4(*addr)),
            port: info.get_port(),
            info: txt.join("|"),
        }
    }
}

#[async_trait]
impl Scanner for MdnsScanner {
    async fn scan(
        &self,
        cancel: CancellationToken,
        results: mpsc::Sender<DiscoveredDevice>,
    ) -> Result<()> {
        let daemon = ServiceDaemon::new()?;
        let events = daemon.browse(&self.config.service_type)?;
        info!(service = %self.config.service_type, "mdns browse started");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv_async() => match event {
                    Ok(event) => event,
                    Err(_) => break,
                },
            };

            let ServiceEvent::ServiceResolved(service) = event else {
                continue;
            };
            match ServiceRecord::from(&service).decode(&self.config.marker) {
                Ok(device) => {
                    debug!(device = %device, uuid = %device.uuid, "device resolved");
                    if !emit(&cancel, &results, device).await {
                        break;
                    }
                }
                Err(err) => debug!(error = %err, "skipping service record"),
            }
        }

        if let Err(err) = daemon.stop_browse(&self.config.service_type) {
            debug!(error = %err, "stop_browse failed");
        }
        if let Err(err) = daemon.shutdown() {
            debug!(error = %err, "mdns daemon shutdown failed");
        }
        info!("mdns browse stopped");
        Ok(())
    }
}
