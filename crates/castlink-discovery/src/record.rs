use std::collections::HashMap;
use std::net::IpAddr;

use crate::device::DiscoveredDevice;
use crate::error::{DiscoveryError, Result};

/// Service type browsed for Cast devices.
pub const SERVICE_TYPE: &str = "_googlecast._tcp.local.";
/// Substring every Cast instance name carries.
pub const SERVICE_MARKER: &str = "._googlecast";

/// TXT key holding the device uuid.
pub const TXT_ID: &str = "id";
/// TXT key holding the friendly name.
pub const TXT_NAME: &str = "fn";

/// A resolved service announcement, before it is trusted as a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub fullname: String,
    /// First IPv4 address, if the announcement carried one.
    pub address: Option<IpAddr>,
    pub port: u16,
    /// TXT entries as `key=value` joined by `|`.
    pub info: String,
}

impl ServiceRecord {
    /// Turn the record into a device.
    ///
    /// Records whose name lacks `marker` or that carry no IPv4 address are
    /// rejected.
    pub fn decode(&self, marker: &str) -> Result<DiscoveredDevice> {
        if !self.fullname.contains(marker) {
            return Err(DiscoveryError::InvalidRecord {
                name: self.fullname.clone(),
                reason: "not a cast service",
            });
        }
        let address = self
            .address
            .filter(IpAddr::is_ipv4)
            .ok_or_else(|| DiscoveryError::InvalidRecord {
                name: self.fullname.clone(),
                reason: "no IPv4 address",
            })?;

        let info = parse_txt_record(&self.info);
        Ok(DiscoveredDevice {
            address,
            port: self.port,
            name: info.get(TXT_NAME).cloned().unwrap_or_default(),
            uuid: info.get(TXT_ID).cloned().unwrap_or_default(),
            info,
        })
    }
}

/// Parse `k1=v1|k2=v2|...` into a map.
///
/// Entries split on the first `=` only; entries without one are skipped.
pub fn parse_txt_record(txt: &str) -> HashMap<String, String> {
    txt.split('|')
        .filter_map(|entry| entry.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
