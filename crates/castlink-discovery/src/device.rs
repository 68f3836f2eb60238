use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// A device seen on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub address: IpAddr,
    pub port: u16,
    /// Friendly name (TXT key `fn`).
    pub name: String,
    /// Stable identity (TXT key `id`). May be empty.
    pub uuid: String,
    /// Every TXT entry the device advertised.
    pub info: HashMap<String, String>,
}

impl DiscoveredDevice {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Model name (TXT key `md`), when advertised.
    pub fn model(&self) -> Option<&str> {
        self.info.get("md").map(String::as_str)
    }
}

impl fmt::Display for DiscoveredDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.socket_addr())
    }
}
