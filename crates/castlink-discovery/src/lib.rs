//! Finding Cast devices on the local network.
//!
//! A [`Scanner`] streams [`DiscoveredDevice`]s into a channel until
//! cancelled. [`DiscoveryService`] stops at the first (or first named)
//! device, and [`dedup`] filters repeat announcements. With the default
//! `mdns` feature, [`MdnsScanner`] browses multicast DNS.

pub mod device;
pub mod error;
#[cfg(feature = "mdns")]
pub mod mdns;
pub mod record;
pub mod scanner;
pub mod service;

pub use device::DiscoveredDevice;
pub use error::{DiscoveryError, Result};
#[cfg(feature = "mdns")]
pub use mdns::{MdnsScanner, ScannerConfig};
pub use record::{parse_txt_record, ServiceRecord, SERVICE_MARKER, SERVICE_TYPE};
pub use scanner::{emit, Scanner};
pub use service::{dedup, spawn_dedup, DiscoveryService};
