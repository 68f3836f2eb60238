/// Errors that can occur during discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The caller cancelled the search.
    #[error("discovery cancelled")]
    Cancelled,

    /// The scanner finished without producing a matching device.
    #[error("no matching device found")]
    NotFound,

    /// A service record does not describe a usable device.
    #[error("invalid service record {name}: {reason}")]
    InvalidRecord { name: String, reason: &'static str },

    /// The mDNS daemon failed.
    #[cfg(feature = "mdns")]
    #[error("mdns error: {0}")]
    Mdns(#[from] mdns_sd::Error),

    /// The scan task panicked or was aborted.
    #[error("scan task failed: {0}")]
    ScanTask(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
