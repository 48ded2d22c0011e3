//! Configuration of a TTI session

use crate::cache::ReplacementPolicy;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default multicast group of the status telegram and the op-dir notification
pub const TTDB_STATUS_DEST_IP: Ipv4Addr = Ipv4Addr::new(239, 194, 0, 0);
/// Same, for consist networks attached to ETB 0 only
pub const TTDB_STATUS_DEST_IP_ETB0: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 0);
/// Default ECSP URI the directory requests are sent to
pub const TTDB_ECSP_URI: &str = "devECSP.anyVeh.lCst.lClTrn.lTrn";

/// Settings of a TTI session
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TtiConfig {
    /// Groups the status telegram is subscribed on
    pub status_addrs: [Ipv4Addr; 2],
    /// Groups the op-dir notification is listened for on
    pub notify_addrs: [Ipv4Addr; 2],
    /// Status telegram receive timeout
    pub status_timeout: Duration,
    /// Reply timeout of every directory request
    pub reply_timeout: Duration,
    /// Destination URI of the directory requests
    pub ecsp_uri: String,
    /// Own device address, its low 12 bits are the own function id
    pub own_ip: Ipv4Addr,
    /// Minimum interval between identical requests, `None` re-requests on every stale query
    pub request_holdoff: Option<Duration>,
    /// Replacement of foreign consists in a full cache
    pub replacement: ReplacementPolicy,
}

impl TtiConfig {
    /// Start a builder with default settings
    pub fn builder() -> TtiConfigBuilder {
        TtiConfigBuilder::new()
    }

    /// Own function id derived from the own address
    pub fn own_fct_id(&self) -> u16 {
        (u32::from(self.own_ip) & 0x0FFF) as u16
    }
}

impl Default for TtiConfig {
    fn default() -> Self {
        TtiConfig {
            status_addrs: [TTDB_STATUS_DEST_IP, TTDB_STATUS_DEST_IP_ETB0],
            notify_addrs: [TTDB_STATUS_DEST_IP, TTDB_STATUS_DEST_IP_ETB0],
            status_timeout: Duration::from_secs(5),
            reply_timeout: Duration::from_secs(3),
            ecsp_uri: TTDB_ECSP_URI.to_string(),
            own_ip: Ipv4Addr::UNSPECIFIED,
            request_holdoff: None,
            replacement: ReplacementPolicy::default(),
        }
    }
}

/// Builder for [`TtiConfig`]
pub struct TtiConfigBuilder {
    config: TtiConfig,
}

impl TtiConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        TtiConfigBuilder {
            config: TtiConfig::default(),
        }
    }

    /// Set the status telegram groups
    pub fn with_status_addrs(mut self, addrs: [Ipv4Addr; 2]) -> Self {
        self.config.status_addrs = addrs;
        self
    }

    /// Set the op-dir notification groups
    pub fn with_notify_addrs(mut self, addrs: [Ipv4Addr; 2]) -> Self {
        self.config.notify_addrs = addrs;
        self
    }

    /// Set the status telegram timeout
    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.config.status_timeout = timeout;
        self
    }

    /// Set the reply timeout
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.config.reply_timeout = timeout;
        self
    }

    /// Set the request destination URI
    pub fn with_ecsp_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.ecsp_uri = uri.into();
        self
    }

    /// Set the own device address
    pub fn with_own_ip(mut self, ip: Ipv4Addr) -> Self {
        self.config.own_ip = ip;
        self
    }

    /// Rate-limit identical requests
    pub fn with_request_holdoff(mut self, holdoff: Duration) -> Self {
        self.config.request_holdoff = Some(holdoff);
        self
    }

    /// Set the foreign consist replacement policy
    pub fn with_replacement(mut self, policy: ReplacementPolicy) -> Self {
        self.config.replacement = policy;
        self
    }

    /// Build the configuration
    pub fn build(self) -> TtiConfig {
        self.config
    }
}

impl Default for TtiConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
