//! In-memory response cache for the Wazuh API
//!
//! Entries expire according to the kind of resource an endpoint returns:
//! hardware inventory barely changes, agent liveness changes by the minute.

pub mod key;
pub mod storage;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cache TTL per data type
pub struct CacheTtl;

impl CacheTtl {
    // Static inventory
    pub const HARDWARE: Duration = Duration::from_secs(24 * 60 * 60); // 24 hr
    pub const OS: Duration = Duration::from_secs(12 * 60 * 60); // 12 hr

    // Changes a few times a day
    pub const PACKAGES: Duration = Duration::from_secs(6 * 60 * 60); // 6 hr
    pub const NETWORK: Duration = Duration::from_secs(30 * 60); // 30 min
    pub const NETWORK_INTERFACES: Duration = Duration::from_secs(30 * 60); // 30 min
    pub const NETWORK_PROTOCOL: Duration = Duration::from_secs(30 * 60); // 30 min

    // Volatile
    pub const AGENTS: Duration = Duration::from_secs(2 * 60); // 2 min
    pub const STATS: Duration = Duration::from_secs(5 * 60); // 5 min
}

/// Kind of resource returned by an upstream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    Hardware,
    Os,
    Packages,
    Network,
    NetworkInterfaces,
    NetworkProtocol,
    Agents,
    Stats,
}

/// Path fragments used to classify endpoints, in tie-break order.
const CLASSIFICATION_RULES: [(&str, DataType); 8] = [
    ("/hardware", DataType::Hardware),
    ("/os", DataType::Os),
    ("/packages", DataType::Packages),
    ("/netiface", DataType::NetworkInterfaces),
    ("/netproto", DataType::NetworkProtocol),
    ("/network", DataType::Network),
    ("/agents", DataType::Agents),
    ("/stats", DataType::Stats),
];

impl DataType {
    /// All data types, in declaration order.
    pub const ALL: [DataType; 8] = [
        DataType::Hardware,
        DataType::Os,
        DataType::Packages,
        DataType::Network,
        DataType::NetworkInterfaces,
        DataType::NetworkProtocol,
        DataType::Agents,
        DataType::Stats,
    ];

    /// Type used for endpoints no rule matches.
    pub const FALLBACK: DataType = DataType::Network;

    /// Classify an endpoint path.
    ///
    /// The longest matching fragment wins, so `/agents/001/stats` is agent data
    /// rather than stats. Equal-length matches resolve to the earlier rule.
    pub fn from_endpoint(endpoint: &str) -> Self {
        let mut best: Option<(&str, DataType)> = None;

        for (fragment, data_type) in CLASSIFICATION_RULES {
            if !endpoint.contains(fragment) {
                continue;
            }
            match best {
                Some((current, _)) if current.len() >= fragment.len() => {}
                _ => best = Some((fragment, data_type)),
            }
        }

        best.map(|(_, data_type)| data_type)
            .unwrap_or(Self::FALLBACK)
    }

    /// Built-in TTL for this type.
    pub fn default_ttl(&self) -> Duration {
        match self {
            DataType::Hardware => CacheTtl::HARDWARE,
            DataType::Os => CacheTtl::OS,
            DataType::Packages => CacheTtl::PACKAGES,
            DataType::Network => CacheTtl::NETWORK,
            DataType::NetworkInterfaces => CacheTtl::NETWORK_INTERFACES,
            DataType::NetworkProtocol => CacheTtl::NETWORK_PROTOCOL,
            DataType::Agents => CacheTtl::AGENTS,
            DataType::Stats => CacheTtl::STATS,
        }
    }

    /// Configuration name (`network-interfaces`, `agents`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Hardware => "hardware",
            DataType::Os => "os",
            DataType::Packages => "packages",
            DataType::Network => "network",
            DataType::NetworkInterfaces => "network-interfaces",
            DataType::NetworkProtocol => "network-protocol",
            DataType::Agents => "agents",
            DataType::Stats => "stats",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown data type '{}'", s))
    }
}

/// TTL lookup table, defaulting to [`CacheTtl`] for types without an override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TtlPolicy {
    overrides: BTreeMap<DataType, Duration>,
}

impl TtlPolicy {
    /// Override the TTL of one data type.
    pub fn with_ttl(mut self, data_type: DataType, ttl: Duration) -> Self {
        self.overrides.insert(data_type, ttl);
        self
    }

    /// TTL for a data type.
    pub fn ttl(&self, data_type: DataType) -> Duration {
        self.overrides
            .get(&data_type)
            .copied()
            .unwrap_or_else(|| data_type.default_ttl())
    }
}

// Re-export main types
pub use key::{Params, cache_key};
pub use storage::{CacheStats, CacheStore};
