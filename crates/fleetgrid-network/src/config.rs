//! Deployment network configuration.
//!
//! The shapes here mirror the networks section of a deployment document
//! after the manifest layer has parsed it. Pool construction (`pool`)
//! validates AZ scoping; this module only carries the data.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::error::{NetworkError, NetworkResult};
use crate::types::{AzName, NetworkKind, NetworkName};

/// The networks section of a deployment configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworksConfig {
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

impl NetworksConfig {
    pub fn from_toml_str(content: &str) -> NetworkResult<Self> {
        toml::from_str(content).map_err(|e| NetworkError::Parse(e.to_string()))
    }

    /// Look up a network definition by name.
    pub fn network(&self, name: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.name == name)
    }
}

/// One network declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: NetworkName,
    #[serde(rename = "type")]
    pub kind: NetworkKind,
    /// VIP networks only: the provider may mint new external addresses on
    /// demand instead of requiring a pre-declared static pool.
    #[serde(default)]
    pub managed: bool,
    /// Opaque IaaS properties, passed through to the agent payload.
    #[serde(default)]
    pub cloud_properties: serde_json::Map<String, serde_json::Value>,
    /// DNS servers handed to instances on this network.
    #[serde(default)]
    pub dns: Vec<IpAddr>,
    #[serde(default)]
    pub subnets: Vec<SubnetConfig>,
}

/// One subnet declaration within a network.
///
/// A subnet is scoped to a single zone (`az`), several zones (`azs`), or
/// none. Declaring both `az` and `azs` is rejected at pool construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubnetConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub az: Option<AzName>,
    #[serde(default)]
    pub azs: Option<Vec<AzName>>,
    /// Static addresses available from this subnet, in declaration order.
    #[serde(default, rename = "static")]
    pub static_ips: Vec<IpAddr>,
}
