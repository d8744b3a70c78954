//! Address pools for one deployment-planning run.
//!
//! A pool is built once from validated configuration, then exclusively
//! owned by the run: the reuse matcher and the balancer remove entries,
//! the managed-VIP provisioner appends minted ones, and the whole thing
//! is discarded when planning finishes.

use std::net::IpAddr;

use tracing::debug;

use crate::config::NetworksConfig;
use crate::error::{NetworkError, NetworkResult};
use crate::types::{AddressEntry, AzName, NetworkKind, NetworkName};

/// Available addresses for one network, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPool {
    pub name: NetworkName,
    pub kind: NetworkKind,
    pub managed: bool,
    available: Vec<AddressEntry>,
}

impl NetworkPool {
    pub fn available(&self) -> &[AddressEntry] {
        &self.available
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.available.iter().any(|e| e.ip == ip)
    }

    /// Remove and return a specific address, if present.
    pub fn take(&mut self, ip: IpAddr) -> Option<AddressEntry> {
        let pos = self.available.iter().position(|e| e.ip == ip)?;
        Some(self.available.remove(pos))
    }

    /// Remove and return the next address in pool order.
    pub fn shift(&mut self) -> Option<AddressEntry> {
        if self.available.is_empty() {
            None
        } else {
            Some(self.available.remove(0))
        }
    }

    /// Append an address (used for provider-minted VIP entries).
    pub fn push(&mut self, entry: AddressEntry) {
        self.available.push(entry);
    }
}

/// Per-network address pools for one planning run.
#[derive(Debug, Clone, Default)]
pub struct AddressPool {
    networks: Vec<NetworkPool>,
}

impl AddressPool {
    /// Build the pool from configuration, validating AZ scoping against
    /// the deployment's AZ set. Every failure here aborts planning before
    /// anything is mutated.
    pub fn build(config: &NetworksConfig, deployment_azs: &[AzName]) -> NetworkResult<Self> {
        let mut networks = Vec::with_capacity(config.networks.len());

        for net in &config.networks {
            let mut available: Vec<AddressEntry> = Vec::new();
            let mut scoped = 0usize;
            let mut unscoped = 0usize;

            for subnet in &net.subnets {
                if subnet.az.is_some() && subnet.azs.is_some() {
                    return Err(NetworkError::ConflictingAzKeys(net.name.clone()));
                }
                let az_names: Vec<AzName> = match (&subnet.az, &subnet.azs) {
                    (_, Some(azs)) if azs.is_empty() => {
                        return Err(NetworkError::EmptyAzList(net.name.clone()));
                    }
                    (_, Some(azs)) => azs.clone(),
                    (Some(az), None) => vec![az.clone()],
                    (None, None) => Vec::new(),
                };

                for az in &az_names {
                    if !deployment_azs.contains(az) {
                        return Err(NetworkError::InvalidAzReference {
                            network: net.name.clone(),
                            az: az.clone(),
                        });
                    }
                }

                if az_names.is_empty() {
                    unscoped += 1;
                } else {
                    scoped += 1;
                }

                for &ip in &subnet.static_ips {
                    if available.iter().any(|e| e.ip == ip) {
                        return Err(NetworkError::DuplicateAddress { network: net.name.clone(), ip });
                    }
                    available.push(AddressEntry { ip, az_names: az_names.clone() });
                }
            }

            if scoped > 0 && unscoped > 0 {
                return Err(NetworkError::ConflictingAzSpecification(net.name.clone()));
            }

            debug!(
                network = %net.name,
                kind = net.kind.as_str(),
                addresses = available.len(),
                "built network pool"
            );

            networks.push(NetworkPool {
                name: net.name.clone(),
                kind: net.kind,
                managed: net.managed,
                available,
            });
        }

        Ok(AddressPool { networks })
    }

    pub fn network(&self, name: &str) -> Option<&NetworkPool> {
        self.networks.iter().find(|n| n.name == name)
    }

    pub fn network_mut(&mut self, name: &str) -> Option<&mut NetworkPool> {
        self.networks.iter_mut().find(|n| n.name == name)
    }

    pub fn networks(&self) -> impl Iterator<Item = &NetworkPool> {
        self.networks.iter()
    }
}
