//! Per-instance network settings payloads.
//!
//! `NetworkSettings` views one instance plan's committed reservations
//! against the network catalog and renders the structure the agent
//! consumes, plus the resolved addresses link consumers read. Everything
//! here is a pure read; the payload is rebuilt on every call because
//! agent-reported state and DNS feature flags can change between reads.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use fleetgrid_network::{
    AgentNetworkState, InstancePlan, NetworkKind, NetworkName, NetworksConfig,
};

use crate::encoder::{AddressResolver, ResolvedAddress};
use crate::error::{ResolveError, ResolveResult};
use crate::records::dns_record_name;

/// One network's entry in the agent settings payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettingsEntry {
    #[serde(rename = "type")]
    pub kind: NetworkKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmask: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<IpAddr>,
    pub cloud_properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<IpAddr>,
    /// Properties (`gateway`, `dns`, `addressable`, ...) for which this
    /// network is the instance's default.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default: Vec<String>,
}

/// Settings view over one instance's committed reservations.
pub struct NetworkSettings<'a> {
    plan: &'a InstancePlan,
    networks: &'a NetworksConfig,
    /// Default-network table: property name -> network name.
    default_network: &'a BTreeMap<String, NetworkName>,
    /// Last agent-reported state, keyed by network name.
    current_networks: &'a BTreeMap<NetworkName, AgentNetworkState>,
    resolver: &'a AddressResolver,
}

impl<'a> NetworkSettings<'a> {
    pub fn new(
        plan: &'a InstancePlan,
        networks: &'a NetworksConfig,
        default_network: &'a BTreeMap<String, NetworkName>,
        current_networks: &'a BTreeMap<NetworkName, AgentNetworkState>,
        resolver: &'a AddressResolver,
    ) -> Self {
        NetworkSettings { plan, networks, default_network, current_networks, resolver }
    }

    /// Render the settings map delivered to the agent.
    ///
    /// For dynamic networks the agent may already have reported concrete
    /// ip/netmask/gateway values; those override the planned stand-ins so
    /// configuration hashing stays stable between planned and observed
    /// state.
    pub fn to_map(&self) -> ResolveResult<BTreeMap<NetworkName, NetworkSettingsEntry>> {
        let mut defaults: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (property, network) in self.default_network {
            defaults.entry(network.as_str()).or_default().push(property.clone());
        }

        let mut settings = BTreeMap::new();
        for reservation in &self.plan.reservations {
            let config = self
                .networks
                .network(&reservation.network)
                .ok_or_else(|| ResolveError::MissingNetwork(reservation.network.clone()))?;

            let mut entry = NetworkSettingsEntry {
                kind: reservation.kind,
                ip: reservation.ip,
                netmask: None,
                gateway: None,
                cloud_properties: config.cloud_properties.clone(),
                dns: config.dns.clone(),
                default: defaults.get(reservation.network.as_str()).cloned().unwrap_or_default(),
            };

            if reservation.kind == NetworkKind::Dynamic {
                if let Some(current) = self.current_networks.get(&reservation.network) {
                    if current.ip.is_some() {
                        entry.ip = current.ip;
                    }
                    if current.netmask.is_some() {
                        entry.netmask = current.netmask;
                    }
                    if current.gateway.is_some() {
                        entry.gateway = current.gateway;
                    }
                }
            }

            settings.insert(reservation.network.clone(), entry);
        }

        Ok(settings)
    }

    /// Two DNS names per network, keyed by instance index and by uuid,
    /// both mapping to the instance's IP on that network.
    pub fn dns_record_info(&self) -> ResolveResult<BTreeMap<String, IpAddr>> {
        let mut records = BTreeMap::new();
        for (network_name, entry) in self.to_map()? {
            let Some(ip) = entry.ip else { continue };
            for key in [self.plan.index.to_string(), self.plan.uuid.clone()] {
                let name = dns_record_name(
                    &key,
                    &self.plan.instance_group,
                    &network_name,
                    &self.resolver.config.deployment_name,
                    &self.resolver.config.root_domain,
                );
                records.insert(name, ip);
            }
        }
        Ok(records)
    }

    /// Resolve the default network's address for a link consumer.
    pub fn default_address(
        &self,
        link_group_name: &str,
        prefer_dns_entry: bool,
    ) -> ResolveResult<ResolvedAddress> {
        let network_name = self.default_network_name()?;
        let settings = self.to_map()?;
        let entry = settings
            .get(network_name)
            .ok_or_else(|| ResolveError::MissingNetwork(network_name.clone()))?;
        self.resolver.resolve_address(
            network_name,
            entry.kind,
            entry.ip,
            &self.plan.uuid,
            &self.plan.instance_group,
            link_group_name,
            prefer_dns_entry,
        )
    }

    /// Resolve the default network's address keyed by the instance group,
    /// regardless of the deployment's `use_link_address` flag.
    pub fn instance_group_address(&self, prefer_dns_entry: bool) -> ResolveResult<ResolvedAddress> {
        let network_name = self.default_network_name()?;
        let settings = self.to_map()?;
        let entry = settings
            .get(network_name)
            .ok_or_else(|| ResolveError::MissingNetwork(network_name.clone()))?;
        self.resolver.resolve_instance_group_address(
            network_name,
            entry.kind,
            entry.ip,
            &self.plan.uuid,
            &self.plan.instance_group,
            prefer_dns_entry,
        )
    }

    /// Resolve addresses for every network attached to the instance.
    pub fn addresses(
        &self,
        link_group_name: &str,
        prefer_dns_entry: bool,
    ) -> ResolveResult<BTreeMap<NetworkName, ResolvedAddress>> {
        let mut out = BTreeMap::new();
        for (network_name, entry) in self.to_map()? {
            let resolved = self.resolver.resolve_address(
                &network_name,
                entry.kind,
                entry.ip,
                &self.plan.uuid,
                &self.plan.instance_group,
                link_group_name,
                prefer_dns_entry,
            )?;
            out.insert(network_name, resolved);
        }
        Ok(out)
    }

    /// The instance's default network: the `addressable` default when one
    /// is declared, else the `gateway` default.
    fn default_network_name(&self) -> ResolveResult<&'a NetworkName> {
        self.default_network
            .get("addressable")
            .or_else(|| self.default_network.get("gateway"))
            .ok_or(ResolveError::NoDefaultNetwork)
    }
}
