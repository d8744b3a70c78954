//! Feature-gated DNS address encoding.
//!
//! A link consumer asking for an instance's address gets either the
//! literal IP or a DNS name. Dynamic networks always resolve through DNS
//! (their addresses are not stable); everything else resolves through DNS
//! only when the caller prefers it and the deployment has local DNS
//! enabled. The actual name encoding is delegated to an external
//! collaborator behind the `DnsEncoder` trait.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use fleetgrid_network::NetworkKind;

use crate::error::{ResolveError, ResolveResult};

/// A resolved address: literal IP or DNS name.
pub type ResolvedAddress = String;

/// Which group identity a DNS query is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    InstanceGroup,
    Link,
}

/// One query for the external DNS name encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery<'a> {
    pub group_type: GroupType,
    pub group_name: &'a str,
    pub root_domain: &'a str,
    pub default_network: &'a str,
    pub deployment_name: &'a str,
    pub uuid: &'a str,
    /// Ask the encoder for its short name form.
    pub short: bool,
}

/// External DNS name encoder collaborator.
pub trait DnsEncoder {
    fn encode_query(&self, query: &DnsQuery<'_>) -> anyhow::Result<String>;
}

/// Deployment-wide DNS feature configuration.
///
/// These are explicit per-run values, never read from process-wide state;
/// the flags (and the instance's AZ) can change between deployment
/// versions, which is why resolved addresses are recomputed on every read
/// and never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfig {
    pub root_domain: String,
    pub deployment_name: String,
    /// Key link queries by the link-provider group instead of the
    /// instance group.
    pub use_link_address: bool,
    pub use_short_dns_addresses: bool,
    pub local_dns_enabled: bool,
}

/// Resolves one (network, address) pair into a literal IP or DNS name.
///
/// Constructed once per deployment-planning run and handed to every call
/// site. Operations are pure reads over committed state; calling them
/// concurrently or repeatedly is fine.
pub struct AddressResolver {
    pub config: DnsConfig,
    encoder: Box<dyn DnsEncoder>,
}

impl AddressResolver {
    pub fn new(config: DnsConfig, encoder: Box<dyn DnsEncoder>) -> Self {
        AddressResolver { config, encoder }
    }

    /// Resolve for a link consumer. The group identity is the link
    /// provider group when `use_link_address` is set, the instance group
    /// otherwise.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve_address(
        &self,
        network_name: &str,
        kind: NetworkKind,
        ip: Option<IpAddr>,
        uuid: &str,
        instance_group_name: &str,
        link_group_name: &str,
        prefer_dns_entry: bool,
    ) -> ResolveResult<ResolvedAddress> {
        let (group_type, group_name) = if self.config.use_link_address {
            (GroupType::Link, link_group_name)
        } else {
            (GroupType::InstanceGroup, instance_group_name)
        };
        self.encode(group_type, group_name, network_name, kind, ip, uuid, prefer_dns_entry)
    }

    /// Resolve keyed by the instance group, regardless of
    /// `use_link_address`.
    pub fn resolve_instance_group_address(
        &self,
        network_name: &str,
        kind: NetworkKind,
        ip: Option<IpAddr>,
        uuid: &str,
        instance_group_name: &str,
        prefer_dns_entry: bool,
    ) -> ResolveResult<ResolvedAddress> {
        self.encode(
            GroupType::InstanceGroup,
            instance_group_name,
            network_name,
            kind,
            ip,
            uuid,
            prefer_dns_entry,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn encode(
        &self,
        group_type: GroupType,
        group_name: &str,
        network_name: &str,
        kind: NetworkKind,
        ip: Option<IpAddr>,
        uuid: &str,
        prefer_dns_entry: bool,
    ) -> ResolveResult<ResolvedAddress> {
        if !self.should_use_dns(prefer_dns_entry, kind) {
            return ip
                .map(|ip| ip.to_string())
                .ok_or_else(|| ResolveError::MissingAddress(network_name.to_string()));
        }

        debug!(network = network_name, group = group_name, "resolving address through DNS");
        let query = DnsQuery {
            group_type,
            group_name,
            root_domain: &self.config.root_domain,
            default_network: network_name,
            deployment_name: &self.config.deployment_name,
            uuid,
            short: self.config.use_short_dns_addresses,
        };
        Ok(self.encoder.encode_query(&query)?)
    }

    fn should_use_dns(&self, prefer_dns_entry: bool, kind: NetworkKind) -> bool {
        kind == NetworkKind::Dynamic || (prefer_dns_entry && self.config.local_dns_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type QueryLog = Rc<RefCell<Vec<(GroupType, String, String, bool)>>>;

    /// Records every query and answers with a recognizable name.
    struct FakeEncoder {
        queries: QueryLog,
    }

    impl DnsEncoder for FakeEncoder {
        fn encode_query(&self, query: &DnsQuery<'_>) -> anyhow::Result<String> {
            self.queries.borrow_mut().push((
                query.group_type,
                query.group_name.to_string(),
                query.default_network.to_string(),
                query.short,
            ));
            Ok(format!("{}.{}.{}", query.uuid, query.group_name, query.root_domain))
        }
    }

    struct BrokenEncoder;

    impl DnsEncoder for BrokenEncoder {
        fn encode_query(&self, _query: &DnsQuery<'_>) -> anyhow::Result<String> {
            anyhow::bail!("encoder not seeded")
        }
    }

    fn recording_resolver(config: DnsConfig) -> (AddressResolver, QueryLog) {
        let log: QueryLog = Rc::new(RefCell::new(Vec::new()));
        let resolver = AddressResolver::new(config, Box::new(FakeEncoder { queries: log.clone() }));
        (resolver, log)
    }

    fn resolver(config: DnsConfig) -> AddressResolver {
        recording_resolver(config).0
    }

    fn base_config() -> DnsConfig {
        DnsConfig {
            root_domain: "grid".into(),
            deployment_name: "dep".into(),
            ..Default::default()
        }
    }

    fn ip() -> Option<IpAddr> {
        Some("10.0.0.5".parse().unwrap())
    }

    #[test]
    fn static_network_returns_literal_ip_without_preference() {
        let r = resolver(base_config());
        let out = r
            .resolve_address("net_a", NetworkKind::Static, ip(), "uuid-1", "web", "link", false)
            .unwrap();
        assert_eq!(out, "10.0.0.5");
    }

    #[test]
    fn preference_without_local_dns_still_returns_ip() {
        let r = resolver(base_config());
        let out = r
            .resolve_address("net_a", NetworkKind::Static, ip(), "uuid-1", "web", "link", true)
            .unwrap();
        assert_eq!(out, "10.0.0.5");
    }

    #[test]
    fn preference_with_local_dns_encodes() {
        let r = resolver(DnsConfig { local_dns_enabled: true, ..base_config() });
        let out = r
            .resolve_address("net_a", NetworkKind::Static, ip(), "uuid-1", "web", "link", true)
            .unwrap();
        assert_eq!(out, "uuid-1.web.grid");
    }

    #[test]
    fn dynamic_network_always_encodes() {
        let r = resolver(base_config());
        let out = r
            .resolve_address("net_a", NetworkKind::Dynamic, None, "uuid-1", "web", "link", false)
            .unwrap();
        assert_eq!(out, "uuid-1.web.grid");
    }

    #[test]
    fn link_flag_switches_group_identity() {
        let (r, log) = recording_resolver(DnsConfig {
            local_dns_enabled: true,
            use_link_address: true,
            ..base_config()
        });
        let out = r
            .resolve_address("net_a", NetworkKind::Static, ip(), "uuid-1", "web", "db-link", true)
            .unwrap();
        assert_eq!(out, "uuid-1.db-link.grid");
        assert_eq!(log.borrow()[0].0, GroupType::Link);
        assert_eq!(log.borrow()[0].1, "db-link");
    }

    #[test]
    fn instance_group_entry_point_ignores_link_flag() {
        let (r, log) = recording_resolver(DnsConfig {
            local_dns_enabled: true,
            use_link_address: true,
            ..base_config()
        });
        let out = r
            .resolve_instance_group_address("net_a", NetworkKind::Static, ip(), "uuid-1", "web", true)
            .unwrap();
        assert_eq!(out, "uuid-1.web.grid");
        assert_eq!(log.borrow()[0].0, GroupType::InstanceGroup);
    }

    #[test]
    fn short_names_flag_reaches_the_encoder() {
        let (r, log) = recording_resolver(DnsConfig {
            local_dns_enabled: true,
            use_short_dns_addresses: true,
            ..base_config()
        });
        r.resolve_address("net_a", NetworkKind::Static, ip(), "uuid-1", "web", "link", true)
            .unwrap();
        assert!(log.borrow()[0].3);
    }

    #[test]
    fn missing_address_on_literal_path_is_an_error() {
        let r = resolver(base_config());
        let err = r
            .resolve_address("net_a", NetworkKind::Static, None, "uuid-1", "web", "link", false)
            .unwrap_err();
        assert!(matches!(err, ResolveError::MissingAddress(n) if n == "net_a"));
    }

    #[test]
    fn encoder_failure_propagates_without_ip_fallback() {
        let r = AddressResolver::new(
            DnsConfig { local_dns_enabled: true, ..base_config() },
            Box::new(BrokenEncoder),
        );
        let err = r
            .resolve_address("net_a", NetworkKind::Dynamic, ip(), "uuid-1", "web", "link", false)
            .unwrap_err();
        assert!(matches!(err, ResolveError::Encoder(_)));
    }
}
