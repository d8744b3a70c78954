//! Managed-VIP pre-provisioning.
//!
//! The balancer's search is CPU-bound and must never interleave with
//! cloud-provider calls, so any addresses the provider has to mint are
//! minted here, strictly before the search starts. Minting is gated on
//! the network's `managed` flag; an unmanaged network that comes up short
//! fails with `PoolExhausted` instead of silently auto-provisioning.

use std::collections::BTreeMap;
use std::net::IpAddr;

use tracing::info;

use fleetgrid_network::{AddressEntry, AddressPool, NetworkKind, NetworkName};

use crate::error::{PlanError, PlanResult};
use crate::reuse::AddressNeed;

/// The IaaS boundary for external (VIP) addresses.
pub trait CloudProvider {
    fn create_external_ip(&mut self) -> anyhow::Result<IpAddr>;
    fn release(&mut self, ip: IpAddr) -> anyhow::Result<()>;
}

/// Top up managed VIP pools so every need can draw an address.
///
/// Returns the minted addresses so the caller can release them if a later
/// planning stage fails.
pub fn provision_shortfall(
    needs: &[AddressNeed],
    pool: &mut AddressPool,
    provider: &mut dyn CloudProvider,
) -> PlanResult<Vec<IpAddr>> {
    let mut per_network: BTreeMap<&NetworkName, usize> = BTreeMap::new();
    for need in needs {
        *per_network.entry(&need.network).or_insert(0) += 1;
    }

    let mut minted = Vec::new();
    for (network, needed) in per_network {
        let Some(net_pool) = pool.network(network) else {
            return Err(PlanError::UnknownNetwork(network.clone()));
        };
        let shortfall = needed.saturating_sub(net_pool.len());
        if shortfall == 0 {
            continue;
        }
        if net_pool.kind != NetworkKind::Vip || !net_pool.managed {
            return Err(PlanError::PoolExhausted(network.clone()));
        }

        for _ in 0..shortfall {
            let ip = provider.create_external_ip()?;
            minted.push(ip);
            // Minted addresses are externally routed and AZ-agnostic.
            pool.network_mut(network)
                .ok_or_else(|| PlanError::UnknownNetwork(network.clone()))?
                .push(AddressEntry { ip, az_names: Vec::new() });
        }
        info!(network = %network, count = shortfall, "minted external addresses for managed VIP network");
    }

    Ok(minted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetgrid_network::NetworksConfig;

    struct FakeProvider {
        next: u8,
        created: Vec<IpAddr>,
        released: Vec<IpAddr>,
    }

    impl FakeProvider {
        fn new() -> Self {
            FakeProvider { next: 1, created: Vec::new(), released: Vec::new() }
        }
    }

    impl CloudProvider for FakeProvider {
        fn create_external_ip(&mut self) -> anyhow::Result<IpAddr> {
            let ip: IpAddr = format!("203.0.113.{}", self.next).parse()?;
            self.next += 1;
            self.created.push(ip);
            Ok(ip)
        }

        fn release(&mut self, ip: IpAddr) -> anyhow::Result<()> {
            self.released.push(ip);
            Ok(())
        }
    }

    fn make_pool(toml: &str) -> AddressPool {
        let config = NetworksConfig::from_toml_str(toml).unwrap();
        AddressPool::build(&config, &["z1".to_string()]).unwrap()
    }

    fn needs_on(network: &str, count: usize) -> Vec<AddressNeed> {
        (0..count).map(|i| AddressNeed { instance: i, network: network.to_string() }).collect()
    }

    #[test]
    fn mints_exactly_the_shortfall_for_managed_vip() {
        let mut pool = make_pool(
            r#"
[[networks]]
name = "vip_net"
type = "vip"
managed = true

[[networks.subnets]]
static = ["198.51.100.10"]
"#,
        );
        let mut provider = FakeProvider::new();

        let minted =
            provision_shortfall(&needs_on("vip_net", 3), &mut pool, &mut provider).unwrap();

        assert_eq!(minted.len(), 2);
        assert_eq!(provider.created.len(), 2);
        assert_eq!(pool.network("vip_net").unwrap().len(), 3);
        // Minted entries are AZ-agnostic.
        assert!(pool.network("vip_net").unwrap().available()[2].az_names.is_empty());
    }

    #[test]
    fn unmanaged_network_shortfall_is_pool_exhausted() {
        let mut pool = make_pool(
            r#"
[[networks]]
name = "net_a"
type = "static"

[[networks.subnets]]
az = "z1"
static = ["10.0.0.5"]
"#,
        );
        let mut provider = FakeProvider::new();

        let err = provision_shortfall(&needs_on("net_a", 2), &mut pool, &mut provider).unwrap_err();

        assert!(matches!(err, PlanError::PoolExhausted(n) if n == "net_a"));
        assert!(provider.created.is_empty());
    }

    #[test]
    fn unmanaged_vip_shortfall_is_pool_exhausted() {
        let mut pool = make_pool(
            r#"
[[networks]]
name = "vip_net"
type = "vip"

[[networks.subnets]]
static = ["198.51.100.10"]
"#,
        );
        let mut provider = FakeProvider::new();

        let err =
            provision_shortfall(&needs_on("vip_net", 2), &mut pool, &mut provider).unwrap_err();

        assert!(matches!(err, PlanError::PoolExhausted(n) if n == "vip_net"));
        assert!(provider.created.is_empty());
    }

    #[test]
    fn sufficient_pool_never_calls_the_provider() {
        let mut pool = make_pool(
            r#"
[[networks]]
name = "vip_net"
type = "vip"
managed = true

[[networks.subnets]]
static = ["198.51.100.10", "198.51.100.11"]
"#,
        );
        let mut provider = FakeProvider::new();

        let minted =
            provision_shortfall(&needs_on("vip_net", 2), &mut pool, &mut provider).unwrap();

        assert!(minted.is_empty());
        assert!(provider.created.is_empty());
    }
}
