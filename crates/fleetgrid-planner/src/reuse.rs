//! Stable reuse matching.
//!
//! First planning stage: rebind every pre-existing instance to the address
//! it already holds, so redeploys do not shuffle addresses. A miss is not
//! an error; the instance simply falls through to the balancer with the
//! remaining needs.

use tracing::debug;

use fleetgrid_network::{
    AddressPool, InstancePlan, NetworkKind, NetworkName, NetworkReservation,
};

/// An (instance, network) pair still wanting an address after reuse
/// matching. `instance` indexes into the plan slice the matcher was
/// given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressNeed {
    pub instance: usize,
    pub network: NetworkName,
}

/// Rebind existing addresses and return the needs left over.
///
/// For each plan × desired network with an existing bound address: if the
/// address is still in the pool, or the network is a managed VIP network
/// (the provider can always re-affirm a previously issued address), commit
/// the reservation and remove the address from the pool if present.
/// Dynamic networks never draw from a pool; they are committed here with
/// the agent-reported address as a stand-in.
///
/// Processing is deterministic given input order: result stability across
/// repeated runs with identical inputs is a correctness requirement.
pub fn match_existing(plans: &mut [InstancePlan], pool: &mut AddressPool) -> Vec<AddressNeed> {
    let mut needs = Vec::new();

    for (idx, plan) in plans.iter_mut().enumerate() {
        let desired = plan.desired_networks.clone();
        for network in desired {
            if plan.is_reserved(&network) {
                continue;
            }
            let Some(net_pool) = pool.network_mut(&network) else {
                // Left for the balancer to report as an unknown network.
                needs.push(AddressNeed { instance: idx, network });
                continue;
            };

            if net_pool.kind == NetworkKind::Dynamic {
                plan.commit(NetworkReservation {
                    network: network.clone(),
                    kind: NetworkKind::Dynamic,
                    ip: plan.existing_addresses.get(&network).copied(),
                    az: None,
                });
                continue;
            }

            let existing = plan.existing_addresses.get(&network).copied();
            let reservation = match existing {
                Some(ip) => {
                    if let Some(entry) = net_pool.take(ip) {
                        let az = entry
                            .fixed_az()
                            .cloned()
                            .or_else(|| zone_within(&plan.availability_zone, &entry.az_names));
                        Some(NetworkReservation { network: network.clone(), kind: net_pool.kind, ip: Some(ip), az })
                    } else if net_pool.kind == NetworkKind::Vip && net_pool.managed {
                        // The provider re-affirms addresses it issued even
                        // when they are no longer in the declared pool.
                        Some(NetworkReservation { network: network.clone(), kind: NetworkKind::Vip, ip: Some(ip), az: None })
                    } else {
                        None
                    }
                }
                None => None,
            };

            match reservation {
                Some(reservation) => {
                    debug!(
                        instance = %plan.uuid,
                        network = %network,
                        ip = ?reservation.ip,
                        "reusing existing address"
                    );
                    plan.commit(reservation);
                }
                None => needs.push(AddressNeed { instance: idx, network }),
            }
        }
    }

    needs
}

fn zone_within(az: &Option<String>, candidates: &[String]) -> Option<String> {
    az.as_ref().filter(|az| candidates.contains(az)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetgrid_network::NetworksConfig;
    use std::net::IpAddr;

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn make_pool(toml: &str) -> AddressPool {
        let config = NetworksConfig::from_toml_str(toml).unwrap();
        AddressPool::build(&config, &["z1".to_string(), "z2".to_string()]).unwrap()
    }

    fn make_plan(uuid: &str, network: &str, existing: Option<&str>) -> InstancePlan {
        let mut plan = InstancePlan::new(uuid, "web", 0);
        plan.desired_networks = vec![network.to_string()];
        if let Some(ip) = existing {
            plan.existing_addresses.insert(network.to_string(), addr(ip));
        }
        plan
    }

    const STATIC_NET: &str = r#"
[[networks]]
name = "net_a"
type = "static"

[[networks.subnets]]
az = "z1"
static = ["10.0.0.5", "10.0.0.6"]
"#;

    #[test]
    fn rebinds_existing_address_and_consumes_it() {
        let mut pool = make_pool(STATIC_NET);
        let mut plans = vec![make_plan("i-0", "net_a", Some("10.0.0.5"))];

        let needs = match_existing(&mut plans, &mut pool);

        assert!(needs.is_empty());
        let reservation = plans[0].reservation("net_a").unwrap();
        assert_eq!(reservation.ip, Some(addr("10.0.0.5")));
        assert_eq!(reservation.az.as_deref(), Some("z1"));
        assert!(!pool.network("net_a").unwrap().contains(addr("10.0.0.5")));
        // The other address is untouched.
        assert!(pool.network("net_a").unwrap().contains(addr("10.0.0.6")));
    }

    #[test]
    fn rerunning_with_same_inputs_is_idempotent() {
        let mut plans = vec![make_plan("i-0", "net_a", Some("10.0.0.5"))];
        let mut first = plans.clone();
        let mut pool = make_pool(STATIC_NET);
        match_existing(&mut first, &mut pool);

        let mut pool = make_pool(STATIC_NET);
        let needs = match_existing(&mut plans, &mut pool);

        assert!(needs.is_empty());
        assert_eq!(plans, first);
    }

    #[test]
    fn address_gone_from_pool_defers_to_balancer() {
        let mut pool = make_pool(STATIC_NET);
        let mut plans = vec![make_plan("i-0", "net_a", Some("10.0.0.99"))];

        let needs = match_existing(&mut plans, &mut pool);

        assert_eq!(needs, vec![AddressNeed { instance: 0, network: "net_a".into() }]);
        assert!(plans[0].reservations.is_empty());
        assert_eq!(pool.network("net_a").unwrap().len(), 2);
    }

    #[test]
    fn managed_vip_rebinds_address_missing_from_pool() {
        let mut pool = make_pool(
            r#"
[[networks]]
name = "vip_net"
type = "vip"
managed = true
"#,
        );
        let mut plans = vec![make_plan("i-0", "vip_net", Some("198.51.100.9"))];

        let needs = match_existing(&mut plans, &mut pool);

        assert!(needs.is_empty());
        let reservation = plans[0].reservation("vip_net").unwrap();
        assert_eq!(reservation.kind, NetworkKind::Vip);
        assert_eq!(reservation.ip, Some(addr("198.51.100.9")));
    }

    #[test]
    fn unmanaged_vip_does_not_rebind_missing_address() {
        let mut pool = make_pool(
            r#"
[[networks]]
name = "vip_net"
type = "vip"

[[networks.subnets]]
static = ["198.51.100.10"]
"#,
        );
        let mut plans = vec![make_plan("i-0", "vip_net", Some("198.51.100.9"))];

        let needs = match_existing(&mut plans, &mut pool);

        assert_eq!(needs.len(), 1);
        assert!(plans[0].reservations.is_empty());
    }

    #[test]
    fn dynamic_network_commits_without_pool_draw() {
        let mut pool = make_pool(
            r#"
[[networks]]
name = "dyn_net"
type = "dynamic"
"#,
        );
        let mut plans = vec![
            make_plan("i-0", "dyn_net", Some("10.5.0.2")),
            make_plan("i-1", "dyn_net", None),
        ];

        let needs = match_existing(&mut plans, &mut pool);

        assert!(needs.is_empty());
        assert_eq!(plans[0].reservation("dyn_net").unwrap().ip, Some(addr("10.5.0.2")));
        assert_eq!(plans[1].reservation("dyn_net").unwrap().ip, None);
    }

    #[test]
    fn new_instance_without_existing_address_is_a_need() {
        let mut pool = make_pool(STATIC_NET);
        let mut plans = vec![make_plan("i-0", "net_a", None)];

        let needs = match_existing(&mut plans, &mut pool);

        assert_eq!(needs.len(), 1);
        assert_eq!(pool.network("net_a").unwrap().len(), 2);
    }
}
