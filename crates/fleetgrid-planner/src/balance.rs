//! AZ-balancing address allocation.
//!
//! Second planning stage. Instances do not choose among candidate IPs;
//! each need takes the next address of its network in pool order. The only
//! degree of freedom is which zone gets committed for addresses whose
//! candidate AZ set has more than one entry, and the search must pick a
//! zone for every such address so that the committed counts come out even
//! for every network.
//!
//! Depth-first backtracking with a greedy least-loaded ordering: the
//! heuristic finds an even assignment on the first or near-first branch in
//! the common case, but the worst case is exponential in the number of
//! ambiguous addresses.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use tracing::{debug, warn};

use fleetgrid_network::{
    AddressEntry, AddressPool, AzName, InstancePlan, NetworkKind, NetworkName, NetworkReservation,
};

use crate::error::{PlanError, PlanResult};
use crate::reuse::AddressNeed;

/// Per-network, per-AZ committed-count table.
///
/// Exists only for the duration of one search; branches increment on entry
/// and decrement on exit instead of cloning the table.
#[derive(Debug, Default)]
struct AzAllocationState {
    counts: BTreeMap<NetworkName, BTreeMap<AzName, u32>>,
}

impl AzAllocationState {
    /// Make sure the zone participates in the network's evenness check,
    /// starting at zero.
    fn track(&mut self, network: &str, az: &str) {
        self.counts
            .entry(network.to_string())
            .or_default()
            .entry(az.to_string())
            .or_insert(0);
    }

    fn credit(&mut self, network: &str, az: &str) {
        self.counts
            .entry(network.to_string())
            .or_default()
            .entry(az.to_string())
            .and_modify(|c| *c += 1)
            .or_insert(1);
    }

    fn debit(&mut self, network: &str, az: &str) {
        if let Some(count) = self.counts.get_mut(network).and_then(|n| n.get_mut(az)) {
            *count = count.saturating_sub(1);
        }
    }

    fn count(&self, network: &str, az: &str) -> u32 {
        self.counts.get(network).and_then(|n| n.get(az)).copied().unwrap_or(0)
    }

    /// Even means: for every network, all tracked zones carry the same
    /// count. A zone that received nothing still participates, so a 4/0
    /// split over two zones is uneven.
    fn is_even(&self) -> bool {
        self.counts.values().all(|per_az| {
            let mut values = per_az.values();
            match values.next() {
                None => true,
                Some(first) => values.all(|c| c == first),
            }
        })
    }

    fn describe(&self) -> String {
        let mut out = String::new();
        for (network, per_az) in &self.counts {
            if !out.is_empty() {
                out.push_str("; ");
            }
            let _ = write!(out, "{network}:");
            for (az, count) in per_az {
                let _ = write!(out, " {az}={count}");
            }
        }
        out
    }
}

/// The addresses drawn for one network's needs, in pool order.
struct DrawnNetwork {
    network: NetworkName,
    kind: NetworkKind,
    /// Indices into the plan slice, one per drawn entry.
    instances: Vec<usize>,
    entries: Vec<AddressEntry>,
}

/// Position of an ambiguous address within the drawn set.
struct Ambiguous {
    net: usize,
    entry: usize,
}

/// Commit an address to every remaining need such that the per-network
/// zone distribution is even.
///
/// On success, reservations land on the plans and the drawn addresses are
/// gone from the pool. `PoolExhausted` and `NoEvenDistribution` abort the
/// planning run.
pub fn balance(
    plans: &mut [InstancePlan],
    needs: &[AddressNeed],
    pool: &mut AddressPool,
) -> PlanResult<()> {
    let drawn = draw_addresses(needs, pool)?;

    let mut state = AzAllocationState::default();
    let mut ambiguous = Vec::new();
    for (net_idx, dn) in drawn.iter().enumerate() {
        for (entry_idx, entry) in dn.entries.iter().enumerate() {
            for az in &entry.az_names {
                state.track(&dn.network, az);
            }
            if let Some(az) = entry.fixed_az() {
                state.credit(&dn.network, az);
            } else if entry.is_ambiguous() {
                ambiguous.push(Ambiguous { net: net_idx, entry: entry_idx });
            }
        }
    }

    // Addresses the reuse stage already committed with a pinned zone are
    // part of the distribution the search has to even out.
    for plan in plans.iter() {
        for reservation in &plan.reservations {
            if let Some(az) = &reservation.az {
                if drawn.iter().any(|d| d.network == reservation.network) {
                    state.track(&reservation.network, az);
                    state.credit(&reservation.network, az);
                }
            }
        }
    }

    debug!(needs = needs.len(), ambiguous = ambiguous.len(), "balancing zone assignment");

    let mut pins: Vec<Option<AzName>> = vec![None; ambiguous.len()];
    let mut first_uneven = None;
    if !search(0, &ambiguous, &drawn, &mut state, &mut pins, &mut first_uneven) {
        let detail = first_uneven.unwrap_or_else(|| state.describe());
        warn!(detail = %detail, "no even zone distribution exists");
        return Err(PlanError::NoEvenDistribution(detail));
    }

    let mut pinned: BTreeMap<(usize, usize), AzName> = BTreeMap::new();
    for (amb, pin) in ambiguous.iter().zip(pins) {
        if let Some(az) = pin {
            pinned.insert((amb.net, amb.entry), az);
        }
    }

    for (net_idx, dn) in drawn.into_iter().enumerate() {
        for (entry_idx, (instance, entry)) in
            dn.instances.into_iter().zip(dn.entries).enumerate()
        {
            let az = match pinned.get(&(net_idx, entry_idx)) {
                Some(az) => Some(az.clone()),
                None => entry.fixed_az().cloned(),
            };
            plans[instance].commit(NetworkReservation {
                network: dn.network.clone(),
                kind: dn.kind,
                ip: Some(entry.ip),
                az,
            });
        }
    }

    Ok(())
}

/// Number of multi-AZ addresses a `balance` call over these needs would
/// have to pin. Callers wanting a bound on search size check this before
/// planning; the search itself has no internal deadline.
pub fn ambiguous_address_count(needs: &[AddressNeed], pool: &AddressPool) -> usize {
    let mut per_network: BTreeMap<&str, usize> = BTreeMap::new();
    for need in needs {
        *per_network.entry(need.network.as_str()).or_insert(0) += 1;
    }
    per_network
        .into_iter()
        .filter_map(|(network, count)| pool.network(network).map(|p| (p, count)))
        .map(|(p, count)| {
            p.available().iter().take(count).filter(|e| e.is_ambiguous()).count()
        })
        .sum()
}

fn draw_addresses(needs: &[AddressNeed], pool: &mut AddressPool) -> PlanResult<Vec<DrawnNetwork>> {
    let mut drawn: Vec<DrawnNetwork> = Vec::new();
    for need in needs {
        let pos = match drawn.iter().position(|d| d.network == need.network) {
            Some(pos) => pos,
            None => {
                let net_pool = pool
                    .network(&need.network)
                    .ok_or_else(|| PlanError::UnknownNetwork(need.network.clone()))?;
                drawn.push(DrawnNetwork {
                    network: need.network.clone(),
                    kind: net_pool.kind,
                    instances: Vec::new(),
                    entries: Vec::new(),
                });
                drawn.len() - 1
            }
        };

        let net_pool = pool
            .network_mut(&need.network)
            .ok_or_else(|| PlanError::UnknownNetwork(need.network.clone()))?;
        let entry = net_pool
            .shift()
            .ok_or_else(|| PlanError::PoolExhausted(need.network.clone()))?;
        drawn[pos].instances.push(need.instance);
        drawn[pos].entries.push(entry);
    }
    Ok(drawn)
}

fn search(
    idx: usize,
    ambiguous: &[Ambiguous],
    drawn: &[DrawnNetwork],
    state: &mut AzAllocationState,
    pins: &mut [Option<AzName>],
    first_uneven: &mut Option<String>,
) -> bool {
    let Some(amb) = ambiguous.get(idx) else {
        if state.is_even() {
            return true;
        }
        // Keep the greedy-best attempt for the operator-facing error.
        if first_uneven.is_none() {
            *first_uneven = Some(state.describe());
        }
        return false;
    };

    let dn = &drawn[amb.net];
    let entry = &dn.entries[amb.entry];

    // Least-loaded zone first; stable sort keeps candidate order on ties.
    let mut order: Vec<&AzName> = entry.az_names.iter().collect();
    order.sort_by_key(|az| state.count(&dn.network, az));

    for az in order {
        state.credit(&dn.network, az);
        pins[idx] = Some(az.clone());
        if search(idx + 1, ambiguous, drawn, state, pins, first_uneven) {
            return true;
        }
        state.debit(&dn.network, az);
    }
    pins[idx] = None;
    false
}
