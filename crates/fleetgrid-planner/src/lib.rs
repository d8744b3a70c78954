//! FleetGrid address planner.
//!
//! Runs once per deployment update, single-threaded and synchronous, as
//! part of the wider planning phase. Three stages in fixed order:
//!
//! 1. **`reuse`** — rebind pre-existing instances to the addresses they
//!    already hold (cheap, deterministic)
//! 2. **`provision`** — mint external addresses for managed VIP networks
//!    that came up short, so the search below stays free of provider I/O
//! 3. **`balance`** — depth-first backtracking assignment of zones to
//!    multi-AZ addresses until the per-network distribution is even
//!
//! All failures abort before any VM exists, so a planning error never
//! leaves a half-provisioned deployment behind.

pub mod balance;
pub mod error;
pub mod provision;
pub mod reuse;

pub use balance::{ambiguous_address_count, balance};
pub use error::{PlanError, PlanResult};
pub use provision::{CloudProvider, provision_shortfall};
pub use reuse::{AddressNeed, match_existing};

use tracing::{debug, warn};

use fleetgrid_network::{AddressPool, InstancePlan};

/// Run the full planning pipeline over one deployment's instance plans.
///
/// On success every plan carries a committed reservation for each of its
/// desired networks. If the balancer fails after the provisioner minted
/// external addresses, those are released before the error is returned,
/// so a failed run leaks nothing.
pub fn plan(
    plans: &mut [InstancePlan],
    pool: &mut AddressPool,
    provider: &mut dyn CloudProvider,
) -> PlanResult<()> {
    for plan in plans.iter() {
        for network in &plan.desired_networks {
            if pool.network(network).is_none() {
                return Err(PlanError::UnknownNetwork(network.clone()));
            }
        }
    }

    let needs = match_existing(plans, pool);
    debug!(instances = plans.len(), remaining = needs.len(), "reuse matching complete");

    let minted = provision_shortfall(&needs, pool, provider)?;

    if let Err(err) = balance(plans, &needs, pool) {
        for ip in minted {
            if let Err(release_err) = provider.release(ip) {
                warn!(%ip, error = %release_err, "failed to release minted external address");
            }
        }
        return Err(err);
    }

    Ok(())
}
