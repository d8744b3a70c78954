//! Core domain types shared by the planner and the resolver.
//!
//! These types describe one deployment-planning run: which instances need
//! addresses, which addresses they already hold, and the reservations the
//! planner commits. All types are serializable so plans can be persisted
//! or diffed between deployment versions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Name of a network as declared in deployment configuration.
pub type NetworkName = String;

/// Name of an availability zone.
pub type AzName = String;

/// Stable unique identifier of an instance (uuid string).
pub type InstanceUuid = String;

// ── Networks ──────────────────────────────────────────────────────

/// Network kind as it appears in the agent settings payload.
///
/// Settings building and DNS gating match on this enum; there is no
/// open-ended string dispatch on network type anywhere in the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    /// Statically addressed network; addresses come from a declared pool.
    Static,
    /// Addresses are assigned by the IaaS and reported back by the agent.
    Dynamic,
    /// Externally routable addresses, pooled or provider-minted.
    Vip,
}

impl NetworkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkKind::Static => "static",
            NetworkKind::Dynamic => "dynamic",
            NetworkKind::Vip => "vip",
        }
    }
}

/// One static address and the AZs it may legally occupy.
///
/// An empty AZ set means the address is AZ-agnostic (provider-minted VIPs,
/// or networks declared without zone scoping). More than one AZ means the
/// address is ambiguous until the balancer pins a single zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub ip: IpAddr,
    pub az_names: Vec<AzName>,
}

impl AddressEntry {
    /// The single legal AZ, when the address is zone-fixed.
    pub fn fixed_az(&self) -> Option<&AzName> {
        match self.az_names.as_slice() {
            [az] => Some(az),
            _ => None,
        }
    }

    /// Whether the balancer still has to choose a zone for this address.
    pub fn is_ambiguous(&self) -> bool {
        self.az_names.len() > 1
    }
}

// ── Reservations ──────────────────────────────────────────────────

/// The binding of one address to one instance on one network.
///
/// Created by the reuse matcher or the balancer; read by the resolver;
/// never mutated after commit within a planning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkReservation {
    pub network: NetworkName,
    pub kind: NetworkKind,
    /// Dynamic reservations have no concrete address until the agent
    /// reports one.
    pub ip: Option<IpAddr>,
    /// Zone the address was pinned to, when the network is AZ-scoped.
    pub az: Option<AzName>,
}

/// Last network state the agent reported for one network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentNetworkState {
    pub ip: Option<IpAddr>,
    pub netmask: Option<IpAddr>,
    pub gateway: Option<IpAddr>,
}

// ── Instance plans ────────────────────────────────────────────────

/// One instance being deployed, new or pre-existing.
///
/// Carries everything the planner needs to know about the instance going
/// in, and accumulates committed reservations coming out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePlan {
    pub uuid: InstanceUuid,
    pub instance_group: String,
    pub index: u32,
    /// Pinned AZ, if the instance is already placed.
    pub availability_zone: Option<AzName>,
    /// Networks this instance needs an address on, in configuration order.
    pub desired_networks: Vec<NetworkName>,
    /// Addresses held before this deployment, keyed by network name.
    pub existing_addresses: BTreeMap<NetworkName, IpAddr>,
    /// Committed reservations, in commit order.
    pub reservations: Vec<NetworkReservation>,
}

impl InstancePlan {
    pub fn new(uuid: impl Into<InstanceUuid>, instance_group: impl Into<String>, index: u32) -> Self {
        InstancePlan {
            uuid: uuid.into(),
            instance_group: instance_group.into(),
            index,
            availability_zone: None,
            desired_networks: Vec::new(),
            existing_addresses: BTreeMap::new(),
            reservations: Vec::new(),
        }
    }

    /// The committed reservation for a network, if any.
    pub fn reservation(&self, network: &str) -> Option<&NetworkReservation> {
        self.reservations.iter().find(|r| r.network == network)
    }

    /// Commit a reservation. An unplaced instance adopts the zone of its
    /// first AZ-pinned reservation.
    pub fn commit(&mut self, reservation: NetworkReservation) {
        if self.availability_zone.is_none() {
            if let Some(az) = &reservation.az {
                self.availability_zone = Some(az.clone());
            }
        }
        self.reservations.push(reservation);
    }

    /// Whether this plan already holds a reservation on the network.
    pub fn is_reserved(&self, network: &str) -> bool {
        self.reservation(network).is_some()
    }
}
