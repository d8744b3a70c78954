//! FleetGrid network domain model.
//!
//! Everything the address planner and the settings resolver agree on lives
//! here: network definitions parsed from deployment configuration, the
//! per-network pools of available static addresses with their AZ
//! membership, and the per-instance plan/reservation types that planning
//! fills in.
//!
//! # Components
//!
//! - **`config`** — Deserialized network configuration (networks, subnets,
//!   AZ scoping, static address lists)
//! - **`pool`** — `AddressPool` construction and mutation during a
//!   planning run
//! - **`types`** — Instance plans, reservations, agent-reported state
//! - **`error`** — Validation errors raised before planning starts

pub mod config;
pub mod error;
pub mod pool;
pub mod types;

pub use config::{NetworkConfig, NetworksConfig, SubnetConfig};
pub use error::{NetworkError, NetworkResult};
pub use pool::{AddressPool, NetworkPool};
pub use types::{
    AddressEntry, AgentNetworkState, AzName, InstancePlan, InstanceUuid, NetworkKind, NetworkName,
    NetworkReservation,
};
