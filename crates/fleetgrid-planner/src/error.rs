//! Planner error types.

use thiserror::Error;

use fleetgrid_network::NetworkName;

/// Result type alias for planning operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors that abort a deployment-planning run.
///
/// None of these are retried; they all surface before any VM is created,
/// so a planning failure never leaves partially provisioned instances.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no addresses left in network '{0}'")]
    PoolExhausted(NetworkName),

    #[error("unable to distribute static addresses evenly across availability zones ({0})")]
    NoEvenDistribution(String),

    #[error("instance plan references unknown network '{0}'")]
    UnknownNetwork(NetworkName),

    #[error("cloud provider error: {0}")]
    Provider(#[from] anyhow::Error),
}
