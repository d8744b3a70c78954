//! Validation errors for network configuration and pool construction.

use std::net::IpAddr;

use thiserror::Error;

use crate::types::{AzName, NetworkName};

/// Result type alias for network model operations.
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors detected while building an address pool from configuration.
///
/// All of these are fatal to the deployment-planning run and are raised
/// before any planning (or cloud mutation) happens.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("network '{network}' refers to an unknown availability zone '{az}'")]
    InvalidAzReference { network: NetworkName, az: AzName },

    #[error("subnets on network '{0}' must all either specify availability zones or not")]
    ConflictingAzSpecification(NetworkName),

    #[error("network '{0}' contains both 'az' and 'azs'; choose one")]
    ConflictingAzKeys(NetworkName),

    #[error("network '{0}' refers to an empty 'azs' array")]
    EmptyAzList(NetworkName),

    #[error("network '{network}' lists static address {ip} more than once")]
    DuplicateAddress { network: NetworkName, ip: IpAddr },

    #[error("failed to parse network configuration: {0}")]
    Parse(String),
}
