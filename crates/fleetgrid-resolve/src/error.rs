//! Resolver error types.

use thiserror::Error;

use fleetgrid_network::NetworkName;

/// Result type alias for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised while rendering settings or resolving addresses.
///
/// A failing DNS encoder is a deployment defect, not a recoverable
/// condition; resolution never falls back to a raw IP silently.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("reservation references unknown network '{0}'")]
    MissingNetwork(NetworkName),

    #[error("network '{0}' has no address to resolve")]
    MissingAddress(NetworkName),

    #[error("instance has no addressable default network")]
    NoDefaultNetwork,

    #[error("dns encoder error: {0}")]
    Encoder(#[from] anyhow::Error),
}
