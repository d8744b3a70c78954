//! FleetGrid address resolution.
//!
//! Turns committed network reservations into the two things the rest of
//! the system consumes: the per-instance settings payload delivered to
//! agents, and resolved addresses (literal IP or DNS name) for link
//! consumers and DNS record publication.
//!
//! # Components
//!
//! - **`encoder`** — `AddressResolver`, DNS feature gating, and the
//!   external `DnsEncoder` collaborator boundary
//! - **`settings`** — `NetworkSettings` payload construction and the
//!   address-enumeration entry points
//! - **`records`** — DNS record name derivation
//! - **`error`** — Resolution errors

pub mod encoder;
pub mod error;
pub mod records;
pub mod settings;

pub use encoder::{AddressResolver, DnsConfig, DnsEncoder, DnsQuery, GroupType, ResolvedAddress};
pub use error::{ResolveError, ResolveResult};
pub use records::{canonicalize, dns_record_name};
pub use settings::{NetworkSettings, NetworkSettingsEntry};
