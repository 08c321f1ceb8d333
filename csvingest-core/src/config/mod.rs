//! Configuration types for the validator and the ingestion routine.
//!
//! - `CredentialFields` / `Credentials`: the host-supplied credential bundle
//! - `IngestOptions`: destination table, timeouts and optional value bounds
//!
//! # Security
//! Only `Credentials` holds the secret, inside a `Zeroizing` container.
//! `IngestOptions` is safe to log and serialize.

mod credentials;
mod options;

pub use credentials::{CredentialFields, Credentials, DEFAULT_POSTGRES_PORT, PortField};
pub use options::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_TABLE, DEFAULT_VALIDATION_TIMEOUT,
    IngestOptions, NumericBounds, validate_identifier,
};
