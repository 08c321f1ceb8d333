//! Core library for csvingest.
//!
//! Validates CSV uploads against a fixed five-column layout and bulk-loads
//! them into a single relational table, plus a one-shot check of the
//! credentials used to reach that table.
//!
//! # Security Guarantees
//! - The connection secret is never logged, serialized or echoed in errors
//! - Secrets are zeroed from memory on drop
//! - A payload that fails validation never causes a database write
//!
//! # Architecture
//! - `payload` / `record`: decode, parse and convert before any connection
//! - `destination`: one connection per call behind the `Destination` trait,
//!   opened through the `Target` factory
//! - `ingest`: the linear routine tying the two together under a timeout
//! - `query`: name search over ingested rows, same connection discipline
//! - `validator`: connect-once credential check

pub mod config;
pub mod destination;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod payload;
pub mod query;
pub mod record;
pub mod response;
#[cfg(feature = "postgresql")]
pub mod validator;

// Re-export commonly used types
pub use config::{CredentialFields, Credentials, IngestOptions, NumericBounds};
pub use destination::{Destination, DestinationKind, Target};
pub use error::{IngestError, Result};
pub use ingest::{IngestSummary, ingest, try_ingest};
pub use logging::init_logging;
pub use payload::{CheckReport, Payload, check_payload, parse_payload};
pub use query::{DEFAULT_SEARCH_LIMIT, search, try_search};
pub use record::{REQUIRED_COLUMNS, Record, StoredRecord};
pub use response::{IngestResponse, QueryResponse, Status};

#[cfg(feature = "postgresql")]
pub use validator::{check_connection, validate_credentials};
