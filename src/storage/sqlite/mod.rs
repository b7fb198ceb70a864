//! `SQLite` infrastructure for the journal.
//!
//! ## Module Structure
//!
//! - [`connection`]: [`Database`] handle and the single-flight [`ConnectionManager`]
//! - [`schema`]: table, index and FTS creation
//! - [`fts`]: manual maintenance of the `entries_fts` shadow index
//! - [`sql`]: FTS query construction and LIKE escaping
//! - [`entry_row`]: row conversion for [`Entry`](crate::models::Entry)
//! - [`error`]: classification of engine failures
//! - [`layout`]: database file and WAL sidecar paths
//! - [`metrics`]: operation metrics

pub mod connection;
pub mod entry_row;
pub mod error;
pub mod fts;
pub mod layout;
pub mod metrics;
pub mod schema;
pub mod sql;

pub use connection::{ConnectionManager, Database, acquire_lock, configure_connection};
pub use entry_row::{ENTRY_COLUMNS, entry_from_row};
pub use error::{FailureClass, classify, storage_error};
pub use fts::FtsOperation;
pub use layout::DatabaseLayout;
pub use metrics::{record_operation_metrics, record_retry, status_of};
pub use schema::SchemaStatus;
pub use sql::{build_fts_query, escape_like_wildcards, like_pattern};
