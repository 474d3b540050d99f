//! MongoDB storage for AUM snapshots.
//!
//! Implements [`aum_core::persistence::SnapshotStore`] over one collection,
//! one document per snapshot key (`_id`).
//!
//! ```text
//! aum-core (PersistenceGateway)
//!        │
//!        ▼
//! storage-mongo (this crate) ──> MongoDB collection
//! ```

pub mod db;
pub mod errors;
pub mod snapshots;

pub use db::{connect, MongoSettings};
pub use snapshots::MongoSnapshotStore;
