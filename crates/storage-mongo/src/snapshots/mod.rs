//! MongoDB storage implementation for portfolio snapshots.

mod model;
mod repository;

pub use repository::MongoSnapshotStore;
