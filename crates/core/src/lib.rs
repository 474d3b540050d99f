//! AUM core: position providers, aggregation and snapshot persistence.
//!
//! ```text
//! PositionProvider ──> Aggregator ──(PriceDiscovery)──> PortfolioSnapshot
//!                                                            │
//!                                      PersistenceGateway <──┘
//!                                              │
//!                                        SnapshotStore
//! ```
//!
//! Storage backends implement [`persistence::SnapshotStore`]; the MongoDB
//! one lives in `aum-storage-mongo`.

pub mod chain;
pub mod cycle;
pub mod errors;
pub mod persistence;
pub mod portfolio;
pub mod positions;
pub mod settings;

pub use cycle::{CycleReport, CycleRunner};
pub use errors::{
    AggregateError, ChainError, CycleError, ProviderError, StorageError, StoreError,
};
pub use portfolio::{Aggregator, PortfolioSnapshot};
pub use settings::{AggregatorSettings, PersistenceSettings};
