//! Portfolio aggregation: provider readings in, one snapshot out.

mod aggregator;
mod snapshot_model;


pub use aggregator::{Aggregator, USD_EQUIVALENT_PROVIDER};
pub use snapshot_model::{
    CategoryBreakdown, FailureMarker, FailureStage, NormalizedLeg, NormalizedPosition,
    PortfolioSnapshot, PositionOutcome,
};
