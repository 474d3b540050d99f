//! Market data models
//!
//! - `network` - Supported chains (Network)
//! - `asset` - Tokens and native coins, raw-amount scaling (Asset)
//! - `quote` - Best-estimate conversion results (Quote)

mod asset;
mod network;
mod quote;

pub use asset::{scale_raw_amount, AmountError, Asset};
pub use network::{Network, UnknownNetwork};
pub use quote::{Quote, IDENTITY_PROVIDER};
