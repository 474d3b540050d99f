//! Read-only access to EVM chains.
//!
//! Position providers depend on the narrow [`ChainReader`] trait; the
//! production implementation talks JSON-RPC over HTTP.

mod abi;
mod chain_traits;
mod json_rpc;

pub use chain_traits::{BlockRef, ChainReader};
pub use json_rpc::JsonRpcChainReader;
