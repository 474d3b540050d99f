use std::fmt;

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::network::Network;

/// Largest scale a `Decimal` can carry.
const MAX_DECIMALS: u8 = 28;

/// Errors converting between raw on-chain integers and decimal amounts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Raw amount {raw} does not fit a decimal with {decimals} decimals")]
    Overflow { raw: String, decimals: u8 },

    #[error("Unsupported token decimals: {0}")]
    UnsupportedDecimals(u8),

    #[error("Negative amount {0} has no raw representation")]
    Negative(Decimal),
}

/// A token or native coin on a specific network.
///
/// `address` is `None` for the chain's native coin.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub symbol: String,
    pub network: Network,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    pub decimals: u8,
}

impl Asset {
    pub fn token(symbol: &str, network: Network, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            network,
            address: Some(address),
            decimals,
        }
    }

    pub fn native(symbol: &str, network: Network, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            network,
            address: None,
            decimals,
        }
    }

    pub fn is_native(&self) -> bool {
        self.address.is_none()
    }

    /// Same economic asset, regardless of the chain it lives on.
    ///
    /// USDC on Base and USDC on Etherlink both count as USDC.
    pub fn same_asset(&self, other: &Asset) -> bool {
        self.symbol.eq_ignore_ascii_case(&other.symbol)
    }

    /// Scale a raw integer balance by this asset's decimals.
    pub fn from_raw(&self, raw: U256) -> Result<Decimal, AmountError> {
        scale_raw_amount(raw, self.decimals)
    }

    /// Inverse of [`from_raw`](Self::from_raw). Digits beyond `decimals` are truncated.
    pub fn to_raw(&self, amount: Decimal) -> Result<U256, AmountError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(AmountError::Negative(amount));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(AmountError::UnsupportedDecimals(self.decimals));
        }
        let mantissa = U256::from(amount.mantissa().unsigned_abs());
        let scale = amount.scale();
        let decimals = u32::from(self.decimals);
        let ten = U256::from(10u8);
        let raw = if decimals >= scale {
            mantissa * ten.pow(U256::from(decimals - scale))
        } else {
            mantissa / ten.pow(U256::from(scale - decimals))
        };
        Ok(raw)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.network)
    }
}

/// Convert a raw on-chain integer into a decimal amount with `decimals` places.
pub fn scale_raw_amount(raw: U256, decimals: u8) -> Result<Decimal, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }
    let overflow = || AmountError::Overflow {
        raw: raw.to_string(),
        decimals,
    };
    let raw = u128::try_from(raw).map_err(|_| overflow())?;
    let raw = i128::try_from(raw).map_err(|_| overflow())?;
    Decimal::try_from_i128_with_scale(raw, u32::from(decimals))
        .map(|d| d.normalize())
        .map_err(|_| overflow())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use rust_decimal_macros::dec;

    fn usdc() -> Asset {
        Asset::token(
            "USDC",
            Network::Base,
            address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913"),
            6,
        )
    }

    #[test]
    fn test_from_raw_scales_by_decimals() {
        let amount = usdc().from_raw(U256::from(1_234_567_890u64)).unwrap();
        assert_eq!(amount, dec!(1234.56789));
    }

    #[test]
    fn test_from_raw_eighteen_decimals() {
        let raw = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(scale_raw_amount(raw, 18).unwrap(), dec!(1.5));
    }

    #[test]
    fn test_from_raw_overflow() {
        assert!(matches!(
            scale_raw_amount(U256::MAX, 18),
            Err(AmountError::Overflow { .. })
        ));
        assert_eq!(
            scale_raw_amount(U256::from(1u8), 30),
            Err(AmountError::UnsupportedDecimals(30))
        );
    }

    #[test]
    fn test_to_raw_truncates_extra_digits() {
        let raw = usdc().to_raw(dec!(845.1234567)).unwrap();
        assert_eq!(raw, U256::from(845_123_456u64));
        assert!(usdc().to_raw(dec!(-1)).is_err());
    }

    #[test]
    fn test_same_asset_ignores_network_and_case() {
        let other = Asset::native("usdc", Network::Etherlink, 6);
        assert!(usdc().same_asset(&other));
        assert!(!usdc().same_asset(&Asset::native("USDT", Network::Base, 6)));
    }
}
