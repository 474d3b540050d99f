use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Projection used when only the snapshot timestamp is needed.
#[derive(Debug, Deserialize)]
pub(crate) struct TimestampOnlyDB {
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use alloy_primitives::Address;
    use aum_core::persistence::{SnapshotDocument, SnapshotKey};
    use aum_core::portfolio::{
        FailureMarker, NormalizedLeg, NormalizedPosition, PortfolioSnapshot, PositionOutcome,
    };
    use aum_core::positions::{AsOf, PositionCategory, PositionKey};
    use aum_market_data::{Asset, Network};
    use chrono::{TimeZone, Utc};
    use mongodb::bson;
    use rust_decimal_macros::dec;

    use super::TimestampOnlyDB;

    fn document() -> SnapshotDocument {
        let ts = Utc.with_ymd_and_hms(2025, 3, 4, 10, 5, 0).unwrap();
        let aave = PositionKey::new("aave", Network::Base);
        let curve = PositionKey::new("curve", Network::Etherlink);
        let mut entries = BTreeMap::new();
        entries.insert(
            aave.clone(),
            PositionOutcome::Normalized(NormalizedPosition::new(
                aave,
                AsOf::block(24_000_000, ts),
                vec![NormalizedLeg {
                    asset: "GHO".to_string(),
                    network: Network::Base,
                    category: PositionCategory::Principal,
                    amount: dec!(-200),
                    value: dec!(-199.5),
                    rate: dec!(0.9975),
                    quote_provider: "COWSWAP".to_string(),
                }],
            )),
        );
        entries.insert(
            curve.clone(),
            PositionOutcome::Failed(FailureMarker::read(curve, "unreachable", "timeout")),
        );
        let snapshot = PortfolioSnapshot::new(
            ts,
            Address::ZERO,
            Asset::native("USDC", Network::Etherlink, 6),
            entries,
        );
        let key = SnapshotKey::bucketed(ts, Duration::from_secs(3600));
        SnapshotDocument::new(key, snapshot, ts)
    }

    #[test]
    fn test_document_bson_round_trip() {
        let original = document();
        let encoded = bson::to_document(&original).unwrap();

        assert_eq!(encoded.get_str("_id").unwrap(), "2025-03-04T10:00:00Z");
        assert_eq!(
            encoded.get_document("nav").unwrap().get_str("totalAssetsRaw").unwrap(),
            "-199500000"
        );

        let decoded: SnapshotDocument = bson::from_document(encoded.clone()).unwrap();
        assert_eq!(decoded, original);

        let stamp: TimestampOnlyDB = bson::from_document(encoded).unwrap();
        assert_eq!(stamp.timestamp, original.timestamp);
    }
}
