//! Market intelligence streams
//!
//! `trending` captures the coins currently surfacing in CoinGecko search,
//! ranked by position; `derivatives` captures open derivatives tickers with
//! funding rates. Both are timestamped global snapshots available on every
//! tier.

use serde::Serialize;
use serde_json::Value;

use crate::schema::{FieldType, RecordSchema, SchemaField};
use crate::{CursorValue, Partition};

use super::{
    integer_at, now_epoch_ms, number_at, rfc3339_from_ms, string_at, to_record, ParseError,
    ParseResult, Record, Replication, RestStream, SyncMode,
};

pub(crate) const TRENDING_NAME: &str = "trending";
pub(crate) const DERIVATIVES_NAME: &str = "derivatives";

fn snapshot_timestamp(stream: &'static str, token: Option<&CursorValue>) -> ParseResult<String> {
    match token {
        Some(CursorValue::Millis(ms)) => {
            rfc3339_from_ms(*ms).ok_or(ParseError::UnexpectedShape {
                stream,
                detail: "snapshot token is out of timestamp range".to_string(),
            })
        }
        _ => Err(ParseError::UnexpectedShape {
            stream,
            detail: "expected an epoch-ms snapshot token".to_string(),
        }),
    }
}

#[derive(Debug, Serialize)]
struct TrendingRecord {
    snapshot_timestamp: String,
    coin_id: String,
    name: Option<String>,
    symbol: Option<String>,
    market_cap_rank: Option<i64>,
    score: i64,
}

/// Trending search coins, ranked (0 is the top spot)
#[derive(Debug, Default)]
pub struct TrendingStream;

impl TrendingStream {
    /// Build the stream
    pub fn new() -> Self {
        Self
    }
}

impl RestStream for TrendingStream {
    fn name(&self) -> &'static str {
        TRENDING_NAME
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["snapshot_timestamp", "coin_id"]
    }

    fn replication(&self) -> Replication {
        Replication::FullTable
    }

    fn mode(&self) -> SyncMode {
        SyncMode::GlobalSnapshot
    }

    fn schema(&self) -> RecordSchema {
        RecordSchema::new(vec![
            SchemaField::required("snapshot_timestamp", FieldType::DateTime),
            SchemaField::required("coin_id", FieldType::String),
            SchemaField::optional("name", FieldType::String),
            SchemaField::optional("symbol", FieldType::String),
            SchemaField::optional("market_cap_rank", FieldType::Integer),
            SchemaField::required("score", FieldType::Integer),
        ])
    }

    fn path(&self, _partition: Option<&Partition>) -> String {
        "/search/trending".to_string()
    }

    fn query(&self, _token: Option<&CursorValue>) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn signpost(&self) -> CursorValue {
        CursorValue::Millis(now_epoch_ms())
    }

    fn parse_page(
        &self,
        _partition: Option<&Partition>,
        token: Option<&CursorValue>,
        body: &Value,
    ) -> ParseResult<Vec<Record>> {
        let snapshot = snapshot_timestamp(TRENDING_NAME, token)?;
        let coins = body
            .get("coins")
            .and_then(Value::as_array)
            .ok_or(ParseError::MissingField {
                stream: TRENDING_NAME,
                field: "coins",
            })?;

        let mut records = Vec::with_capacity(coins.len());
        for (rank, wrapper) in coins.iter().enumerate() {
            // Each entry wraps the coin under an "item" key
            let coin_id =
                string_at(wrapper, &["item", "id"]).ok_or(ParseError::MissingField {
                    stream: TRENDING_NAME,
                    field: "item.id",
                })?;
            let record = TrendingRecord {
                snapshot_timestamp: snapshot.clone(),
                coin_id,
                name: string_at(wrapper, &["item", "name"]),
                symbol: string_at(wrapper, &["item", "symbol"]),
                market_cap_rank: integer_at(wrapper, &["item", "market_cap_rank"]),
                score: rank as i64,
            };
            records.push(to_record(TRENDING_NAME, &record)?);
        }
        Ok(records)
    }
}

#[derive(Debug, Serialize)]
struct DerivativeRecord {
    snapshot_timestamp: String,
    market: Option<String>,
    symbol: Option<String>,
    price: Option<String>,
    contract_type: Option<String>,
    funding_rate: Option<f64>,
    open_interest: Option<f64>,
    volume_24h: Option<f64>,
}

/// Open derivatives tickers with funding rates
#[derive(Debug, Default)]
pub struct DerivativesStream;

impl DerivativesStream {
    /// Build the stream
    pub fn new() -> Self {
        Self
    }
}

impl RestStream for DerivativesStream {
    fn name(&self) -> &'static str {
        DERIVATIVES_NAME
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["snapshot_timestamp", "market", "symbol"]
    }

    fn replication(&self) -> Replication {
        Replication::FullTable
    }

    fn mode(&self) -> SyncMode {
        SyncMode::GlobalSnapshot
    }

    fn schema(&self) -> RecordSchema {
        RecordSchema::new(vec![
            SchemaField::required("snapshot_timestamp", FieldType::DateTime),
            SchemaField::optional("market", FieldType::String),
            SchemaField::optional("symbol", FieldType::String),
            // The API quotes prices as strings on this endpoint
            SchemaField::optional("price", FieldType::String),
            SchemaField::optional("contract_type", FieldType::String),
            SchemaField::optional("funding_rate", FieldType::Number),
            SchemaField::optional("open_interest", FieldType::Number),
            SchemaField::optional("volume_24h", FieldType::Number),
        ])
    }

    fn path(&self, _partition: Option<&Partition>) -> String {
        "/derivatives".to_string()
    }

    fn query(&self, _token: Option<&CursorValue>) -> Vec<(&'static str, String)> {
        vec![("include_tickers", "all".to_string())]
    }

    fn signpost(&self) -> CursorValue {
        CursorValue::Millis(now_epoch_ms())
    }

    fn parse_page(
        &self,
        _partition: Option<&Partition>,
        token: Option<&CursorValue>,
        body: &Value,
    ) -> ParseResult<Vec<Record>> {
        let snapshot = snapshot_timestamp(DERIVATIVES_NAME, token)?;
        let items = body.as_array().ok_or(ParseError::UnexpectedShape {
            stream: DERIVATIVES_NAME,
            detail: "body is not a JSON array".to_string(),
        })?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let record = DerivativeRecord {
                snapshot_timestamp: snapshot.clone(),
                market: string_at(item, &["market"]),
                symbol: string_at(item, &["symbol"]),
                price: string_at(item, &["price"]),
                contract_type: string_at(item, &["contract_type"]),
                funding_rate: number_at(item, &["funding_rate"]),
                open_interest: number_at(item, &["open_interest"]),
                volume_24h: number_at(item, &["volume_24h"]),
            };
            records.push(to_record(DERIVATIVES_NAME, &record)?);
        }
        Ok(records)
    }
}
