//! Market discovery streams (pro tier)
//!
//! `new_listings` captures coins recently added to the catalog; `top_movers`
//! captures the 24h top gainers and losers. Both are point-in-time snapshots
//! tagged with the capture timestamp.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::schema::{FieldType, RecordSchema, SchemaField};
use crate::{CursorValue, Partition};

use super::{
    integer_at, now_epoch_ms, number_at, rfc3339_from_ms, string_at, to_record, ParseError,
    ParseResult, Record, Replication, RestStream, SyncMode,
};

pub(crate) const NEW_LISTINGS_NAME: &str = "new_listings";
pub(crate) const TOP_MOVERS_NAME: &str = "top_movers";

/// The snapshot tag for a page, derived from the page token
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
struct NewListingRecord {
    snapshot_timestamp: String,
    id: String,
    symbol: Option<String>,
    name: Option<String>,
    activated_at: Option<String>,
}

/// Recently listed coins
#[derive(Debug, Default)]
pub struct NewListingsStream;

impl NewListingsStream {
    /// Build the stream
    pub fn new() -> Self {
        Self
    }
}

impl RestStream for NewListingsStream {
    fn name(&self) -> &'static str {
        NEW_LISTINGS_NAME
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["snapshot_timestamp", "id"]
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
            SchemaField::required("id", FieldType::String),
            SchemaField::optional("symbol", FieldType::String),
            SchemaField::optional("name", FieldType::String),
            SchemaField::optional("activated_at", FieldType::DateTime),
        ])
    }

    fn path(&self, _partition: Option<&Partition>) -> String {
        "/coins/list/new".to_string()
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
        let snapshot = snapshot_timestamp(NEW_LISTINGS_NAME, token)?;
        let items = body.as_array().ok_or(ParseError::UnexpectedShape {
            stream: NEW_LISTINGS_NAME,
            detail: "body is not a JSON array".to_string(),
        })?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let id = string_at(item, &["id"]).ok_or(ParseError::MissingField {
                stream: NEW_LISTINGS_NAME,
                field: "id",
            })?;
            // activated_at arrives as epoch seconds
            let activated_at = integer_at(item, &["activated_at"])
                .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
                .map(|dt| dt.to_rfc3339());

            let record = NewListingRecord {
                snapshot_timestamp: snapshot.clone(),
                id,
                symbol: string_at(item, &["symbol"]),
                name: string_at(item, &["name"]),
                activated_at,
            };
            records.push(to_record(NEW_LISTINGS_NAME, &record)?);
        }
        Ok(records)
    }
}

#[derive(Debug, Serialize)]
struct TopMoverRecord {
    snapshot_timestamp: String,
    id: String,
    #[serde(rename = "type")]
    direction: &'static str,
    name: Option<String>,
    symbol: Option<String>,
    image: Option<String>,
    market_cap_rank: Option<i64>,
    usd: Option<f64>,
    usd_24h_vol: Option<f64>,
    usd_24h_change: Option<f64>,
}

/// Top 24h gainers and losers, one record per coin per direction
#[derive(Debug)]
pub struct TopMoversStream {
    vs_currency: String,
}

impl TopMoversStream {
    /// Build the stream for a quote currency
    pub fn new(vs_currency: String) -> Self {
        Self { vs_currency }
    }

    fn shape_movers(
        &self,
        body: &Value,
        field: &'static str,
        direction: &'static str,
        snapshot: &str,
        records: &mut Vec<Record>,
    ) -> ParseResult<()> {
        let Some(items) = body.get(field).and_then(Value::as_array) else {
            return Ok(());
        };
        for item in items {
            let id = string_at(item, &["id"]).ok_or(ParseError::MissingField {
                stream: TOP_MOVERS_NAME,
                field: "id",
            })?;
            let record = TopMoverRecord {
                snapshot_timestamp: snapshot.to_string(),
                id,
                direction,
                name: string_at(item, &["name"]),
                symbol: string_at(item, &["symbol"]),
                image: string_at(item, &["image"]),
                market_cap_rank: integer_at(item, &["market_cap_rank"]),
                usd: number_at(item, &["usd"]),
                usd_24h_vol: number_at(item, &["usd_24h_vol"]),
                usd_24h_change: number_at(item, &["usd_24h_change"]),
            };
            records.push(to_record(TOP_MOVERS_NAME, &record)?);
        }
        Ok(())
    }
}

impl RestStream for TopMoversStream {
    fn name(&self) -> &'static str {
        TOP_MOVERS_NAME
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["snapshot_timestamp", "id", "type"]
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
            SchemaField::required("id", FieldType::String),
            SchemaField::required("type", FieldType::String),
            SchemaField::optional("name", FieldType::String),
            SchemaField::optional("symbol", FieldType::String),
            SchemaField::optional("image", FieldType::String),
            SchemaField::optional("market_cap_rank", FieldType::Integer),
            SchemaField::optional("usd", FieldType::Number),
            SchemaField::optional("usd_24h_vol", FieldType::Number),
            SchemaField::optional("usd_24h_change", FieldType::Number),
        ])
    }

    fn path(&self, _partition: Option<&Partition>) -> String {
        "/coins/top_gainers_losers".to_string()
    }

    fn query(&self, _token: Option<&CursorValue>) -> Vec<(&'static str, String)> {
        vec![("vs_currency", self.vs_currency.clone())]
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
        let snapshot = snapshot_timestamp(TOP_MOVERS_NAME, token)?;
        if !body.is_object() {
            return Err(ParseError::UnexpectedShape {
                stream: TOP_MOVERS_NAME,
                detail: "body is not a JSON object".to_string(),
            });
        }

        let mut records = Vec::new();
        self.shape_movers(body, "top_gainers", "gainer", &snapshot, &mut records)?;
        self.shape_movers(body, "top_losers", "loser", &snapshot, &mut records)?;
        Ok(records)
    }
}
