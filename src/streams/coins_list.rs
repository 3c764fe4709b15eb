//! Full coin list stream
//!
//! `/coins/list` with platform contract addresses. One request covers the
//! whole catalog (roughly 15k coins), so this is a global snapshot rather
//! than a per-partition fetch. The endpoint needs an authenticated key.

use serde::Serialize;
use serde_json::Value;

use crate::schema::{FieldType, RecordSchema, SchemaField};
use crate::{CursorValue, Partition};

use super::{
    string_at, today_utc, to_record, value_at, ParseError, ParseResult, Record, Replication,
    RestStream, SyncMode,
};

pub(crate) const STREAM_NAME: &str = "coins_list";

#[derive(Debug, Serialize)]
struct CoinListRecord {
    id: String,
    symbol: Option<String>,
    name: Option<String>,
    platforms: Option<Value>,
}

/// The complete coin catalog with contract addresses
#[derive(Debug, Default)]
pub struct CoinsListStream;

impl CoinsListStream {
    /// Build the stream
    pub fn new() -> Self {
        Self
    }
}

impl RestStream for CoinsListStream {
    fn name(&self) -> &'static str {
        STREAM_NAME
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["id"]
    }

    fn replication(&self) -> Replication {
        Replication::FullTable
    }

    fn mode(&self) -> SyncMode {
        SyncMode::GlobalSnapshot
    }

    fn schema(&self) -> RecordSchema {
        RecordSchema::new(vec![
            SchemaField::required("id", FieldType::String),
            SchemaField::optional("symbol", FieldType::String),
            SchemaField::optional("name", FieldType::String),
            SchemaField::optional("platforms", FieldType::AnyObject),
        ])
    }

    fn path(&self, _partition: Option<&Partition>) -> String {
        "/coins/list".to_string()
    }

    fn query(&self, _token: Option<&CursorValue>) -> Vec<(&'static str, String)> {
        vec![("include_platform", "true".to_string())]
    }

    fn signpost(&self) -> CursorValue {
        CursorValue::Date(today_utc())
    }

    fn parse_page(
        &self,
        _partition: Option<&Partition>,
        _token: Option<&CursorValue>,
        body: &Value,
    ) -> ParseResult<Vec<Record>> {
        let items = body.as_array().ok_or(ParseError::UnexpectedShape {
            stream: STREAM_NAME,
            detail: "body is not a JSON array".to_string(),
        })?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let id = string_at(item, &["id"]).ok_or(ParseError::MissingField {
                stream: STREAM_NAME,
                field: "id",
            })?;
            let record = CoinListRecord {
                id,
                symbol: string_at(item, &["symbol"]),
                name: string_at(item, &["name"]),
                platforms: value_at(item, &["platforms"]).cloned(),
            };
            records.push(to_record(STREAM_NAME, &record)?);
        }
        Ok(records)
    }
}
