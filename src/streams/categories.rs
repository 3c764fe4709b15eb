//! Coin category membership stream
//!
//! One `/coins/{id}` request per partition, reduced to the coin's category
//! names. Full-table: membership changes over time, so every run re-fetches.

use serde::Serialize;
use serde_json::Value;

use crate::schema::{FieldType, RecordSchema, SchemaField};
use crate::{CursorValue, Partition};

use super::{
    require_partition, string_array_at, string_at, today_utc, to_record, ParseError, ParseResult,
    Record, Replication, RestStream, SyncMode,
};

pub(crate) const STREAM_NAME: &str = "token_categories";

#[derive(Debug, Serialize)]
struct CategoriesRecord {
    coin_id: String,
    name: Option<String>,
    symbol: Option<String>,
    categories: Vec<String>,
}

/// Category names per configured coin
#[derive(Debug, Default)]
pub struct TokenCategoriesStream;

impl TokenCategoriesStream {
    /// Build the stream
    pub fn new() -> Self {
        Self
    }
}

impl RestStream for TokenCategoriesStream {
    fn name(&self) -> &'static str {
        STREAM_NAME
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["coin_id"]
    }

    fn replication(&self) -> Replication {
        Replication::FullTable
    }

    fn mode(&self) -> SyncMode {
        SyncMode::PartitionSnapshot {
            once_per_day: false,
        }
    }

    fn schema(&self) -> RecordSchema {
        RecordSchema::new(vec![
            SchemaField::required("coin_id", FieldType::String),
            SchemaField::optional("name", FieldType::String),
            SchemaField::optional("symbol", FieldType::String),
            SchemaField::optional("categories", FieldType::StringArray),
        ])
    }

    fn path(&self, partition: Option<&Partition>) -> String {
        match partition {
            Some(p) => format!("/coins/{}", p.token),
            None => String::new(),
        }
    }

    fn query(&self, _token: Option<&CursorValue>) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn signpost(&self) -> CursorValue {
        CursorValue::Date(today_utc())
    }

    fn parse_page(
        &self,
        partition: Option<&Partition>,
        _token: Option<&CursorValue>,
        body: &Value,
    ) -> ParseResult<Vec<Record>> {
        let partition = require_partition(STREAM_NAME, partition)?;
        if !body.is_object() {
            return Err(ParseError::UnexpectedShape {
                stream: STREAM_NAME,
                detail: "body is not a JSON object".to_string(),
            });
        }

        let record = CategoriesRecord {
            coin_id: string_at(body, &["id"]).unwrap_or_else(|| partition.token.clone()),
            name: string_at(body, &["name"]),
            symbol: string_at(body, &["symbol"]),
            categories: string_array_at(body, &["categories"]).unwrap_or_default(),
        };

        Ok(vec![to_record(STREAM_NAME, &record)?])
    }
}
