//! Daily price history stream
//!
//! `/coins/{id}/history` returns one day's snapshot per request. Pagination
//! walks the date cursor one day at a time up to yesterday (UTC); today is
//! never fetched because the day is still accumulating.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::config::{ConfigResult, TapConfig};
use crate::schema::{FieldType, RecordSchema, SchemaField};
use crate::{CursorValue, PageStep, Partition};

use super::{
    number_at, require_partition, string_at, to_record, yesterday_utc, ParseError, ParseResult,
    Record, Replication, RestStream, SyncMode,
};

pub(crate) const STREAM_NAME: &str = "token_history";

/// Market fields, present only when the API returned `market_data` for the day
#[derive(Debug, Serialize)]
struct MarketFields {
    price_usd: Option<f64>,
    price_btc: Option<f64>,
    price_eth: Option<f64>,
    market_cap_usd: Option<f64>,
    total_volume_usd: Option<f64>,
}

#[derive(Debug, Serialize)]
struct CommunityData {
    twitter_followers: Option<f64>,
    reddit_average_posts_48h: Option<f64>,
}

#[derive(Debug, Serialize)]
struct DailyRecord {
    date: String,
    token: String,
    name: Option<String>,
    symbol: Option<String>,
    #[serde(flatten)]
    market: Option<MarketFields>,
    community_data: CommunityData,
}

/// One record per coin per day, flattened from the `/history` snapshot
#[derive(Debug)]
pub struct TokenHistoryStream {
    start_date: NaiveDate,
}

impl TokenHistoryStream {
    /// Build from config; needs `start_date` for first-run seeding
    pub fn from_config(config: &TapConfig) -> ConfigResult<Self> {
        Ok(Self {
            start_date: config.required_start_date(STREAM_NAME)?,
        })
    }
}

impl RestStream for TokenHistoryStream {
    fn name(&self) -> &'static str {
        STREAM_NAME
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["date", "token"]
    }

    fn replication(&self) -> Replication {
        Replication::Incremental { key: "date" }
    }

    fn mode(&self) -> SyncMode {
        SyncMode::CursorPaginated {
            step: PageStep::Days(1),
        }
    }

    fn schema(&self) -> RecordSchema {
        RecordSchema::new(vec![
            SchemaField::required("date", FieldType::Date),
            SchemaField::required("token", FieldType::String),
            SchemaField::optional("name", FieldType::String),
            SchemaField::optional("symbol", FieldType::String),
            SchemaField::optional("price_usd", FieldType::Number),
            SchemaField::optional("price_btc", FieldType::Number),
            SchemaField::optional("price_eth", FieldType::Number),
            SchemaField::optional("market_cap_usd", FieldType::Number),
            SchemaField::optional("total_volume_usd", FieldType::Number),
            SchemaField::optional(
                "community_data",
                FieldType::Object(vec![
                    SchemaField::optional("twitter_followers", FieldType::Number),
                    SchemaField::optional("reddit_average_posts_48h", FieldType::Number),
                ]),
            ),
        ])
    }

    fn path(&self, partition: Option<&Partition>) -> String {
        match partition {
            Some(p) => format!("/coins/{}/history", p.token),
            None => String::new(),
        }
    }

    fn query(&self, token: Option<&CursorValue>) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(CursorValue::Date(d)) = token {
            // The endpoint wants DD-MM-YYYY
            params.push(("date", d.format("%d-%m-%Y").to_string()));
        }
        params.push(("localization", "false".to_string()));
        params
    }

    fn start_cursor(&self) -> Option<CursorValue> {
        Some(CursorValue::Date(self.start_date))
    }

    fn signpost(&self) -> CursorValue {
        CursorValue::Date(yesterday_utc())
    }

    fn parse_page(
        &self,
        partition: Option<&Partition>,
        token: Option<&CursorValue>,
        body: &Value,
    ) -> ParseResult<Vec<Record>> {
        let partition = require_partition(STREAM_NAME, partition)?;
        let date = match token {
            Some(CursorValue::Date(d)) => d.format("%Y-%m-%d").to_string(),
            _ => {
                return Err(ParseError::UnexpectedShape {
                    stream: STREAM_NAME,
                    detail: "expected a date page token".to_string(),
                })
            }
        };
        if !body.is_object() {
            return Err(ParseError::UnexpectedShape {
                stream: STREAM_NAME,
                detail: "body is not a JSON object".to_string(),
            });
        }

        // Days before the coin existed come back without market_data; the
        // record is still emitted so gaps are visible downstream.
        let market = body
            .get("market_data")
            .filter(|v| v.is_object())
            .map(|_| MarketFields {
                price_usd: number_at(body, &["market_data", "current_price", "usd"]),
                price_btc: number_at(body, &["market_data", "current_price", "btc"]),
                price_eth: number_at(body, &["market_data", "current_price", "eth"]),
                market_cap_usd: number_at(body, &["market_data", "market_cap", "usd"]),
                total_volume_usd: number_at(body, &["market_data", "total_volume", "usd"]),
            });

        let record = DailyRecord {
            date,
            token: partition.token.clone(),
            name: string_at(body, &["name"]),
            symbol: string_at(body, &["symbol"]),
            market,
            community_data: CommunityData {
                twitter_followers: number_at(body, &["community_data", "twitter_followers"]),
                reddit_average_posts_48h: number_at(
                    body,
                    &["community_data", "reddit_average_posts_48h"],
                ),
            },
        };

        Ok(vec![to_record(STREAM_NAME, &record)?])
    }
}
