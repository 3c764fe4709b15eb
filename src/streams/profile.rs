//! Asset profile snapshot stream
//!
//! A once-per-day snapshot of a coin's full profile: metadata, sentiment,
//! CoinGecko scores, TVL ratios, and community/developer counts. The sync
//! loop gates each partition on its `snapshot_date` bookmark, so running the
//! tap more often than daily does not duplicate profiles.

use serde::Serialize;
use serde_json::Value;

use crate::schema::{FieldType, RecordSchema, SchemaField};
use crate::{CursorValue, Partition};

use super::{
    integer_at, number_at, require_partition, string_array_at, string_at, today_utc, to_record,
    value_at, ParseError, ParseResult, Record, Replication, RestStream, SyncMode,
};

pub(crate) const STREAM_NAME: &str = "asset_profile";

#[derive(Debug, Serialize)]
struct RoiFields {
    times: Option<f64>,
    currency: Option<String>,
    percentage: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ProfileRecord {
    snapshot_date: String,
    id: String,
    symbol: Option<String>,
    name: Option<String>,
    categories: Option<Vec<String>>,
    description: Option<String>,
    links: Option<Value>,
    market_cap_rank: Option<i64>,
    country_origin: Option<String>,
    genesis_date: Option<String>,
    sentiment_votes_up_percentage: Option<f64>,
    sentiment_votes_down_percentage: Option<f64>,
    coingecko_score: Option<f64>,
    developer_score: Option<f64>,
    community_score: Option<f64>,
    liquidity_score: Option<f64>,
    public_interest_score: Option<f64>,
    total_value_locked: Option<Value>,
    mcap_to_tvl_ratio: Option<f64>,
    fdv_to_tvl_ratio: Option<f64>,
    roi: Option<RoiFields>,
    community_data_facebook_likes: Option<i64>,
    community_data_twitter_followers: Option<i64>,
    community_data_reddit_subscribers: Option<i64>,
    community_data_telegram_users: Option<i64>,
    developer_data_forks: Option<i64>,
    developer_data_stars: Option<i64>,
    developer_data_subscribers: Option<i64>,
    developer_data_commit_count_4_weeks: Option<i64>,
}

/// Daily flattened profile snapshot per configured coin
#[derive(Debug, Default)]
pub struct AssetProfileStream;

impl AssetProfileStream {
    /// Build the stream
    pub fn new() -> Self {
        Self
    }
}

impl RestStream for AssetProfileStream {
    fn name(&self) -> &'static str {
        STREAM_NAME
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["id", "snapshot_date"]
    }

    fn replication(&self) -> Replication {
        Replication::Incremental {
            key: "snapshot_date",
        }
    }

    fn mode(&self) -> SyncMode {
        SyncMode::PartitionSnapshot { once_per_day: true }
    }

    fn schema(&self) -> RecordSchema {
        RecordSchema::new(vec![
            SchemaField::required("snapshot_date", FieldType::Date),
            SchemaField::required("id", FieldType::String),
            SchemaField::optional("symbol", FieldType::String),
            SchemaField::optional("name", FieldType::String),
            SchemaField::optional("categories", FieldType::StringArray),
            SchemaField::optional("description", FieldType::String),
            SchemaField::optional("links", FieldType::AnyObject),
            SchemaField::optional("market_cap_rank", FieldType::Integer),
            SchemaField::optional("country_origin", FieldType::String),
            SchemaField::optional("genesis_date", FieldType::Date),
            SchemaField::optional("sentiment_votes_up_percentage", FieldType::Number),
            SchemaField::optional("sentiment_votes_down_percentage", FieldType::Number),
            SchemaField::optional("coingecko_score", FieldType::Number),
            SchemaField::optional("developer_score", FieldType::Number),
            SchemaField::optional("community_score", FieldType::Number),
            SchemaField::optional("liquidity_score", FieldType::Number),
            SchemaField::optional("public_interest_score", FieldType::Number),
            SchemaField::optional("total_value_locked", FieldType::AnyObject),
            SchemaField::optional("mcap_to_tvl_ratio", FieldType::Number),
            SchemaField::optional("fdv_to_tvl_ratio", FieldType::Number),
            SchemaField::optional(
                "roi",
                FieldType::Object(vec![
                    SchemaField::optional("times", FieldType::Number),
                    SchemaField::optional("currency", FieldType::String),
                    SchemaField::optional("percentage", FieldType::Number),
                ]),
            ),
            SchemaField::optional("community_data_facebook_likes", FieldType::Integer),
            SchemaField::optional("community_data_twitter_followers", FieldType::Integer),
            SchemaField::optional("community_data_reddit_subscribers", FieldType::Integer),
            SchemaField::optional("community_data_telegram_users", FieldType::Integer),
            SchemaField::optional("developer_data_forks", FieldType::Integer),
            SchemaField::optional("developer_data_stars", FieldType::Integer),
            SchemaField::optional("developer_data_subscribers", FieldType::Integer),
            SchemaField::optional("developer_data_commit_count_4_weeks", FieldType::Integer),
        ])
    }

    fn path(&self, partition: Option<&Partition>) -> String {
        match partition {
            Some(p) => format!("/coins/{}", p.token),
            None => String::new(),
        }
    }

    fn query(&self, _token: Option<&CursorValue>) -> Vec<(&'static str, String)> {
        // Request exactly the panes the flattened record needs; market data
        // is on for TVL and ROI
        vec![
            ("localization", "false".to_string()),
            ("tickers", "false".to_string()),
            ("market_data", "true".to_string()),
            ("community_data", "true".to_string()),
            ("developer_data", "true".to_string()),
            ("sparkline", "false".to_string()),
        ]
    }

    fn signpost(&self) -> CursorValue {
        CursorValue::Date(today_utc())
    }

    fn parse_page(
        &self,
        partition: Option<&Partition>,
        token: Option<&CursorValue>,
        body: &Value,
    ) -> ParseResult<Vec<Record>> {
        let partition = require_partition(STREAM_NAME, partition)?;
        let snapshot_date = match token {
            Some(CursorValue::Date(d)) => d.format("%Y-%m-%d").to_string(),
            _ => {
                return Err(ParseError::UnexpectedShape {
                    stream: STREAM_NAME,
                    detail: "expected a snapshot date token".to_string(),
                })
            }
        };
        if !body.is_object() {
            return Err(ParseError::UnexpectedShape {
                stream: STREAM_NAME,
                detail: "body is not a JSON object".to_string(),
            });
        }

        let roi = value_at(body, &["market_data", "roi"]).map(|_| RoiFields {
            times: number_at(body, &["market_data", "roi", "times"]),
            currency: string_at(body, &["market_data", "roi", "currency"]),
            percentage: number_at(body, &["market_data", "roi", "percentage"]),
        });

        let record = ProfileRecord {
            snapshot_date,
            id: string_at(body, &["id"]).unwrap_or_else(|| partition.token.clone()),
            symbol: string_at(body, &["symbol"]),
            name: string_at(body, &["name"]),
            categories: string_array_at(body, &["categories"]),
            description: string_at(body, &["description", "en"]),
            links: value_at(body, &["links"]).cloned(),
            market_cap_rank: integer_at(body, &["market_cap_rank"]),
            country_origin: string_at(body, &["country_origin"]),
            genesis_date: string_at(body, &["genesis_date"]),
            sentiment_votes_up_percentage: number_at(body, &["sentiment_votes_up_percentage"]),
            sentiment_votes_down_percentage: number_at(body, &["sentiment_votes_down_percentage"]),
            coingecko_score: number_at(body, &["coingecko_score"]),
            developer_score: number_at(body, &["developer_score"]),
            community_score: number_at(body, &["community_score"]),
            liquidity_score: number_at(body, &["liquidity_score"]),
            public_interest_score: number_at(body, &["public_interest_score"]),
            total_value_locked: value_at(body, &["market_data", "total_value_locked"]).cloned(),
            mcap_to_tvl_ratio: number_at(body, &["market_data", "mcap_to_tvl_ratio"]),
            fdv_to_tvl_ratio: number_at(body, &["market_data", "fdv_to_tvl_ratio"]),
            roi,
            community_data_facebook_likes: integer_at(body, &["community_data", "facebook_likes"]),
            community_data_twitter_followers: integer_at(
                body,
                &["community_data", "twitter_followers"],
            ),
            community_data_reddit_subscribers: integer_at(
                body,
                &["community_data", "reddit_subscribers"],
            ),
            community_data_telegram_users: integer_at(
                body,
                &["community_data", "telegram_channel_user_count"],
            ),
            developer_data_forks: integer_at(body, &["developer_data", "forks"]),
            developer_data_stars: integer_at(body, &["developer_data", "stars"]),
            developer_data_subscribers: integer_at(body, &["developer_data", "subscribers"]),
            developer_data_commit_count_4_weeks: integer_at(
                body,
                &["developer_data", "commit_count_4_weeks"],
            ),
        };

        Ok(vec![to_record(STREAM_NAME, &record)?])
    }
}
