//! Hourly market chart stream
//!
//! `/coins/{id}/market_chart` returns up to `days` days of `[timestamp,
//! value]` pairs counted back from the current moment. Backfills walk an
//! epoch-millisecond cursor in bounded chunks (30 days by default) so one
//! response never has to carry the whole history; each page keeps only the
//! rows inside its own cursor window.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::config::{ConfigResult, TapConfig};
use crate::schema::{FieldType, RecordSchema, SchemaField};
use crate::{CursorValue, PageStep, Partition};

use super::{
    now_epoch_ms, require_partition, to_record, ParseError, ParseResult, Record, Replication,
    RestStream, SyncMode,
};

pub(crate) const STREAM_NAME: &str = "token_hourly";

pub(crate) const MS_PER_DAY: i64 = 86_400_000;

/// The `days` query value needed to cover everything from `floor_ms` to now
pub(crate) fn days_to_cover(floor_ms: i64, now_ms: i64) -> u32 {
    if now_ms <= floor_ms {
        return 1;
    }
    let days = (now_ms - floor_ms) / MS_PER_DAY + 1;
    u32::try_from(days).unwrap_or(u32::MAX)
}

#[derive(Debug, Serialize)]
struct HourlyRecord {
    timestamp: i64,
    token: String,
    price_usd: Option<f64>,
    market_cap_usd: Option<f64>,
    total_volume_usd: Option<f64>,
}

/// Hourly price/cap/volume points, one record per returned price timestamp
#[derive(Debug)]
pub struct TokenHourlyStream {
    start_date: NaiveDate,
    vs_currency: String,
    interval: Option<String>,
    precision: Option<String>,
    chunk_ms: i64,
}

impl TokenHourlyStream {
    /// Build from config; needs `start_date` for first-run seeding
    pub fn from_config(config: &TapConfig) -> ConfigResult<Self> {
        Ok(Self {
            start_date: config.required_start_date(STREAM_NAME)?,
            vs_currency: config.vs_currency.clone(),
            interval: config.interval.clone(),
            precision: config.precision.clone(),
            chunk_ms: i64::from(config.hourly_chunk_days) * MS_PER_DAY,
        })
    }

    /// Lower bound (exclusive) of the window a page token covers
    fn window_floor(&self, token_ms: i64) -> i64 {
        token_ms.saturating_sub(self.chunk_ms).max(0)
    }

    /// Build a timestamp lookup from an array of `[timestamp, value]` pairs,
    /// skipping entries that do not match that shape
    fn pair_lookup(body: &Value, field: &str) -> HashMap<i64, f64> {
        let mut lookup = HashMap::new();
        if let Some(items) = body.get(field).and_then(Value::as_array) {
            for item in items {
                let pair = item.as_array();
                let ts = pair.and_then(|p| p.first()).and_then(Value::as_i64);
                let value = pair.and_then(|p| p.get(1)).and_then(Value::as_f64);
                if let (Some(ts), Some(value)) = (ts, value) {
                    lookup.insert(ts, value);
                }
            }
        }
        lookup
    }
}

impl RestStream for TokenHourlyStream {
    fn name(&self) -> &'static str {
        STREAM_NAME
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["timestamp", "token"]
    }

    fn replication(&self) -> Replication {
        Replication::Incremental { key: "timestamp" }
    }

    fn mode(&self) -> SyncMode {
        SyncMode::CursorPaginated {
            step: PageStep::EpochChunkMs(self.chunk_ms),
        }
    }

    fn schema(&self) -> RecordSchema {
        RecordSchema::new(vec![
            SchemaField::required("timestamp", FieldType::Integer),
            SchemaField::required("token", FieldType::String),
            SchemaField::optional("price_usd", FieldType::Number),
            SchemaField::optional("market_cap_usd", FieldType::Number),
            SchemaField::optional("total_volume_usd", FieldType::Number),
        ])
    }

    fn path(&self, partition: Option<&Partition>) -> String {
        match partition {
            Some(p) => format!("/coins/{}/market_chart", p.token),
            None => String::new(),
        }
    }

    fn query(&self, token: Option<&CursorValue>) -> Vec<(&'static str, String)> {
        let mut params = vec![("vs_currency", self.vs_currency.clone())];
        if let Some(interval) = &self.interval {
            params.push(("interval", interval.clone()));
        }
        if let Some(precision) = &self.precision {
            params.push(("precision", precision.clone()));
        }

        let days = match token {
            Some(CursorValue::Millis(ms)) => {
                days_to_cover(self.window_floor(*ms), now_epoch_ms())
            }
            _ => 1,
        };
        params.push(("days", days.to_string()));
        params
    }

    fn start_cursor(&self) -> Option<CursorValue> {
        let midnight = self.start_date.and_hms_opt(0, 0, 0)?;
        Some(CursorValue::Millis(midnight.and_utc().timestamp_millis()))
    }

    fn signpost(&self) -> CursorValue {
        CursorValue::Millis(now_epoch_ms())
    }

    fn parse_page(
        &self,
        partition: Option<&Partition>,
        token: Option<&CursorValue>,
        body: &Value,
    ) -> ParseResult<Vec<Record>> {
        let partition = require_partition(STREAM_NAME, partition)?;
        let token_ms = match token {
            Some(CursorValue::Millis(ms)) => *ms,
            _ => {
                return Err(ParseError::UnexpectedShape {
                    stream: STREAM_NAME,
                    detail: "expected an epoch-ms page token".to_string(),
                })
            }
        };

        let prices = body
            .get("prices")
            .and_then(Value::as_array)
            .ok_or(ParseError::MissingField {
                stream: STREAM_NAME,
                field: "prices",
            })?;

        let caps = Self::pair_lookup(body, "market_caps");
        let volumes = Self::pair_lookup(body, "total_volumes");
        let floor = self.window_floor(token_ms);

        let mut records = Vec::new();
        for pair in prices {
            let entry = pair.as_array().filter(|p| p.len() >= 2).ok_or_else(|| {
                ParseError::UnexpectedShape {
                    stream: STREAM_NAME,
                    detail: "prices entry is not a [timestamp, value] pair".to_string(),
                }
            })?;
            let ts = entry[0].as_i64().ok_or_else(|| ParseError::UnexpectedShape {
                stream: STREAM_NAME,
                detail: "prices entry has a non-integer timestamp".to_string(),
            })?;

            // The endpoint counts days back from now; trim to this page's
            // cursor window so pages stay disjoint and re-runs stay bounded.
            if ts <= floor || ts > token_ms {
                continue;
            }

            let record = HourlyRecord {
                timestamp: ts,
                token: partition.token.clone(),
                price_usd: entry[1].as_f64(),
                market_cap_usd: caps.get(&ts).copied(),
                total_volume_usd: volumes.get(&ts).copied(),
            };
            records.push(to_record(STREAM_NAME, &record)?);
        }

        Ok(records)
    }
}
