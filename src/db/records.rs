use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::JournalError;
use crate::models::{Direction, Settings, Trade, TradeFigures, DEFAULT_SETUP};

pub const SETTINGS_KEY: &str = "prm-settings";
pub const TRADES_KEY: &str = "prm-trades";

/// Layout written by this crate. Version 0 is the bare, unwrapped payload.
pub const CURRENT_RECORD_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEnvelope<T> {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub data: T,
}

pub fn encode<T: Serialize>(data: &T) -> Result<String, JournalError> {
    let envelope = RecordEnvelope {
        version: CURRENT_RECORD_VERSION,
        saved_at: Utc::now(),
        data,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Split a stored document into (version, payload).
fn unwrap_envelope(raw: &str) -> Result<(u32, Value), JournalError> {
    let value: Value = serde_json::from_str(raw)?;
    match value {
        Value::Object(mut map) if map.contains_key("version") && map.contains_key("data") => {
            let version = map
                .get("version")
                .and_then(Value::as_u64)
                .ok_or_else(|| JournalError::ParseError("record version is not a number".to_string()))?;
            let version = u32::try_from(version).map_err(|_| JournalError::UnsupportedVersion {
                found: u32::MAX,
                supported: CURRENT_RECORD_VERSION,
            })?;
            let data = map.remove("data").unwrap_or(Value::Null);
            Ok((version, data))
        }
        other => Ok((0, other)),
    }
}

fn decode<T: DeserializeOwned>(
    raw: &str,
    migrate_v0: impl Fn(Value) -> Result<Value, JournalError>,
) -> Result<T, JournalError> {
    let (version, mut data) = unwrap_envelope(raw)?;
    if version > CURRENT_RECORD_VERSION {
        return Err(JournalError::UnsupportedVersion {
            found: version,
            supported: CURRENT_RECORD_VERSION,
        });
    }
    if version == 0 {
        log::info!("Migrating legacy record to version {}", CURRENT_RECORD_VERSION);
        data = migrate_v0(data)?;
    }
    Ok(serde_json::from_value(data)?)
}

pub fn decode_settings(raw: &str) -> Result<Settings, JournalError> {
    decode(raw, |data| {
        // Fields missing from an old save take their defaults.
        let mut merged = serde_json::to_value(Settings::default())?;
        if let (Value::Object(target), Value::Object(source)) = (&mut merged, data) {
            for (key, value) in source {
                if !value.is_null() {
                    target.insert(key, value);
                }
            }
        }
        Ok(merged)
    })
}

pub fn decode_trades(raw: &str) -> Result<Vec<Trade>, JournalError> {
    decode(raw, |data| match data {
        Value::Array(items) => items
            .into_iter()
            .map(migrate_legacy_trade)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Null => Ok(Value::Array(Vec::new())),
        _ => Err(JournalError::ParseError(
            "stored trades are not a list".to_string(),
        )),
    })
}

fn number(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(Value::as_f64)
}

/// Fill what older saves left out: setup, tags, and the derived money figures.
fn migrate_legacy_trade(item: Value) -> Result<Value, JournalError> {
    let Value::Object(mut map) = item else {
        return Err(JournalError::ParseError("stored trade is not an object".to_string()));
    };

    let setup_missing = map
        .get("setup")
        .and_then(Value::as_str)
        .is_none_or(|s| s.trim().is_empty());
    if setup_missing {
        map.insert("setup".to_string(), Value::from(DEFAULT_SETUP));
    }
    if !map.get("tags").is_some_and(Value::is_array) {
        map.insert("tags".to_string(), Value::Array(Vec::new()));
    }

    let derived = ["pnl", "pnlPercent", "riskAmount", "rMultiple"];
    if derived.iter().any(|key| number(&map, key).is_none()) {
        let direction: Direction = map
            .get("direction")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| JournalError::ParseError("stored trade has no direction".to_string()))?;
        let (Some(entry), Some(stop), Some(close), Some(size)) = (
            number(&map, "entryPrice"),
            number(&map, "stopLossPrice"),
            number(&map, "closePrice"),
            number(&map, "size"),
        ) else {
            return Err(JournalError::ParseError(
                "stored trade is missing prices".to_string(),
            ));
        };

        let figures = TradeFigures::compute(direction, entry, stop, close, size);
        let computed = [
            ("pnl", figures.pnl),
            ("pnlPercent", figures.pnl_percent),
            ("riskAmount", figures.risk_amount),
            ("rMultiple", figures.r_multiple),
        ];
        for (key, value) in computed {
            if number(&map, key).is_none() {
                map.insert(key.to_string(), Value::from(value));
            }
        }
    }

    Ok(Value::Object(map))
}
