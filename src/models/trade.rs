use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::JournalError;

pub const DEFAULT_SETUP: &str = "General";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Distance between entry and stop that is lost per unit if the stop is hit.
    /// Negative when the stop sits on the profit side of entry.
    pub fn risk_per_unit(self, entry: f64, stop: f64) -> f64 {
        match self {
            Direction::Long => entry - stop,
            Direction::Short => stop - entry,
        }
    }

    pub fn pnl_per_unit(self, entry: f64, close: f64) -> f64 {
        match self {
            Direction::Long => close - entry,
            Direction::Short => entry - close,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Breakeven,
}

impl Outcome {
    pub fn from_pnl(pnl: f64) -> Self {
        if pnl > 0.0 {
            Outcome::Win
        } else if pnl < 0.0 {
            Outcome::Loss
        } else {
            Outcome::Breakeven
        }
    }
}

fn default_setup() -> String {
    DEFAULT_SETUP.to_string()
}

/// A closed trade. Derived figures are computed once in [`Trade::from_input`]
/// and stored; an edit replaces the whole record under the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub asset: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit_price: Option<f64>,
    pub size: f64,
    pub close_price: f64,

    pub pnl: f64,
    pub pnl_percent: f64,
    pub risk_amount: f64,
    pub r_multiple: f64,

    #[serde(default = "default_setup")]
    pub setup: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Raw trade as entered in the journal form, before derived fields exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeInput {
    pub timestamp: DateTime<Utc>,
    pub asset: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: Option<f64>,
    pub size: f64,
    pub close_price: f64,
    #[serde(default)]
    pub setup: String,
    /// Comma separated.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub notes: String,
}

impl TradeInput {
    pub fn validate(&self) -> Result<(), JournalError> {
        if self.asset.trim().is_empty() {
            return Err(JournalError::InvalidTrade("asset is required".to_string()));
        }
        check_levels(
            self.direction,
            self.entry_price,
            self.stop_loss_price,
            self.take_profit_price,
            self.size,
            self.close_price,
        )
    }
}

/// Price, size and stop-side rules shared by form input and stored trades.
fn check_levels(
    direction: Direction,
    entry: f64,
    stop: f64,
    take_profit: Option<f64>,
    size: f64,
    close: f64,
) -> Result<(), JournalError> {
    let prices = [
        ("entry price", entry),
        ("stop loss price", stop),
        ("size", size),
        ("close price", close),
    ];
    for (name, value) in prices {
        if !value.is_finite() || value <= 0.0 {
            return Err(JournalError::InvalidTrade(format!(
                "{} must be greater than 0",
                name
            )));
        }
    }
    if let Some(tp) = take_profit {
        if !tp.is_finite() || tp <= 0.0 {
            return Err(JournalError::InvalidTrade(
                "take profit price must be greater than 0".to_string(),
            ));
        }
    }
    if direction.risk_per_unit(entry, stop) <= 0.0 {
        return Err(JournalError::InvalidTrade(
            "stop loss must be on the losing side of entry".to_string(),
        ));
    }
    Ok(())
}

/// Split a comma separated tag string, dropping blanks. Duplicates are kept.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

pub fn generate_trade_id() -> String {
    format!(
        "TRADE-{}-{}",
        Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4()
    )
}

/// Derived money figures of a trade, computed from its prices and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeFigures {
    pub pnl: f64,
    pub pnl_percent: f64,
    pub risk_amount: f64,
    pub r_multiple: f64,
}

impl TradeFigures {
    pub fn compute(direction: Direction, entry: f64, stop: f64, close: f64, size: f64) -> Self {
        let risk_amount = direction.risk_per_unit(entry, stop).abs() * size;
        let pnl = direction.pnl_per_unit(entry, close) * size;
        let pnl_percent = if entry == 0.0 {
            0.0
        } else {
            pnl / (entry * size) * 100.0
        };
        let r_multiple = if risk_amount == 0.0 {
            0.0
        } else {
            pnl / risk_amount
        };

        Self {
            pnl,
            pnl_percent,
            risk_amount,
            r_multiple,
        }
    }
}

impl Trade {
    /// Build a trade from validated form input. Pass the existing id when
    /// editing so the record keeps its identity.
    pub fn from_input(input: TradeInput, id: Option<String>) -> Self {
        let figures = TradeFigures::compute(
            input.direction,
            input.entry_price,
            input.stop_loss_price,
            input.close_price,
            input.size,
        );
        let setup = if input.setup.trim().is_empty() {
            default_setup()
        } else {
            input.setup.trim().to_string()
        };
        let notes = if input.notes.trim().is_empty() {
            None
        } else {
            Some(input.notes)
        };

        Trade {
            id: id.unwrap_or_else(generate_trade_id),
            timestamp: input.timestamp,
            asset: input.asset.trim().to_string(),
            direction: input.direction,
            entry_price: input.entry_price,
            stop_loss_price: input.stop_loss_price,
            take_profit_price: input.take_profit_price,
            size: input.size,
            close_price: input.close_price,
            pnl: figures.pnl,
            pnl_percent: figures.pnl_percent,
            risk_amount: figures.risk_amount,
            r_multiple: figures.r_multiple,
            setup,
            tags: parse_tags(&input.tags),
            notes,
        }
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_pnl(self.pnl)
    }

    /// Check a trade that did not come through [`TradeInput`], such as a
    /// restored backup entry.
    pub fn validate(&self) -> Result<(), JournalError> {
        check_levels(
            self.direction,
            self.entry_price,
            self.stop_loss_price,
            self.take_profit_price,
            self.size,
            self.close_price,
        )
        .map_err(|e| match e {
            JournalError::InvalidTrade(msg) => {
                JournalError::InvalidTrade(format!("{}: {}", self.id, msg))
            }
            other => other,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Date,
    Pnl,
    RMultiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeFilters {
    #[serde(default)]
    pub asset: String,
    /// `None` keeps every outcome.
    #[serde(default)]
    pub outcome: Option<Outcome>,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_direction: SortDirection,
}
