use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Trade;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatsRange {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "last20")]
    Last20,
    #[serde(rename = "last50")]
    Last50,
    #[serde(rename = "last3m")]
    Last3Months,
}

impl StatsRange {
    pub fn label(&self) -> &'static str {
        match self {
            StatsRange::All => "All trades",
            StatsRange::Last20 => "Last 20 trades",
            StatsRange::Last50 => "Last 50 trades",
            StatsRange::Last3Months => "Last 3 months",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            StatsRange::All => "all",
            StatsRange::Last20 => "last20",
            StatsRange::Last50 => "last50",
            StatsRange::Last3Months => "last3m",
        }
    }
}

impl fmt::Display for StatsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for StatsRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(StatsRange::All),
            "last20" => Ok(StatsRange::Last20),
            "last50" => Ok(StatsRange::Last50),
            "last3m" => Ok(StatsRange::Last3Months),
            other => Err(format!("Unknown stats range: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
}

fn latest(trades: &[Trade], count: usize) -> Vec<Trade> {
    let mut sorted: Vec<&Trade> = trades.iter().collect();
    sorted.sort_by_key(|trade| trade.timestamp);
    let skip = sorted.len().saturating_sub(count);
    sorted.into_iter().skip(skip).cloned().collect()
}

/// Select the trades a stats range covers. The input is never mutated.
///
/// `Last20`/`Last50` take the most recent trades by timestamp and return them
/// oldest first; `All` and `Last3Months` keep the input order.
pub fn filter_by_range(trades: &[Trade], range: StatsRange, now: DateTime<Utc>) -> Vec<Trade> {
    match range {
        StatsRange::All => trades.to_vec(),
        StatsRange::Last20 => latest(trades, 20),
        StatsRange::Last50 => latest(trades, 50),
        StatsRange::Last3Months => {
            let threshold = now
                .checked_sub_months(Months::new(3))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            trades
                .iter()
                .filter(|trade| trade.timestamp >= threshold)
                .cloned()
                .collect()
        }
    }
}

/// Whether `timestamp` falls in the same calendar period as `reference`,
/// judged in the reference's time zone. Weeks run Monday to Sunday.
pub fn in_same_period<Tz: TimeZone>(
    timestamp: &DateTime<Utc>,
    reference: &DateTime<Tz>,
    period: Period,
) -> bool {
    let local = timestamp.with_timezone(&reference.timezone());
    match period {
        Period::Day => local.date_naive() == reference.date_naive(),
        Period::Week => local.iso_week() == reference.iso_week(),
        Period::Month => local.year() == reference.year() && local.month() == reference.month(),
    }
}

pub fn sum_pnl_for_period<Tz: TimeZone>(
    trades: &[Trade],
    reference: &DateTime<Tz>,
    period: Period,
) -> f64 {
    trades
        .iter()
        .filter(|trade| in_same_period(&trade.timestamp, reference, period))
        .map(|trade| trade.pnl)
        .sum()
}
