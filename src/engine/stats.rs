use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Outcome, Settings, Trade};

pub const UNLABELED_SETUP: &str = "Unlabeled";

/// R-multiple histogram buckets as (label, inclusive upper bound).
pub const HISTOGRAM_BUCKETS: [(&str, f64); 7] = [
    ("≤ -3R", -3.0),
    ("-3R – -1R", -1.0),
    ("-1R – 0R", 0.0),
    ("0R – 1R", 1.0),
    ("1R – 2R", 2.0),
    ("2R – 3R", 3.0),
    ("≥ 3R", f64::INFINITY),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityPoint {
    pub label: String,
    pub balance: f64,
    /// `None` for the starting point.
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub range: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupSlice {
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakevens: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    /// Gross profit over gross loss. `None` when there is profit but no loss.
    pub profit_factor: Option<f64>,
    pub total_r: f64,
    pub average_r: f64,
    pub best_trade: Option<Trade>,
    pub worst_trade: Option<Trade>,
    pub max_consecutive_wins: u32,
    pub max_consecutive_losses: u32,
    pub max_drawdown: f64,
    pub current_drawdown: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub histogram: Vec<HistogramBucket>,
    pub setup_breakdown: Vec<SetupSlice>,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derive the performance summary from a trade list in any order, with
/// equity-curve labels rendered in UTC.
///
/// Trades are replayed oldest first (ties keep their input order) on top of
/// `settings.starting_balance()`. An empty list yields an all-zero summary with
/// a single "Start" equity point.
pub fn compute_stats(trades: &[Trade], settings: &Settings) -> StatsSummary {
    compute_stats_in(trades, settings, &Utc)
}

/// Same as [`compute_stats`], labelling equity points in `zone`.
pub fn compute_stats_in<Tz>(trades: &[Trade], settings: &Settings, zone: &Tz) -> StatsSummary
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut sorted: Vec<&Trade> = trades.iter().collect();
    sorted.sort_by_key(|trade| trade.timestamp);

    let starting_balance = settings.starting_balance();
    let mut running_balance = starting_balance;
    let mut peak_balance = starting_balance;
    let mut max_drawdown = 0.0_f64;
    let mut current_drawdown = 0.0;

    let mut win_streak = 0u32;
    let mut loss_streak = 0u32;
    let mut max_win_streak = 0u32;
    let mut max_loss_streak = 0u32;

    let (mut wins, mut losses, mut breakevens) = (0usize, 0usize, 0usize);
    let mut total_r = 0.0;
    let mut total_pnl = 0.0;
    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;

    let mut best_trade: Option<&Trade> = None;
    let mut worst_trade: Option<&Trade> = None;

    let mut equity_curve = Vec::with_capacity(sorted.len() + 1);
    equity_curve.push(EquityPoint {
        label: "Start".to_string(),
        balance: round_cents(starting_balance),
        timestamp: None,
    });

    for &trade in &sorted {
        running_balance += trade.pnl;
        peak_balance = peak_balance.max(running_balance);
        let drawdown = if peak_balance == 0.0 {
            0.0
        } else {
            (peak_balance - running_balance) / peak_balance * 100.0
        };
        current_drawdown = drawdown;
        max_drawdown = max_drawdown.max(drawdown);

        total_r += trade.r_multiple;
        total_pnl += trade.pnl;

        match trade.outcome() {
            Outcome::Win => {
                wins += 1;
                gross_profit += trade.pnl;
                win_streak += 1;
                loss_streak = 0;
            }
            Outcome::Loss => {
                losses += 1;
                gross_loss += -trade.pnl;
                loss_streak += 1;
                win_streak = 0;
            }
            Outcome::Breakeven => {
                breakevens += 1;
                win_streak = 0;
                loss_streak = 0;
            }
        }
        max_win_streak = max_win_streak.max(win_streak);
        max_loss_streak = max_loss_streak.max(loss_streak);

        if best_trade.is_none_or(|best| trade.r_multiple > best.r_multiple) {
            best_trade = Some(trade);
        }
        if worst_trade.is_none_or(|worst| trade.r_multiple < worst.r_multiple) {
            worst_trade = Some(trade);
        }

        equity_curve.push(EquityPoint {
            label: trade
                .timestamp
                .with_timezone(zone)
                .format("%b %-d")
                .to_string(),
            balance: round_cents(running_balance),
            timestamp: Some(trade.timestamp),
        });
    }

    let total_trades = sorted.len();
    let divisor = total_trades.max(1) as f64;

    let profit_factor = if gross_loss > 0.0 {
        Some(gross_profit / gross_loss)
    } else if gross_profit > 0.0 {
        None
    } else {
        Some(0.0)
    };

    StatsSummary {
        total_trades,
        wins,
        losses,
        breakevens,
        win_rate: wins as f64 / divisor * 100.0,
        total_pnl,
        gross_profit,
        gross_loss,
        profit_factor,
        total_r,
        average_r: total_r / divisor,
        best_trade: best_trade.cloned(),
        worst_trade: worst_trade.cloned(),
        max_consecutive_wins: max_win_streak,
        max_consecutive_losses: max_loss_streak,
        max_drawdown,
        current_drawdown,
        equity_curve,
        histogram: build_histogram(&sorted),
        setup_breakdown: build_setup_breakdown(&sorted),
    }
}

/// Index of the first bucket whose upper bound `r` does not exceed.
fn bucket_index(r: f64) -> usize {
    HISTOGRAM_BUCKETS
        .iter()
        .position(|(_, upper)| r <= *upper)
        .unwrap_or(HISTOGRAM_BUCKETS.len() - 1)
}

fn build_histogram(trades: &[&Trade]) -> Vec<HistogramBucket> {
    let mut counts = [0usize; HISTOGRAM_BUCKETS.len()];
    for trade in trades {
        counts[bucket_index(trade.r_multiple)] += 1;
    }

    HISTOGRAM_BUCKETS
        .iter()
        .zip(counts)
        .map(|((label, _), count)| HistogramBucket {
            range: label.to_string(),
            count,
        })
        .collect()
}

/// Count trades per setup, in the order each setup first appears.
fn build_setup_breakdown(trades: &[&Trade]) -> Vec<SetupSlice> {
    let mut slices: Vec<SetupSlice> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for trade in trades {
        let name = if trade.setup.trim().is_empty() {
            UNLABELED_SETUP
        } else {
            trade.setup.as_str()
        };
        match index.get(name) {
            Some(&i) => slices[i].value += 1,
            None => {
                index.insert(name, slices.len());
                slices.push(SetupSlice {
                    name: name.to_string(),
                    value: 1,
                });
            }
        }
    }

    slices
}
