use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::engine::range::{sum_pnl_for_period, Period};
use crate::models::{Settings, Trade};

/// Period P&L against the configured loss limits, as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskOverview {
    pub daily_pnl: f64,
    pub weekly_pnl: f64,
    pub monthly_pnl: f64,
    /// Month P&L as a percent of the current balance.
    pub monthly_percent: f64,
    pub daily_limit_amount: f64,
    pub weekly_limit_amount: f64,
    /// Share of the loss limit consumed, clamped to [0, 1].
    pub daily_usage: f64,
    pub weekly_usage: f64,
    pub daily_limit_hit: bool,
}

/// Fraction of `limit` eaten by a loss. Gains consume nothing.
fn loss_usage(pnl: f64, limit: f64) -> f64 {
    if limit <= 0.0 {
        return 0.0;
    }
    ((-pnl).max(0.0) / limit).min(1.0)
}

pub fn risk_overview<Tz: TimeZone>(
    trades: &[Trade],
    settings: &Settings,
    now: &DateTime<Tz>,
) -> RiskOverview {
    let daily_pnl = sum_pnl_for_period(trades, now, Period::Day);
    let weekly_pnl = sum_pnl_for_period(trades, now, Period::Week);
    let monthly_pnl = sum_pnl_for_period(trades, now, Period::Month);

    let monthly_percent = if settings.current_account_balance == 0.0 {
        0.0
    } else {
        monthly_pnl / settings.current_account_balance * 100.0
    };

    let daily_limit_amount = settings.daily_loss_limit();
    let weekly_limit_amount = settings.weekly_loss_limit();

    RiskOverview {
        daily_pnl,
        weekly_pnl,
        monthly_pnl,
        monthly_percent,
        daily_limit_amount,
        weekly_limit_amount,
        daily_usage: loss_usage(daily_pnl, daily_limit_amount),
        weekly_usage: loss_usage(weekly_pnl, weekly_limit_amount),
        daily_limit_hit: daily_limit_amount > 0.0 && -daily_pnl >= daily_limit_amount,
    }
}
