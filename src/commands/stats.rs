use std::fmt;

use chrono::{DateTime, TimeZone, Utc};

use crate::commands::settings::get_settings;
use crate::commands::trades::load_trades;
use crate::db::KeyValueStore;
use crate::engine::{
    compute_stats_in, filter_by_range, risk_overview, EquityPoint, RiskOverview, StatsRange,
    StatsSummary,
};
use crate::error::JournalError;

/// Equity-curve labels are rendered in `now`'s time zone.
pub fn get_stats<Tz>(
    store: &impl KeyValueStore,
    range: StatsRange,
    now: &DateTime<Tz>,
) -> Result<StatsSummary, JournalError>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let settings = get_settings(store)?;
    let trades = load_trades(store)?;
    let selected = filter_by_range(&trades, range, now.with_timezone(&Utc));

    log::debug!(
        "Computing stats over {} of {} trades ({})",
        selected.len(),
        trades.len(),
        range.label()
    );
    Ok(compute_stats_in(&selected, &settings, &now.timezone()))
}

pub fn get_equity_curve<Tz>(
    store: &impl KeyValueStore,
    range: StatsRange,
    now: &DateTime<Tz>,
) -> Result<Vec<EquityPoint>, JournalError>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    Ok(get_stats(store, range, now)?.equity_curve)
}

/// Day, week and month figures are judged in `now`'s time zone.
pub fn get_risk_overview<Tz: TimeZone>(
    store: &impl KeyValueStore,
    now: &DateTime<Tz>,
) -> Result<RiskOverview, JournalError> {
    let settings = get_settings(store)?;
    let trades = load_trades(store)?;
    let overview = risk_overview(&trades, &settings, now);

    if overview.daily_limit_hit {
        log::warn!(
            "Daily loss limit reached: {:.2} of {:.2}",
            -overview.daily_pnl,
            overview.daily_limit_amount
        );
    }
    Ok(overview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::trades::{create_trade, tests::input};
    use crate::db::MemoryStore;
    use crate::models::Direction;
    use chrono::{Duration, FixedOffset};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_journal_stats() {
        let store = MemoryStore::new();
        let stats = get_stats(&store, StatsRange::All, &now()).unwrap();

        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.equity_curve.len(), 1);
        assert_eq!(stats.equity_curve[0].balance, 10_000.0);
    }

    #[test]
    fn test_stats_and_curve_follow_range() {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = MemoryStore::new();
        for day in 1..=5 {
            create_trade(&store, input(day, Direction::Long, 110.0)).unwrap();
        }

        let all = get_stats(&store, StatsRange::All, &now()).unwrap();
        assert_eq!(all.total_trades, 5);
        assert_eq!(all.win_rate, 100.0);
        assert_eq!(all.max_consecutive_wins, 5);

        let curve = get_equity_curve(&store, StatsRange::All, &now()).unwrap();
        assert_eq!(curve.len(), 6);
        assert_eq!(curve.last().unwrap().balance, 10_050.0);

        let later = now() + Duration::days(120);
        let recent = get_stats(&store, StatsRange::Last3Months, &later).unwrap();
        assert_eq!(recent.total_trades, 0);
    }

    #[test]
    fn test_risk_overview_flags_daily_limit() {
        let store = MemoryStore::new();
        let mut big_loss = input(10, Direction::Long, 80.0);
        big_loss.stop_loss_price = 70.0;
        big_loss.size = 20.0;
        create_trade(&store, big_loss).unwrap();

        let overview = get_risk_overview(&store, &now()).unwrap();
        assert_eq!(overview.daily_pnl, -400.0);
        assert!(overview.daily_limit_hit);
        assert_eq!(overview.daily_usage, 1.0);
    }

    #[test]
    fn test_risk_overview_uses_reference_zone() {
        let store = MemoryStore::new();
        create_trade(&store, input(10, Direction::Short, 99.0)).unwrap();

        // 14:00 UTC on the 10th is already the 11th at UTC+11.
        let sydney_morning = FixedOffset::east_opt(11 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 11, 2, 0, 0)
            .unwrap();
        let overview = get_risk_overview(&store, &sydney_morning).unwrap();
        assert_eq!(overview.daily_pnl, 1.0);

        let next_day = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 11, 2, 0, 0)
            .unwrap();
        let overview = get_risk_overview(&store, &next_day).unwrap();
        assert_eq!(overview.daily_pnl, 0.0);
        assert_eq!(overview.monthly_pnl, 1.0);
    }

    #[test]
    fn test_curve_labels_use_reference_zone() {
        let store = MemoryStore::new();
        create_trade(&store, input(10, Direction::Long, 105.0)).unwrap();

        let utc_curve = get_equity_curve(&store, StatsRange::All, &now()).unwrap();
        assert_eq!(utc_curve[1].label, "May 10");

        let sydney = FixedOffset::east_opt(11 * 3600).unwrap();
        let local_curve =
            get_equity_curve(&store, StatsRange::All, &now().with_timezone(&sydney)).unwrap();
        assert_eq!(local_curve[1].label, "May 11");
    }
}
