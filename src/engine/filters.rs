use std::cmp::Ordering;

use crate::models::{SortBy, SortDirection, Trade, TradeFilters};

/// Journal table view: filter by asset, tag and outcome, then sort.
pub fn filter_trades(trades: &[Trade], filters: &TradeFilters) -> Vec<Trade> {
    let asset = filters.asset.trim().to_lowercase();
    let tag = filters.tag.trim().to_lowercase();

    let mut filtered: Vec<Trade> = trades
        .iter()
        .filter(|trade| asset.is_empty() || trade.asset.to_lowercase().contains(&asset))
        .filter(|trade| {
            tag.is_empty() || trade.tags.iter().any(|t| t.to_lowercase().contains(&tag))
        })
        .filter(|trade| filters.outcome.is_none_or(|outcome| trade.outcome() == outcome))
        .cloned()
        .collect();

    filtered.sort_by(|a, b| {
        let ordering = match filters.sort_by {
            SortBy::Date => a.timestamp.cmp(&b.timestamp),
            SortBy::Pnl => a.pnl.partial_cmp(&b.pnl).unwrap_or(Ordering::Equal),
            SortBy::RMultiple => a
                .r_multiple
                .partial_cmp(&b.r_multiple)
                .unwrap_or(Ordering::Equal),
        };
        match filters.sort_direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    filtered
}
