pub mod filters;
pub mod limits;
pub mod range;
pub mod sizing;
pub mod stats;

pub use filters::filter_trades;
pub use limits::{risk_overview, RiskOverview};
pub use range::{filter_by_range, sum_pnl_for_period, Period, StatsRange};
pub use sizing::{compute_position_size, SizingError, SizingParams, SizingResult, SizingWarning};
pub use stats::{
    compute_stats, compute_stats_in, EquityPoint, HistogramBucket, SetupSlice, StatsSummary,
};

use crate::models::{Outcome, Trade};

/// Classify a trade by the sign of its P&L.
pub fn derive_outcome(trade: &Trade) -> Outcome {
    trade.outcome()
}
