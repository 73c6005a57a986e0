//! Fixed fractional position sizing.
//!
//! ```text
//! size = min(balance * risk% / |entry - stop|, balance * leverage / entry)
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Direction, Settings};

/// Risk per trade above this percent of the account gets a warning.
pub const HIGH_RISK_PERCENT: f64 = 3.0;
/// Notional above this multiple of the account gets a warning.
pub const MAX_NOTIONAL_MULTIPLE: f64 = 10.0;

/// Preconditions are checked in declaration order; the first failure is reported.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SizingError {
    #[error("Account balance must be greater than 0")]
    NonPositiveBalance,

    #[error("Risk % per trade must be greater than 0")]
    NonPositiveRiskPercent,

    #[error("Entry price must be greater than 0")]
    NonPositiveEntry,

    #[error("Stop loss price must be greater than 0")]
    NonPositiveStop,

    #[error("Entry and stop loss must differ to carry any risk")]
    EntryEqualsStop,

    #[error("Leverage must be greater than 0")]
    NonPositiveLeverage,

    #[error("Stop loss must sit on the losing side of entry for a {0:?} position")]
    StopOnWrongSide(Direction),

    #[error("Could not compute a position size, check the inputs")]
    InvalidPositionSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizingParams {
    pub account_balance: f64,
    pub risk_percent: f64,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    pub direction: Direction,
    #[serde(default = "default_leverage")]
    pub leverage: f64,
}

fn default_leverage() -> f64 {
    1.0
}

impl SizingParams {
    pub fn new(
        account_balance: f64,
        risk_percent: f64,
        entry_price: f64,
        stop_loss_price: f64,
        direction: Direction,
    ) -> Self {
        Self {
            account_balance,
            risk_percent,
            entry_price,
            stop_loss_price,
            direction,
            leverage: default_leverage(),
        }
    }

    /// Prefill balance and risk % from the saved settings.
    pub fn from_settings(
        settings: &Settings,
        entry_price: f64,
        stop_loss_price: f64,
        direction: Direction,
    ) -> Self {
        Self::new(
            settings.starting_balance(),
            settings.default_risk_per_trade_percent,
            entry_price,
            stop_loss_price,
            direction,
        )
    }

    pub fn with_leverage(mut self, leverage: f64) -> Self {
        self.leverage = leverage;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SizingWarning {
    HighRiskPercent,
    HighNotional,
    MarginLimited,
}

impl SizingWarning {
    pub fn message(&self) -> &'static str {
        match self {
            SizingWarning::HighRiskPercent => {
                "Risking more than 3% per trade. Consider a smaller size."
            }
            SizingWarning::HighNotional => {
                "Notional is above 10x the account balance. High leverage can wipe the account."
            }
            SizingWarning::MarginLimited => {
                "Size is capped by leverage/margin. Raise leverage or accept less than the target risk."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizingResult {
    pub target_risk_amount: f64,
    /// Risk actually taken; below target when the size is margin limited.
    pub risk_amount: f64,
    pub risk_per_unit: f64,
    pub position_size_by_risk: f64,
    pub position_size_by_margin: f64,
    pub position_size: f64,
    pub notional: f64,
    pub estimated_loss: f64,
    pub margin_required: f64,
    pub margin_limited: bool,
    pub warnings: Vec<SizingWarning>,
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

pub fn compute_position_size(params: &SizingParams) -> Result<SizingResult, SizingError> {
    if !is_positive(params.account_balance) {
        return Err(SizingError::NonPositiveBalance);
    }
    if !is_positive(params.risk_percent) {
        return Err(SizingError::NonPositiveRiskPercent);
    }
    if !is_positive(params.entry_price) {
        return Err(SizingError::NonPositiveEntry);
    }
    if !is_positive(params.stop_loss_price) {
        return Err(SizingError::NonPositiveStop);
    }
    if params.entry_price == params.stop_loss_price {
        return Err(SizingError::EntryEqualsStop);
    }
    if !is_positive(params.leverage) {
        return Err(SizingError::NonPositiveLeverage);
    }

    let target_risk_amount = params.account_balance * (params.risk_percent / 100.0);
    let risk_per_unit = params
        .direction
        .risk_per_unit(params.entry_price, params.stop_loss_price);
    if risk_per_unit <= 0.0 {
        return Err(SizingError::StopOnWrongSide(params.direction));
    }

    let position_size_by_risk = target_risk_amount / risk_per_unit;
    let max_notional = params.account_balance * params.leverage;
    let position_size_by_margin = max_notional / params.entry_price;
    let position_size = position_size_by_risk.min(position_size_by_margin);

    if !is_positive(position_size) {
        return Err(SizingError::InvalidPositionSize);
    }

    let notional = position_size * params.entry_price;
    let estimated_loss = position_size * risk_per_unit;
    let margin_required = notional / params.leverage;
    let margin_limited = position_size_by_margin < position_size_by_risk;

    let mut warnings = Vec::new();
    if params.risk_percent > HIGH_RISK_PERCENT {
        warnings.push(SizingWarning::HighRiskPercent);
    }
    if notional > params.account_balance * MAX_NOTIONAL_MULTIPLE {
        warnings.push(SizingWarning::HighNotional);
    }
    if margin_limited {
        warnings.push(SizingWarning::MarginLimited);
    }

    Ok(SizingResult {
        target_risk_amount,
        risk_amount: estimated_loss,
        risk_per_unit,
        position_size_by_risk,
        position_size_by_margin,
        position_size,
        notional,
        estimated_loss,
        margin_required,
        margin_limited,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_params() -> SizingParams {
        SizingParams::new(10_000.0, 1.0, 100.0, 95.0, Direction::Long)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_risk_limited_long() {
        let result = compute_position_size(&long_params()).unwrap();

        assert_close(result.target_risk_amount, 100.0);
        assert_close(result.risk_per_unit, 5.0);
        assert_close(result.position_size_by_risk, 20.0);
        assert_close(result.position_size_by_margin, 100.0);
        assert_close(result.position_size, 20.0);
        assert!(!result.margin_limited);
        assert_close(result.notional, 2_000.0);
        assert_close(result.estimated_loss, 100.0);
        assert_close(result.margin_required, 2_000.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_margin_limited_long() {
        let result = compute_position_size(&long_params().with_leverage(0.1)).unwrap();

        assert_close(result.position_size_by_margin, 10.0);
        assert_close(result.position_size, 10.0);
        assert!(result.margin_limited);
        assert_close(result.estimated_loss, 50.0);
        assert_close(result.risk_amount, 50.0);
        assert!(result.estimated_loss < result.target_risk_amount);
        assert_eq!(result.warnings, vec![SizingWarning::MarginLimited]);
    }

    #[test]
    fn test_short_position() {
        let params = SizingParams::new(5_000.0, 2.0, 65_000.0, 66_000.0, Direction::Short)
            .with_leverage(5.0);
        let result = compute_position_size(&params).unwrap();

        assert_close(result.risk_per_unit, 1_000.0);
        assert_close(result.position_size, 0.1);
        assert_close(result.margin_required, 6_500.0 / 5.0);
    }

    #[test]
    fn test_size_never_exceeds_either_cap() {
        for leverage in [0.05, 0.5, 1.0, 3.0, 20.0] {
            for stop in [50.0, 90.0, 99.0, 99.9] {
                let params = SizingParams::new(10_000.0, 1.5, 100.0, stop, Direction::Long)
                    .with_leverage(leverage);
                let result = compute_position_size(&params).unwrap();
                assert!(result.position_size <= result.position_size_by_margin);
                assert!(result.position_size <= result.position_size_by_risk);
                assert_eq!(compute_position_size(&params).unwrap(), result);
            }
        }
    }

    #[test]
    fn test_validation_order() {
        let mut params = SizingParams::new(0.0, 0.0, 0.0, 0.0, Direction::Long).with_leverage(0.0);
        assert_eq!(compute_position_size(&params), Err(SizingError::NonPositiveBalance));

        params.account_balance = 1_000.0;
        assert_eq!(compute_position_size(&params), Err(SizingError::NonPositiveRiskPercent));

        params.risk_percent = 1.0;
        assert_eq!(compute_position_size(&params), Err(SizingError::NonPositiveEntry));

        params.entry_price = 10.0;
        assert_eq!(compute_position_size(&params), Err(SizingError::NonPositiveStop));

        params.stop_loss_price = 10.0;
        assert_eq!(compute_position_size(&params), Err(SizingError::EntryEqualsStop));

        params.stop_loss_price = 12.0;
        assert_eq!(compute_position_size(&params), Err(SizingError::NonPositiveLeverage));

        params.leverage = 1.0;
        assert_eq!(
            compute_position_size(&params),
            Err(SizingError::StopOnWrongSide(Direction::Long))
        );

        params.direction = Direction::Short;
        assert!(compute_position_size(&params).is_ok());
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let mut params = long_params();
        params.account_balance = f64::INFINITY;
        assert_eq!(compute_position_size(&params), Err(SizingError::NonPositiveBalance));

        let mut params = long_params();
        params.entry_price = f64::NAN;
        assert_eq!(compute_position_size(&params), Err(SizingError::NonPositiveEntry));
    }

    #[test]
    fn test_unrepresentable_size_rejected() {
        let params = SizingParams::new(1e300, 1e300, 1e-300, 2e-300, Direction::Short)
            .with_leverage(1e300);
        assert_eq!(compute_position_size(&params), Err(SizingError::InvalidPositionSize));
    }

    #[test]
    fn test_advisory_warnings() {
        let params = SizingParams::new(1_000.0, 5.0, 100.0, 99.8, Direction::Long)
            .with_leverage(50.0);
        let result = compute_position_size(&params).unwrap();

        assert!(result.warnings.contains(&SizingWarning::HighRiskPercent));
        assert!(result.warnings.contains(&SizingWarning::HighNotional));
        assert!(!result.warnings.contains(&SizingWarning::MarginLimited));
    }

    #[test]
    fn test_from_settings_prefill() {
        let settings = Settings {
            current_account_balance: 0.0,
            initial_account_balance: 8_000.0,
            default_risk_per_trade_percent: 0.5,
            ..Settings::default()
        };
        let params = SizingParams::from_settings(&settings, 100.0, 98.0, Direction::Long);

        assert_eq!(params.account_balance, 8_000.0);
        assert_eq!(params.risk_percent, 0.5);
        assert_eq!(params.leverage, 1.0);
    }

    #[test]
    fn test_error_messages_are_readable() {
        assert_eq!(
            SizingError::NonPositiveLeverage.to_string(),
            "Leverage must be greater than 0"
        );
        assert!(SizingError::StopOnWrongSide(Direction::Short)
            .to_string()
            .contains("Short"));
    }
}
