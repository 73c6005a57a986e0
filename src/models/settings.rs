use serde::{Deserialize, Serialize};

/// Account settings. One instance exists; saving replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub initial_account_balance: f64,
    pub current_account_balance: f64,
    pub default_risk_per_trade_percent: f64,
    pub max_daily_loss_percent: f64,
    pub max_weekly_loss_percent: f64,
    pub currency: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            initial_account_balance: 10_000.0,
            current_account_balance: 10_000.0,
            default_risk_per_trade_percent: 1.0,
            max_daily_loss_percent: 3.0,
            max_weekly_loss_percent: 6.0,
            currency: "USD".to_string(),
        }
    }
}

impl Settings {
    /// Balance the equity curve and calculator start from. Falls back to the
    /// initial balance when the current one is unset.
    pub fn starting_balance(&self) -> f64 {
        if self.current_account_balance.is_finite() && self.current_account_balance != 0.0 {
            self.current_account_balance
        } else {
            self.initial_account_balance
        }
    }

    pub fn daily_loss_limit(&self) -> f64 {
        self.current_account_balance * (self.max_daily_loss_percent / 100.0)
    }

    pub fn weekly_loss_limit(&self) -> f64 {
        self.current_account_balance * (self.max_weekly_loss_percent / 100.0)
    }

    /// Every problem with the record, one message per field.
    pub fn validation_errors(&self) -> Vec<String> {
        let fields = [
            ("initialAccountBalance", self.initial_account_balance),
            ("currentAccountBalance", self.current_account_balance),
            ("defaultRiskPerTradePercent", self.default_risk_per_trade_percent),
            ("maxDailyLossPercent", self.max_daily_loss_percent),
            ("maxWeeklyLossPercent", self.max_weekly_loss_percent),
        ];

        let mut errors: Vec<String> = fields
            .iter()
            .filter(|(_, value)| !value.is_finite() || *value <= 0.0)
            .map(|(name, _)| format!("{} must be greater than 0", name))
            .collect();

        if self.currency.trim().is_empty() {
            errors.push("currency is required".to_string());
        }

        errors
    }
}
