use serde::{Deserialize, Serialize};

use crate::commands::settings::get_settings;
use crate::db::KeyValueStore;
use crate::engine::{compute_position_size, SizingParams, SizingResult};
use crate::error::JournalError;
use crate::models::Direction;

/// Calculator form. Balance and risk % fall back to the saved settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSizeRequest {
    #[serde(default)]
    pub account_balance: Option<f64>,
    #[serde(default)]
    pub risk_percent: Option<f64>,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    pub direction: Direction,
    #[serde(default)]
    pub leverage: Option<f64>,
}

pub fn calculate_position_size(
    store: &impl KeyValueStore,
    request: PositionSizeRequest,
) -> Result<SizingResult, JournalError> {
    let settings = get_settings(store)?;

    let mut params = SizingParams::from_settings(
        &settings,
        request.entry_price,
        request.stop_loss_price,
        request.direction,
    );
    if let Some(balance) = request.account_balance {
        params.account_balance = balance;
    }
    if let Some(risk_percent) = request.risk_percent {
        params.risk_percent = risk_percent;
    }
    if let Some(leverage) = request.leverage {
        params = params.with_leverage(leverage);
    }

    let result = compute_position_size(&params)?;
    for warning in &result.warnings {
        log::warn!("Position size warning: {}", warning.message());
    }
    Ok(result)
}
