use crate::db::records::{self, TRADES_KEY};
use crate::db::KeyValueStore;
use crate::engine::filter_trades;
use crate::error::JournalError;
use crate::models::{Trade, TradeFilters, TradeInput};

pub(crate) fn load_trades(store: &impl KeyValueStore) -> Result<Vec<Trade>, JournalError> {
    match store.get(TRADES_KEY)? {
        Some(raw) => records::decode_trades(&raw),
        None => Ok(Vec::new()),
    }
}

pub(crate) fn save_trades(store: &impl KeyValueStore, trades: &[Trade]) -> Result<(), JournalError> {
    store.set(TRADES_KEY, &records::encode(&trades)?)
}

pub fn get_trades(
    store: &impl KeyValueStore,
    filters: Option<TradeFilters>,
) -> Result<Vec<Trade>, JournalError> {
    let trades = load_trades(store)?;
    Ok(filter_trades(&trades, &filters.unwrap_or_default()))
}

pub fn get_trade(store: &impl KeyValueStore, id: &str) -> Result<Trade, JournalError> {
    load_trades(store)?
        .into_iter()
        .find(|trade| trade.id == id)
        .ok_or_else(|| JournalError::TradeNotFound(id.to_string()))
}

pub fn create_trade(store: &impl KeyValueStore, input: TradeInput) -> Result<Trade, JournalError> {
    input.validate()?;

    let trade = Trade::from_input(input, None);
    let mut trades = load_trades(store)?;
    trades.push(trade.clone());
    save_trades(store, &trades)?;

    log::info!(
        "Created trade {} ({} {:?}, pnl {:.2})",
        trade.id,
        trade.asset,
        trade.direction,
        trade.pnl
    );
    Ok(trade)
}

/// Re-derive the trade from `input`; id is kept.
pub fn update_trade(
    store: &impl KeyValueStore,
    id: &str,
    input: TradeInput,
) -> Result<Trade, JournalError> {
    input.validate()?;

    let mut trades = load_trades(store)?;
    let slot = trades
        .iter_mut()
        .find(|trade| trade.id == id)
        .ok_or_else(|| JournalError::TradeNotFound(id.to_string()))?;
    *slot = Trade::from_input(input, Some(id.to_string()));
    let updated = slot.clone();
    save_trades(store, &trades)?;

    log::info!("Updated trade {}", id);
    Ok(updated)
}

pub fn delete_trade(store: &impl KeyValueStore, id: &str) -> Result<(), JournalError> {
    let mut trades = load_trades(store)?;
    let before = trades.len();
    trades.retain(|trade| trade.id != id);
    if trades.len() == before {
        return Err(JournalError::TradeNotFound(id.to_string()));
    }

    save_trades(store, &trades)?;
    log::info!("Deleted trade {}", id);
    Ok(())
}
