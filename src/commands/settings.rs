use crate::db::records::{self, SETTINGS_KEY};
use crate::db::KeyValueStore;
use crate::error::JournalError;
use crate::models::Settings;

/// Saved settings, or the defaults (persisted) when nothing was saved yet.
pub fn get_settings(store: &impl KeyValueStore) -> Result<Settings, JournalError> {
    match store.get(SETTINGS_KEY)? {
        Some(raw) => records::decode_settings(&raw),
        None => {
            log::info!("No saved settings, writing defaults");
            let settings = Settings::default();
            store.set(SETTINGS_KEY, &records::encode(&settings)?)?;
            Ok(settings)
        }
    }
}

/// Replace the settings record wholesale.
pub fn update_settings(
    store: &impl KeyValueStore,
    settings: Settings,
) -> Result<Settings, JournalError> {
    let errors = settings.validation_errors();
    if !errors.is_empty() {
        log::warn!("Rejected settings update: {}", errors.join("; "));
        return Err(JournalError::InvalidSettings(errors));
    }

    store.set(SETTINGS_KEY, &records::encode(&settings)?)?;
    log::info!(
        "Settings saved (balance {} {})",
        settings.current_account_balance,
        settings.currency
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[test]
    fn test_first_read_persists_defaults() {
        let store = MemoryStore::new();
        let settings = get_settings(&store).unwrap();

        assert_eq!(settings, Settings::default());
        assert!(store.get(SETTINGS_KEY).unwrap().is_some());
    }

    #[test]
    fn test_update_replaces_record() {
        let store = MemoryStore::new();
        let updated = Settings {
            current_account_balance: 12_500.0,
            currency: "EUR".to_string(),
            ..Settings::default()
        };

        update_settings(&store, updated.clone()).unwrap();
        assert_eq!(get_settings(&store).unwrap(), updated);
    }

    #[test]
    fn test_invalid_update_lists_every_problem() {
        let store = MemoryStore::new();
        let invalid = Settings {
            default_risk_per_trade_percent: 0.0,
            max_daily_loss_percent: -1.0,
            currency: " ".to_string(),
            ..Settings::default()
        };

        match update_settings(&store, invalid) {
            Err(JournalError::InvalidSettings(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected InvalidSettings, got {:?}", other),
        }
        assert_eq!(store.get(SETTINGS_KEY).unwrap(), None);
    }

    #[test]
    fn test_reads_legacy_browser_save() {
        let store = MemoryStore::new();
        store
            .set(
                SETTINGS_KEY,
                r#"{"initialAccountBalance":5000,"currentAccountBalance":5200,"defaultRiskPerTradePercent":0.5,"maxDailyLossPercent":2,"maxWeeklyLossPercent":5,"currency":"USD"}"#,
            )
            .unwrap();

        let settings = get_settings(&store).unwrap();
        assert_eq!(settings.current_account_balance, 5200.0);
        assert_eq!(settings.default_risk_per_trade_percent, 0.5);
    }
}
