use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::settings::{get_settings, update_settings};
use crate::commands::trades::{load_trades, save_trades};
use crate::db::records;
use crate::db::KeyValueStore;
use crate::error::JournalError;
use crate::models::{Settings, Trade};

pub const BACKUP_FORMAT_VERSION: &str = "1.0.0";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupFile {
    settings: Settings,
    trades: Vec<Trade>,
    export_date: DateTime<Utc>,
    version: &'static str,
}

/// Sections are optional so a partial backup still imports.
#[derive(Debug, Deserialize)]
struct BackupSections {
    #[serde(default)]
    settings: Option<Value>,
    #[serde(default)]
    trades: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub settings_updated: bool,
    pub trades_imported: usize,
}

pub fn export_all_data(store: &impl KeyValueStore) -> Result<String, JournalError> {
    let backup = BackupFile {
        settings: get_settings(store)?,
        trades: load_trades(store)?,
        export_date: Utc::now(),
        version: BACKUP_FORMAT_VERSION,
    };

    log::info!("Exporting {} trades", backup.trades.len());
    Ok(serde_json::to_string_pretty(&backup)?)
}

/// Restore a backup: settings are replaced, trades are upserted by id.
/// Entries written by older builds get the same upgrade as stored records.
pub fn import_all_data(
    store: &impl KeyValueStore,
    json: &str,
) -> Result<ImportResult, JournalError> {
    let sections: BackupSections = serde_json::from_str(json)?;

    // Decode, validate and load everything before writing anything.
    let settings = sections
        .settings
        .map(|value| records::decode_settings(&value.to_string()))
        .transpose()?;
    if let Some(settings) = &settings {
        let errors = settings.validation_errors();
        if !errors.is_empty() {
            return Err(JournalError::InvalidSettings(errors));
        }
    }
    let incoming = sections
        .trades
        .map(|value| records::decode_trades(&value.to_string()))
        .transpose()?
        .unwrap_or_default();
    for trade in &incoming {
        trade.validate()?;
    }
    let mut trades = if incoming.is_empty() {
        Vec::new()
    } else {
        load_trades(store)?
    };

    let settings_updated = match settings {
        Some(settings) => {
            update_settings(store, settings)?;
            true
        }
        None => false,
    };

    let trades_imported = incoming.len();
    if trades_imported > 0 {
        for trade in incoming {
            match trades.iter_mut().find(|existing| existing.id == trade.id) {
                Some(existing) => *existing = trade,
                None => trades.push(trade),
            }
        }
        save_trades(store, &trades)?;
    }

    log::info!(
        "Imported backup: settings {}, {} trades",
        if settings_updated { "replaced" } else { "kept" },
        trades_imported
    );
    Ok(ImportResult {
        settings_updated,
        trades_imported,
    })
}
