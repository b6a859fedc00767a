use {
    crate::{alerts::AlertState, error::Result},
    chrono::Utc,
    serde::{Deserialize, Serialize},
    std::{fs, path::Path},
};

/// Alert state as written to disk between `alerts` runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStateSnapshot {
    pub state: AlertState,
    pub timestamp: i64,
}

/// Save alert state to a pretty-printed JSON file, creating parent directories
pub fn save_alert_state(state: &AlertState, file_path: impl AsRef<Path>) -> Result<()> {
    let path = file_path.as_ref();
    let snapshot = AlertStateSnapshot {
        state: state.clone(),
        timestamp: Utc::now().timestamp(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(&snapshot)?;
    fs::write(path, json)?;

    log::debug!(
        "Saved alert state ({} cooldowns) to {}",
        state.last_alerts.len(),
        path.display()
    );
    Ok(())
}

/// Load alert state; a missing file yields the default (empty) state
pub fn load_alert_state(file_path: impl AsRef<Path>) -> Result<AlertState> {
    let path = file_path.as_ref();
    if !path.exists() {
        log::info!("No existing alert state file found: {}", path.display());
        return Ok(AlertState::default());
    }

    let json = fs::read_to_string(path)?;
    let snapshot: AlertStateSnapshot = serde_json::from_str(&json)?;

    log::info!(
        "Loaded alert state from {} (saved at {})",
        path.display(),
        snapshot.timestamp
    );
    Ok(snapshot.state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{check, AlertConfig};
    use crate::error::RateWatchError;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_default_state() {
        let dir = tempdir().unwrap();
        let state = load_alert_state(dir.path().join("missing.json")).unwrap();
        assert_eq!(state, AlertState::default());
    }

    #[test]
    fn test_state_survives_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("alert_state.json");
        let config = AlertConfig {
            high_threshold: 7.0,
            ..Default::default()
        };
        let (_, state) = check(&config, AlertState::default(), 7.2, 1_741_750_000, None);

        save_alert_state(&state, &path).unwrap();
        let loaded = load_alert_state(&path).unwrap();

        assert_eq!(loaded, state);
        assert_eq!(
            loaded.last_alert(crate::alerts::AlertType::ThresholdHigh),
            Some(1_741_750_000)
        );
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alert_state.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_alert_state(&path).unwrap_err();
        assert!(matches!(err, RateWatchError::Serialization(_)));
    }
}
