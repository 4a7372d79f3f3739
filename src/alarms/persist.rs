// src/alarms/persist.rs
//
// Threshold persistence (spec.md §4.7): load-or-default on startup,
// atomic write-through on every `setThresholds` call.

use std::path::Path;

use super::rules::AlarmConfig;

pub fn load_or_default(path: &Path) -> AlarmConfig {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            tlog!("[alarms] failed to parse {}: {}, using defaults", path.display(), e);
            AlarmConfig::default()
        }),
        Err(_) => AlarmConfig::default(),
    }
}

/// Write `config` to `path` atomically: write to a sibling temp file,
/// then rename over the target. Creates the parent directory if needed.
pub fn save_atomic(path: &Path, config: &AlarmConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let text = serde_json::to_string_pretty(config)?;
    std::fs::write(&tmp_path, text)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::rules::{Bounds, ConnectivityConfig};

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(&dir.path().join("nope.json"));
        assert_eq!(config.ph, AlarmConfig::default().ph);
    }

    #[test]
    fn round_trips_through_atomic_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/alarmConfig.json");
        let config = AlarmConfig {
            ph: Bounds { low: 7.0, high: 8.0 },
            temp: Bounds { low: 10.0, high: 20.0 },
            connectivity: ConnectivityConfig { qc_alarms_enabled: false },
        };
        save_atomic(&path, &config).unwrap();
        let reloaded = load_or_default(&path);
        assert_eq!(reloaded.ph.low, 7.0);
        assert!(!reloaded.connectivity.qc_alarms_enabled);
    }
}
