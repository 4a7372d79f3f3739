// src/families/loader.rs
//
// Scans the config directory for the three recognized `*Config.json`
// files, normalizes devices, applies the ctrl enable-map filter, and
// binds each family to its register map (spec.md §4.8).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use super::types::Family;
use crate::config::GatewayConfig;
use crate::registermap::{RegisterMap, RegisterMapContext};
use crate::types::{DeviceConfigEntry, FamilyId};

#[derive(Debug, thiserror::Error)]
pub enum FamilyLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("register map error: {0}")]
    RegisterMap(#[from] crate::registermap::RegisterMapError),
}

type DeviceConfigFile = HashMap<String, DeviceConfigEntry>;
type EnableMapFile = HashMap<String, bool>;

struct FamilySpec {
    id: FamilyId,
    device_prefix: &'static str,
    config_file: &'static str,
    register_map_file: &'static str,
    filter_by_enable_map: bool,
}

pub fn load_families(
    config_dir: &Path,
    config: &GatewayConfig,
) -> Result<Vec<Family>, FamilyLoadError> {
    let specs = [
        FamilySpec {
            id: FamilyId::Ctrl,
            device_prefix: "ctrl",
            config_file: "tankConfig.json",
            register_map_file: "registerMap.json",
            filter_by_enable_map: config.ctrl_enable_filter,
        },
        FamilySpec {
            id: FamilyId::Util,
            device_prefix: "util",
            config_file: "utilityConfig.json",
            register_map_file: "registerMap.json",
            filter_by_enable_map: config.util_enable_filter,
        },
        FamilySpec {
            id: FamilyId::Bmm,
            device_prefix: "bmm",
            config_file: "bmmConfig.json",
            register_map_file: "registerMap.bmm.json",
            filter_by_enable_map: config.bmm_enable_filter,
        },
    ];

    let mut families = Vec::new();

    for spec in specs {
        let config_path = config_dir.join(spec.config_file);
        if !config_path.is_file() {
            continue;
        }

        let devices_raw: DeviceConfigFile = read_json(&config_path)?;
        let mut devices: Vec<_> = devices_raw
            .into_iter()
            .map(|(tank_id, entry)| entry.into_device(tank_id, 502))
            .collect();

        if spec.filter_by_enable_map {
            let enable_path = config_dir.join("enableMap.json");
            let enable_map: EnableMapFile = if enable_path.is_file() {
                read_json(&enable_path)?
            } else {
                HashMap::new()
            };
            devices.retain(|d| *enable_map.get(&d.tank_id).unwrap_or(&false));
        }

        if devices.is_empty() {
            tlog!(
                "[families] family '{}' has zero enabled devices, excluding from polling",
                spec.device_prefix
            );
            continue;
        }

        let map_path = config_dir.join(spec.register_map_file);
        let register_map = RegisterMap::load(&map_path)?;
        let blocks = register_map.get_blocks();
        let map_ctx = Arc::new(RegisterMapContext::new(register_map));

        families.push(Family {
            id: spec.id,
            device_prefix: spec.device_prefix,
            map: map_ctx,
            blocks,
            devices,
        });
    }

    Ok(families)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &PathBuf) -> Result<T, FamilyLoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| FamilyLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| FamilyLoadError::Parse {
        path: path.display().to_string(),
        source,
    })
}
