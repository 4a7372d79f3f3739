// Core data model shared across components (spec.md §3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TankId = String;
pub type PointName = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyId {
    Ctrl,
    Util,
    Bmm,
}

impl FamilyId {
    pub fn device_prefix(&self) -> &'static str {
        match self {
            FamilyId::Ctrl => "ctrl",
            FamilyId::Util => "util",
            FamilyId::Bmm => "bmm",
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.device_prefix()
    }
}

/// A single polled device, normalized from the duck-typed config entry
/// (`spec.md` §9: `string` or `{ip, unitId}` becomes this tagged record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub tank_id: TankId,
    pub ip: String,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_unit_id() -> u8 {
    1
}

fn default_port() -> u16 {
    502
}

/// Raw config-file shape for one device entry: either a bare IP string or
/// an object with ip/unitId. Parsed once at the config boundary and never
/// seen again past `families::loader`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DeviceConfigEntry {
    Ip(String),
    Detailed {
        ip: String,
        #[serde(default, rename = "unitId")]
        unit_id: Option<u8>,
    },
}

impl DeviceConfigEntry {
    pub fn into_device(self, tank_id: TankId, default_port: u16) -> Device {
        match self {
            DeviceConfigEntry::Ip(ip) => Device {
                tank_id,
                ip,
                unit_id: 1,
                port: default_port,
            },
            DeviceConfigEntry::Detailed { ip, unit_id } => Device {
                tank_id,
                ip,
                unit_id: unit_id.unwrap_or(1),
                port: default_port,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum QcStatus {
    Ok,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Qc {
    pub status: QcStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One device-poll result, successful or failed. Produced once per
/// (device, tick); never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub ts_utc: DateTime<Utc>,
    pub schema_ver: u32,
    pub site_id: String,
    pub tank_id: TankId,
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fw: Option<String>,
    pub s: HashMap<PointName, f64>,
    pub qc: Qc,
}

impl TelemetryFrame {
    pub fn device_id_for(prefix: &str, tank_id: &str) -> String {
        format!("{}-{}", prefix, tank_id)
    }
}

/// Per-tank latest decoded snapshot, retained until process exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub family: FamilyId,
    pub ip: String,
    pub ts_utc: Option<DateTime<Utc>>,
    pub qc: QcStatus,
    pub values: HashMap<PointName, f64>,
}
