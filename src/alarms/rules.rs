// src/alarms/rules.rs
//
// The seeded rule set and mutable threshold configuration (spec.md §4.7,
// §6: Alarm settings JSON `{ph, temp, connectivity}`).

use serde::{Deserialize, Serialize};

use crate::types::FamilyId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub low: f64,
    pub high: f64,
}

impl Bounds {
    pub fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low < self.high
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(rename = "qcAlarmsEnabled")]
    pub qc_alarms_enabled: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AlarmConfig {
    pub ph: Bounds,
    pub temp: Bounds,
    pub connectivity: ConnectivityConfig,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            ph: Bounds { low: 6.5, high: 8.5 },
            temp: Bounds { low: 15.0, high: 30.0 },
            connectivity: ConnectivityConfig {
                qc_alarms_enabled: true,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AlarmConfigError {
    #[error("ph bounds must be finite with low < high")]
    InvalidPhBounds,
    #[error("temp bounds must be finite with low < high")]
    InvalidTempBounds,
}

impl AlarmConfig {
    pub fn validate(ph: Bounds, temp: Bounds, qc_alarms_enabled: bool) -> Result<Self, AlarmConfigError> {
        if !ph.is_valid() {
            return Err(AlarmConfigError::InvalidPhBounds);
        }
        if !temp.is_valid() {
            return Err(AlarmConfigError::InvalidTempBounds);
        }
        Ok(Self {
            ph,
            temp,
            connectivity: ConnectivityConfig { qc_alarms_enabled },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleKind {
    MetricThreshold,
    QcFail,
}

#[derive(Debug, Clone)]
pub struct AlarmRule {
    pub id: &'static str,
    pub family: Option<FamilyId>,
    pub kind: RuleKind,
    pub metric: Option<&'static str>,
    pub severity: &'static str,
    pub description: &'static str,
}

/// Build the seeded rule set (spec.md §4.7). Thresholds live in
/// `AlarmConfig`, not on the rules themselves, so updating thresholds
/// never requires rebuilding this list.
pub fn seeded_rules() -> Vec<AlarmRule> {
    vec![
        AlarmRule {
            id: "ctrl_ph_out_of_range",
            family: Some(FamilyId::Ctrl),
            kind: RuleKind::MetricThreshold,
            metric: Some("ph"),
            severity: "warning",
            description: "pH out of configured range",
        },
        AlarmRule {
            id: "ctrl_temp_out_of_range",
            family: Some(FamilyId::Ctrl),
            kind: RuleKind::MetricThreshold,
            metric: Some("temp1_C"),
            severity: "warning",
            description: "Temperature out of configured range",
        },
        AlarmRule {
            id: "qc_fail",
            family: None,
            kind: RuleKind::QcFail,
            metric: None,
            severity: "critical",
            description: "Device offline beyond the connectivity threshold",
        },
    ]
}
