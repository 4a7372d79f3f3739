// src/alarms/engine.rs
//
// Per-frame rule evaluation, edge-triggered state transitions, and
// end-of-tick batched notification egress (spec.md §4.7).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::connectivity::ConnectivityState;
use super::notify::Notifier;
use super::persist::{load_or_default, save_atomic};
use super::rules::{seeded_rules, AlarmConfig, AlarmConfigError, AlarmRule, RuleKind};
use crate::types::{FamilyId, QcStatus, TankId, TelemetryFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    Alarm,
    Resolved,
}

#[derive(Debug, Clone)]
pub struct AlarmEvent {
    pub kind: AlarmKind,
    pub rule_id: &'static str,
    pub family: FamilyId,
    pub tank_id: TankId,
    pub severity: &'static str,
    pub detail: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct RuleState {
    active: bool,
}

struct Inner {
    config: AlarmConfig,
    rule_states: HashMap<(&'static str, TankId), RuleState>,
    connectivity: ConnectivityState,
    pending: Vec<AlarmEvent>,
}

pub struct AlarmEngine {
    rules: Vec<AlarmRule>,
    inner: Mutex<Inner>,
    config_path: PathBuf,
    connectivity_alarm_ms: i64,
    notifier: Box<dyn Notifier>,
}

impl AlarmEngine {
    pub fn new(config_path: PathBuf, connectivity_alarm_ms: i64, notifier: Box<dyn Notifier>) -> Self {
        let config = load_or_default(&config_path);
        Self {
            rules: seeded_rules(),
            inner: Mutex::new(Inner {
                config,
                rule_states: HashMap::new(),
                connectivity: ConnectivityState::new(),
                pending: Vec::new(),
            }),
            config_path,
            connectivity_alarm_ms,
            notifier,
        }
    }

    pub fn get_thresholds(&self) -> AlarmConfig {
        self.inner.lock().unwrap().config
    }

    pub fn set_thresholds(&self, ph: super::rules::Bounds, temp: super::rules::Bounds, qc_alarms_enabled: bool) -> Result<(), AlarmConfigError> {
        let config = AlarmConfig::validate(ph, temp, qc_alarms_enabled)?;
        {
            let mut inner = self.inner.lock().unwrap();
            inner.config = config;
        }
        if let Err(e) = save_atomic(&self.config_path, &config) {
            tlog!("[alarms] failed to persist thresholds: {}", e);
        }
        Ok(())
    }

    /// Evaluate every applicable rule for one frame. Edge-triggered
    /// events are queued into the pending batch.
    pub fn evaluate_frame(&self, family: FamilyId, frame: &TelemetryFrame) {
        let mut inner = self.inner.lock().unwrap();
        let config = inner.config;

        for rule in &self.rules {
            if let Some(rule_family) = rule.family {
                if rule_family != family {
                    continue;
                }
            }

            let active = match rule.kind {
                RuleKind::MetricThreshold => {
                    let metric = rule.metric.expect("metric_threshold rule must name a metric");
                    let Some(&value) = frame.s.get(metric) else {
                        continue;
                    };
                    if !value.is_finite() {
                        continue;
                    }
                    let bounds = if metric == "ph" { config.ph } else { config.temp };
                    value < bounds.low || value > bounds.high
                }
                RuleKind::QcFail => {
                    // The master toggle gates the rule entirely: when off,
                    // connectivity state is not even updated (spec.md §4.7).
                    if !config.connectivity.qc_alarms_enabled {
                        continue;
                    }
                    let offline = inner
                        .connectivity
                        .observe(&frame.tank_id, frame.qc.status, frame.ts_utc);
                    offline.num_milliseconds() >= self.connectivity_alarm_ms
                }
            };

            let key = (rule.id, frame.tank_id.clone());
            let state = inner.rule_states.entry(key).or_default();
            let was_active = state.active;
            if active == was_active {
                continue;
            }
            state.active = active;

            let kind = if active { AlarmKind::Alarm } else { AlarmKind::Resolved };
            let detail = rule_detail(rule, frame, &config);
            inner.pending.push(AlarmEvent {
                kind,
                rule_id: rule.id,
                family,
                tank_id: frame.tank_id.clone(),
                severity: rule.severity,
                detail,
                ts: frame.ts_utc,
            });
        }
    }

    /// Flush the pending batch: group by (family, tankId), dispatch via
    /// the notifier, then always clear the batch regardless of outcome.
    pub async fn flush(&self) {
        let events = {
            let mut inner = self.inner.lock().unwrap();
            std::mem::take(&mut inner.pending)
        };
        if events.is_empty() {
            return;
        }

        let mut grouped: HashMap<(FamilyId, TankId), Vec<&AlarmEvent>> = HashMap::new();
        for event in &events {
            grouped
                .entry((event.family, event.tank_id.clone()))
                .or_default()
                .push(event);
        }

        let mut body = String::new();
        for ((family, tank_id), tank_events) in &grouped {
            body.push_str(&format!("[{:?}/{}]\n", family, tank_id));
            for e in tank_events.iter().filter(|e| e.kind == AlarmKind::Alarm) {
                body.push_str(&format!("  ALARM {} — {}\n", e.rule_id, e.detail));
            }
            for e in tank_events.iter().filter(|e| e.kind == AlarmKind::Resolved) {
                body.push_str(&format!("  RESOLVED {} — {}\n", e.rule_id, e.detail));
            }
        }

        if let Err(e) = self.notifier.send_batch(&body).await {
            tlog!("[alarms] notification batch failed, discarding: {}", e);
        }
    }
}

fn rule_detail(rule: &AlarmRule, frame: &TelemetryFrame, config: &AlarmConfig) -> String {
    match rule.kind {
        RuleKind::MetricThreshold => {
            let metric = rule.metric.unwrap();
            let value = frame.s.get(metric).copied().unwrap_or(f64::NAN);
            let bounds = if metric == "ph" { config.ph } else { config.temp };
            if value < bounds.low {
                format!("{} {} below low threshold {}", metric, value, bounds.low)
            } else {
                format!("{} {} above high threshold {}", metric, value, bounds.high)
            }
        }
        RuleKind::QcFail => format!("tank {} offline", frame.tank_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::notify::NullNotifier;
    use crate::types::Qc;
    use std::collections::HashMap as Map;

    fn frame(tank: &str, ph: f64, ts: DateTime<Utc>, status: QcStatus) -> TelemetryFrame {
        let mut s = Map::new();
        s.insert("ph".to_string(), ph);
        TelemetryFrame {
            ts_utc: ts,
            schema_ver: 1,
            site_id: "site01".to_string(),
            tank_id: tank.to_string(),
            device_id: format!("ctrl-{}", tank),
            fw: None,
            s,
            qc: Qc { status, error: None },
        }
    }

    fn engine(dir: &std::path::Path) -> AlarmEngine {
        AlarmEngine::new(dir.join("alarmConfig.json"), 60 * 60_000, Box::new(NullNotifier))
    }

    #[tokio::test]
    async fn property_5_alarm_and_resolved_alternate() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let t0 = chrono::Utc::now();

        // ph within bounds: no event.
        engine.evaluate_frame(FamilyId::Ctrl, &frame("T1", 7.0, t0, QcStatus::Ok));
        // ph out of bounds: ALARM.
        engine.evaluate_frame(FamilyId::Ctrl, &frame("T1", 9.0, t0, QcStatus::Ok));
        // still out of bounds: no new event.
        engine.evaluate_frame(FamilyId::Ctrl, &frame("T1", 9.1, t0, QcStatus::Ok));
        // back in bounds: RESOLVED.
        engine.evaluate_frame(FamilyId::Ctrl, &frame("T1", 7.0, t0, QcStatus::Ok));

        let pending = engine.inner.lock().unwrap().pending.len();
        assert_eq!(pending, 2);
    }

    #[tokio::test]
    async fn s4_threshold_update_then_frame_alarms() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine
            .set_thresholds(
                super::super::rules::Bounds { low: 7.2, high: 8.2 },
                super::super::rules::Bounds { low: 18.0, high: 27.5 },
                true,
            )
            .unwrap();

        let t0 = chrono::Utc::now();
        engine.evaluate_frame(FamilyId::Ctrl, &frame("T1", 7.1, t0, QcStatus::Ok));
        let pending = engine.inner.lock().unwrap().pending.clone();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, AlarmKind::Alarm);
    }

    #[tokio::test]
    async fn s3_qc_fail_alarms_after_connectivity_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let t0 = chrono::Utc::now();

        engine.evaluate_frame(FamilyId::Ctrl, &frame("T1", 7.0, t0, QcStatus::Fail));
        assert!(engine.inner.lock().unwrap().pending.is_empty());

        let t1 = t0 + chrono::Duration::minutes(65);
        engine.evaluate_frame(FamilyId::Ctrl, &frame("T1", 7.0, t1, QcStatus::Fail));
        let pending = engine.inner.lock().unwrap().pending.clone();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].rule_id, "qc_fail");
        assert_eq!(pending[0].kind, AlarmKind::Alarm);
    }

    #[tokio::test]
    async fn flush_clears_pending_even_on_notifier_failure() {
        struct Failing;
        #[async_trait::async_trait]
        impl super::super::notify::Notifier for Failing {
            async fn send_batch(&self, _body: &str) -> Result<(), String> {
                Err("boom".to_string())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let engine = AlarmEngine::new(dir.path().join("alarmConfig.json"), 60 * 60_000, Box::new(Failing));
        let t0 = chrono::Utc::now();
        engine.evaluate_frame(FamilyId::Ctrl, &frame("T1", 9.0, t0, QcStatus::Ok));
        assert_eq!(engine.inner.lock().unwrap().pending.len(), 1);

        engine.flush().await;
        assert!(engine.inner.lock().unwrap().pending.is_empty());
    }
}
