// src/cache.rs
//
// Live Cache (spec.md §4.4): process-wide snapshot map, one writer (the
// poller's completion step) and many readers (the API). Entry
// replacement is a single HashMap insert under the lock, so a reader
// never observes a half-updated snapshot.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::types::{FamilyId, LiveSnapshot, QcStatus, TankId, TelemetryFrame};

static LIVE_CACHE: Lazy<RwLock<HashMap<TankId, LiveSnapshot>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Overwrite the entry for `tank_id` with the frame's decoded values.
pub fn update(tank_id: &str, family: FamilyId, ip: &str, frame: &TelemetryFrame) {
    let snapshot = LiveSnapshot {
        family,
        ip: ip.to_string(),
        ts_utc: Some(frame.ts_utc),
        qc: frame.qc.status,
        values: frame.s.clone(),
    };
    LIVE_CACHE
        .write()
        .unwrap()
        .insert(tank_id.to_string(), snapshot);
}

/// Pre-seed an entry so the API surface is stable before the first poll
/// (spec.md §4.4: utility devices start as `qc=fail, ts_utc=null`).
pub fn seed(tank_id: &str, family: FamilyId, ip: &str) {
    let snapshot = LiveSnapshot {
        family,
        ip: ip.to_string(),
        ts_utc: None,
        qc: QcStatus::Fail,
        values: HashMap::new(),
    };
    LIVE_CACHE
        .write()
        .unwrap()
        .entry(tank_id.to_string())
        .or_insert(snapshot);
}

pub fn get(tank_id: &str) -> Option<LiveSnapshot> {
    LIVE_CACHE.read().unwrap().get(tank_id).cloned()
}

pub fn get_all() -> HashMap<TankId, LiveSnapshot> {
    LIVE_CACHE.read().unwrap().clone()
}

#[cfg(test)]
pub(crate) fn clear_for_test() {
    LIVE_CACHE.write().unwrap().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap as Map;

    fn frame(tank: &str, value: f64) -> TelemetryFrame {
        let mut s = Map::new();
        s.insert("ph".to_string(), value);
        TelemetryFrame {
            ts_utc: Utc::now(),
            schema_ver: 1,
            site_id: "site01".to_string(),
            tank_id: tank.to_string(),
            device_id: format!("ctrl-{}", tank),
            fw: None,
            s,
            qc: crate::types::Qc {
                status: QcStatus::Ok,
                error: None,
            },
        }
    }

    #[test]
    fn seed_does_not_clobber_existing_entry() {
        clear_for_test();
        update("T1", FamilyId::Ctrl, "10.0.0.1", &frame("T1", 7.0));
        seed("T1", FamilyId::Ctrl, "10.0.0.1");
        let snap = get("T1").unwrap();
        assert_eq!(snap.qc, QcStatus::Ok);
    }

    #[test]
    fn update_overwrites_values() {
        clear_for_test();
        update("T2", FamilyId::Util, "10.0.0.2", &frame("T2", 1.0));
        update("T2", FamilyId::Util, "10.0.0.2", &frame("T2", 2.0));
        let snap = get("T2").unwrap();
        assert_eq!(snap.values["ph"], 2.0);
    }
}
