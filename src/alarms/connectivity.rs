// src/alarms/connectivity.rs
//
// ConnectivityState (spec.md §3, §4.7): keyed by tankId, tracks
// consecutive poll failures to drive the offline-duration threshold for
// the qc_fail rule.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{QcStatus, TankId};

#[derive(Debug, Clone, Default)]
struct Entry {
    last_ok: Option<DateTime<Utc>>,
    first_fail: Option<DateTime<Utc>>,
    consecutive_fails: u32,
}

#[derive(Default)]
pub struct ConnectivityState {
    entries: HashMap<TankId, Entry>,
}

impl ConnectivityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update state for one frame's qc status and return the current
    /// continuous offline duration.
    pub fn observe(&mut self, tank_id: &str, status: QcStatus, now: DateTime<Utc>) -> chrono::Duration {
        let entry = self.entries.entry(tank_id.to_string()).or_default();

        match status {
            QcStatus::Ok => {
                entry.last_ok = Some(now);
                entry.first_fail = None;
                entry.consecutive_fails = 0;
            }
            QcStatus::Fail => {
                entry.consecutive_fails += 1;
                if entry.first_fail.is_none() {
                    entry.first_fail = Some(now);
                }
            }
        }

        let since = entry.last_ok.or(entry.first_fail).unwrap_or(now);
        now - since
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn s3_offline_duration_accumulates_across_ticks() {
        let mut state = ConnectivityState::new();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let offline_at_fail = state.observe("T1", QcStatus::Fail, t0);
        assert_eq!(offline_at_fail, chrono::Duration::zero());

        let t1 = t0 + chrono::Duration::minutes(65);
        let offline = state.observe("T1", QcStatus::Fail, t1);
        assert!(offline >= chrono::Duration::minutes(60));
    }

    #[test]
    fn ok_resets_state() {
        let mut state = ConnectivityState::new();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        state.observe("T1", QcStatus::Fail, t0);
        let t1 = t0 + chrono::Duration::minutes(65);
        state.observe("T1", QcStatus::Ok, t1);
        let t2 = t1 + chrono::Duration::minutes(1);
        let offline = state.observe("T1", QcStatus::Fail, t2);
        assert!(offline < chrono::Duration::minutes(60));
    }
}
