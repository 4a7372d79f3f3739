// src/logwriter/rotation.rs
//
// Day-boundary bucketing at UTC-10 (Hawaii Standard Time, no DST), and
// the `telemetry-<family>-<site>-<tank>-<YYYY-MM-DD>.ndjson` path
// pattern (spec.md §4.5).

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};

const HST_OFFSET_SECONDS: i32 = -10 * 3600;

pub fn hst_now() -> DateTime<FixedOffset> {
    hst_of(Utc::now())
}

pub fn hst_of(ts: DateTime<Utc>) -> DateTime<FixedOffset> {
    ts.with_timezone(&FixedOffset::east_opt(HST_OFFSET_SECONDS).unwrap())
}

pub fn log_path_for(log_dir: &Path, family: &str, site: &str, tank: &str, ts: DateTime<Utc>) -> PathBuf {
    let day = hst_of(ts).format("%Y-%m-%d");
    log_dir.join(format!("telemetry-{}-{}-{}-{}.ndjson", family, site, tank, day))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_boundary_is_utc_minus_10() {
        // 09:00 UTC on 2026-07-31 is 23:00 HST on 2026-07-30.
        let ts = Utc.with_ymd_and_hms(2026, 7, 31, 9, 0, 0).unwrap();
        let path = log_path_for(Path::new("/tmp"), "ctrl", "site01", "T1", ts);
        assert!(path.to_string_lossy().contains("2026-07-30"));
    }

    #[test]
    fn just_after_boundary_rolls_to_next_day() {
        // 10:00 UTC on 2026-07-31 is 00:00 HST on 2026-07-31.
        let ts = Utc.with_ymd_and_hms(2026, 7, 31, 10, 0, 0).unwrap();
        let path = log_path_for(Path::new("/tmp"), "ctrl", "site01", "T1", ts);
        assert!(path.to_string_lossy().contains("2026-07-31"));
    }
}
