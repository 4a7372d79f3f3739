// src/api/logquery.rs
//
// Time-series query over rotated NDJSON log files (spec.md §4.9, §8 S5):
// a linear scan of every file matching `*-<tankId>-*.ndjson`, filtered by
// an optional family prefix and a closed time range, returning one
// `{ts, value}` point per row that carries the requested field, sorted
// ascending by timestamp.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

const TIMESTAMP_KEYS: &[&str] = &["ts_utc", "ts_hst", "ts", "ts_local", "time"];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LogPoint {
    pub ts: DateTime<Utc>,
    pub value: f64,
}

pub fn query(
    log_dir: &Path,
    tank_id: &str,
    field: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    family: Option<&str>,
) -> std::io::Result<Vec<LogPoint>> {
    let mut points = Vec::new();

    let entries = match std::fs::read_dir(log_dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(points),
        Err(e) => return Err(e),
    };

    let tank_marker = format!("-{}-", tank_id);
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if !name.ends_with(".ndjson") || !name.contains(&tank_marker) {
            continue;
        }
        if let Some(family) = family {
            if !name.starts_with(&format!("telemetry-{}-", family)) {
                continue;
            }
        }

        let text = std::fs::read_to_string(entry.path())?;
        for line in text.lines() {
            let Ok(row) = serde_json::from_str::<serde_json::Value>(line) else {
                continue;
            };
            let Some(ts) = extract_timestamp(&row) else {
                continue;
            };
            if ts < from || ts > to {
                continue;
            }
            let Some(value) = row.get(field).and_then(|v| v.as_f64()) else {
                continue;
            };
            points.push(LogPoint { ts, value });
        }
    }

    points.sort_by_key(|p| p.ts);
    Ok(points)
}

fn extract_timestamp(row: &serde_json::Value) -> Option<DateTime<Utc>> {
    for key in TIMESTAMP_KEYS {
        if let Some(raw) = row.get(*key).and_then(|v| v.as_str()) {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
                return Some(parsed.with_timezone(&Utc));
            }
        }
    }
    None
}

pub fn list_log_files(log_dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let entries = match std::fs::read_dir(log_dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".ndjson") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Resolve `requested` (a bare filename, never a path) to a path inside
/// `log_dir`. Rejects anything that would escape the directory.
pub fn resolve_log_path(log_dir: &Path, requested: &str) -> Option<std::path::PathBuf> {
    let basename = Path::new(requested).file_name()?;
    if basename != std::ffi::OsStr::new(requested) {
        return None; // requested contained a path separator
    }
    let resolved = log_dir.join(basename);
    if resolved.is_file() {
        Some(resolved)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn write_row(dir: &Path, filename: &str, ts: DateTime<Utc>, field: &str, value: f64) {
        let row = serde_json::json!({
            "ts_hst": ts.to_rfc3339(),
            "tank_id": "tankA",
            field: value,
        });
        std::fs::write(dir.join(filename), format!("{}\n", row)).unwrap();
    }

    #[test]
    fn s5_query_returns_only_points_in_range_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 7, 29, 12, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 7, 30, 12, 0, 0).unwrap();
        let t3 = Utc.with_ymd_and_hms(2026, 7, 31, 12, 0, 0).unwrap();

        write_row(dir.path(), "telemetry-ctrl-site01-tankA-2026-07-29.ndjson", t1, "ph", 7.0);
        write_row(dir.path(), "telemetry-ctrl-site01-tankA-2026-07-30.ndjson", t2, "ph", 7.2);
        write_row(dir.path(), "telemetry-ctrl-site01-tankA-2026-07-31.ndjson", t3, "ph", 7.4);

        let from = t1 + chrono::Duration::seconds(1);
        let to = t3 - chrono::Duration::seconds(1);
        let points = query(dir.path(), "tankA", "ph", from, to, None).unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].ts, t2);
        assert_eq!(points[0].value, 7.2);
    }

    #[test]
    fn family_filter_excludes_other_families() {
        let dir = tempfile::tempdir().unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 7, 29, 12, 0, 0).unwrap();
        write_row(dir.path(), "telemetry-ctrl-site01-tankA-2026-07-29.ndjson", t1, "ph", 7.0);
        write_row(dir.path(), "telemetry-util-site01-tankA-2026-07-29.ndjson", t1, "ph", 9.0);

        let points = query(
            dir.path(),
            "tankA",
            "ph",
            t1 - chrono::Duration::seconds(1),
            t1 + chrono::Duration::seconds(1),
            Some("ctrl"),
        )
        .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 7.0);
    }

    #[test]
    fn resolve_log_path_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("telemetry-ctrl-site01-tankA-2026-07-29.ndjson"), "{}\n").unwrap();
        assert!(resolve_log_path(dir.path(), "../etc/passwd").is_none());
        assert!(resolve_log_path(dir.path(), "telemetry-ctrl-site01-tankA-2026-07-29.ndjson").is_some());
    }
}
