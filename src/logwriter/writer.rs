// src/logwriter/writer.rs
//
// Single-writer queue that serializes NDJSON appends across every
// (family, site, tank) stream, rate-limited to one row per stream every
// `MIN_INTERVAL_MS` (spec.md §4.5). Producers send `LogJob`s through an
// mpsc channel; one task drains it and performs the file I/O, mirroring
// the teacher's single-consumer-queue intent.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

use super::rotation::{hst_now, log_path_for};
use super::whitelist::Whitelist;
use crate::types::TelemetryFrame;

#[derive(Debug)]
pub struct LogJob {
    pub family: String,
    pub tank_id: String,
    pub frame: TelemetryFrame,
}

enum Command {
    Append(LogJob),
    Shutdown(oneshot::Sender<()>),
}

pub struct LogWriter {
    tx: mpsc::Sender<Command>,
}

impl LogWriter {
    pub fn spawn(log_dir: PathBuf, config_dir: PathBuf, site_id: String, min_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel(1024);
        tokio::spawn(run_consumer(rx, log_dir, config_dir, site_id, min_interval));
        Self { tx }
    }

    /// Enqueue a row. Backpressure is honored: this awaits channel
    /// capacity rather than dropping work silently.
    pub async fn enqueue(&self, job: LogJob) {
        if self.tx.send(Command::Append(job)).await.is_err() {
            tlog!("[logwriter] writer task gone, dropping row");
        }
    }

    /// Drain the queue and close all open streams before returning.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run_consumer(
    mut rx: mpsc::Receiver<Command>,
    log_dir: PathBuf,
    config_dir: PathBuf,
    site_id: String,
    min_interval: Duration,
) {
    let whitelist = Whitelist::new();
    let mut last_write: HashMap<(String, String), Instant> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Append(job) => {
                let key = (job.family.clone(), job.tank_id.clone());
                let now = Instant::now();
                if let Some(prev) = last_write.get(&key) {
                    if now.duration_since(*prev) < min_interval {
                        continue; // rate-limited: silently drop
                    }
                }

                if let Err(e) = write_row(&log_dir, &config_dir, &site_id, &whitelist, &job).await {
                    tlog!(
                        "[logwriter] write failed for {}/{}: {}",
                        job.family, job.tank_id, e
                    );
                    continue;
                }

                last_write.insert(key, now);
            }
            Command::Shutdown(done) => {
                let _ = done.send(());
                return;
            }
        }
    }
}

async fn write_row(
    log_dir: &std::path::Path,
    config_dir: &std::path::Path,
    site_id: &str,
    whitelist: &Whitelist,
    job: &LogJob,
) -> std::io::Result<()> {
    let points = whitelist.for_family(config_dir, &job.family);

    let mut row = serde_json::Map::new();
    row.insert(
        "ts_hst".to_string(),
        serde_json::Value::String(hst_now().to_rfc3339()),
    );
    row.insert(
        "tank_id".to_string(),
        serde_json::Value::String(job.tank_id.clone()),
    );
    for (key, value) in &job.frame.s {
        if !points.contains(key) {
            continue;
        }
        let rounded = if Whitelist::is_counter_field(key) {
            value.trunc()
        } else {
            (value * 10.0).round() / 10.0
        };
        row.insert(
            key.clone(),
            serde_json::Number::from_f64(rounded)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        );
    }

    let path = log_path_for(log_dir, &job.family, site_id, &job.tank_id, job.frame.ts_utc);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut line = serde_json::to_string(&row)?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(&path).await?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Write as _;

    fn sample_frame() -> TelemetryFrame {
        let mut s = std::collections::HashMap::new();
        s.insert("ph".to_string(), 7.123);
        s.insert("counter_value".to_string(), 42.9);
        TelemetryFrame {
            ts_utc: Utc::now(),
            schema_ver: 1,
            site_id: "site01".to_string(),
            tank_id: "T1".to_string(),
            device_id: "ctrl-T1".to_string(),
            fw: None,
            s,
            qc: crate::types::Qc {
                status: crate::types::QcStatus::Ok,
                error: None,
            },
        }
    }

    #[tokio::test]
    async fn property_4_rate_limit_drops_fast_second_write() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("logPoints.json"))
            .unwrap()
            .write_all(br#"["ph", "counter_value"]"#)
            .unwrap();

        let writer = LogWriter::spawn(
            dir.path().to_path_buf(),
            dir.path().to_path_buf(),
            "site01".to_string(),
            Duration::from_secs(30),
        );

        writer
            .enqueue(LogJob {
                family: "ctrl".to_string(),
                tank_id: "T1".to_string(),
                frame: sample_frame(),
            })
            .await;
        writer
            .enqueue(LogJob {
                family: "ctrl".to_string(),
                tank_id: "T1".to_string(),
                frame: sample_frame(),
            })
            .await;
        writer.shutdown().await;

        let path = log_path_for(dir.path(), "ctrl", "site01", "T1", Utc::now());
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn counter_field_truncated_decimal_rounded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("logPoints.json"))
            .unwrap()
            .write_all(br#"["ph", "counter_value"]"#)
            .unwrap();

        let writer = LogWriter::spawn(
            dir.path().to_path_buf(),
            dir.path().to_path_buf(),
            "site01".to_string(),
            Duration::from_millis(1),
        );
        writer
            .enqueue(LogJob {
                family: "ctrl".to_string(),
                tank_id: "T1".to_string(),
                frame: sample_frame(),
            })
            .await;
        writer.shutdown().await;

        let path = log_path_for(dir.path(), "ctrl", "site01", "T1", Utc::now());
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let row: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(row["ph"], 7.1);
        assert_eq!(row["counter_value"], 42.0);
    }
}
