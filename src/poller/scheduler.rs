// src/poller/scheduler.rs
//
// Fixed-cadence tick driver (spec.md §4.3, §5). Concurrent overlapping
// ticks are forbidden: if the previous tick is still running when the
// cadence fires, the new tick is skipped. Workers draw indices
// atomically from a shared counter, with jitter injected on roughly
// every third work item.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;

use super::worker::poll_device;
use crate::alarms::AlarmEngine;
use crate::config::GatewayConfig;
use crate::families::{Family, FamilyRegistry};
use crate::logwriter::LogWriter;
use crate::modbus::{ModbusPool, TransportConfig};
use crate::publisher::Publisher;
use crate::types::Device;

pub struct GatewayState {
    pub config: GatewayConfig,
    pub families: Arc<FamilyRegistry>,
    pub pool: Arc<ModbusPool>,
    pub transport_config: TransportConfig,
    pub publisher: Publisher,
    pub log_writer: LogWriter,
    pub alarm_engine: Arc<AlarmEngine>,
}

/// Runs the cadence loop until `shutdown_rx` reports true. The in-flight
/// tick is always allowed to complete before returning.
pub async fn run_cadence(state: Arc<GatewayState>, mut shutdown_rx: watch::Receiver<bool>) {
    let tick_in_progress = Arc::new(AtomicBool::new(false));
    let mut interval = tokio::time::interval(Duration::from_millis(state.config.poll_interval_ms));
    let mut next_reload = tokio::time::Instant::now() + Duration::from_millis(state.config.family_reload_ms);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if tick_in_progress.load(Ordering::SeqCst) {
                    tlog!("[poller] previous tick still running, skipping this cadence");
                    continue;
                }
                if tokio::time::Instant::now() >= next_reload {
                    state.families.reload(&state.config).await;
                    next_reload = tokio::time::Instant::now() + Duration::from_millis(state.config.family_reload_ms);
                }
                run_one_tick(state.clone(), tick_in_progress.clone()).await;
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tlog!("[poller] shutdown requested, waiting for in-flight tick to drain");
                    while tick_in_progress.load(Ordering::SeqCst) {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                    return;
                }
            }
        }
    }
}

async fn run_one_tick(state: Arc<GatewayState>, tick_in_progress: Arc<AtomicBool>) {
    tick_in_progress.store(true, Ordering::SeqCst);

    let families = state.families.current().await;
    let work = flatten_work(&families);
    let concurrency = state.config.concurrency.max(1).min(work.len().max(1));
    let index = Arc::new(AtomicUsize::new(0));
    let work = Arc::new(work);

    let mut handles = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let state = state.clone();
        let index = index.clone();
        let work = work.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let i = index.fetch_add(1, Ordering::SeqCst);
                if i >= work.len() {
                    return;
                }

                // Jitter on roughly every third work item, to avoid
                // synchronized radio bursts across devices.
                if i % 3 == 0 {
                    let jitter_ms = rand::thread_rng().gen_range(0..=200);
                    tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                }

                let (family, device) = &work[i];
                poll_device(
                    family,
                    device,
                    &state.config.site_id,
                    &state.pool,
                    &state.transport_config,
                    &state.publisher,
                    &state.log_writer,
                    &state.alarm_engine,
                )
                .await;
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    state.alarm_engine.flush().await;
    tick_in_progress.store(false, Ordering::SeqCst);
}

fn flatten_work(families: &[Arc<Family>]) -> Vec<(Arc<Family>, Device)> {
    let mut work = Vec::new();
    for family in families {
        for device in &family.devices {
            work.push((family.clone(), device.clone()));
        }
    }
    work
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registermap::{RegisterMap, RegisterMapContext};
    use crate::types::FamilyId;

    fn sample_family(n: usize) -> Arc<Family> {
        let map = RegisterMap::from_str(
            r#"{"schema_ver":1,"byte_order":"BE","word_order":"ABCD","blocks":[],"points":{}}"#,
            "test",
        )
        .unwrap();
        let devices = (0..n)
            .map(|i| Device {
                tank_id: format!("T{}", i),
                ip: "127.0.0.1".to_string(),
                unit_id: 1,
                port: 502,
            })
            .collect();
        Arc::new(Family {
            id: FamilyId::Ctrl,
            device_prefix: "ctrl",
            map: Arc::new(RegisterMapContext::new(map)),
            blocks: vec![],
            devices,
        })
    }

    #[test]
    fn property_7_flattened_work_has_one_entry_per_device() {
        let families = vec![sample_family(3), sample_family(2)];
        let work = flatten_work(&families);
        assert_eq!(work.len(), 5);
    }
}
