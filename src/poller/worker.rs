// src/poller/worker.rs
//
// Per-device unit of work (spec.md §4.3, steps 1-4). Transport and
// decode failures never abort the tick: a failure frame is built,
// still published and cached, so downstream consumers see staleness.

use std::sync::Arc;

use chrono::Utc;

use crate::alarms::AlarmEngine;
use crate::cache;
use crate::families::Family;
use crate::logwriter::{LogJob, LogWriter};
use crate::modbus::{self, ModbusPool, TransportConfig};
use crate::publisher::Publisher;
use crate::types::{Device, Qc, QcStatus, TelemetryFrame};

pub const SCHEMA_VER: u32 = 1;

/// Read, decode, and dispatch one device's frame for this tick.
pub async fn poll_device(
    family: &Arc<Family>,
    device: &Device,
    site_id: &str,
    pool: &Arc<ModbusPool>,
    transport_config: &TransportConfig,
    publisher: &Publisher,
    log_writer: &LogWriter,
    alarm_engine: &AlarmEngine,
) {
    let device_id = family.device_id(&device.tank_id);

    let frame = match modbus::read_blocks_for_device(
        pool,
        &device.ip,
        device.port,
        device.unit_id,
        &family.blocks,
        transport_config,
    )
    .await
    {
        Ok(block_buffers) => {
            let values = family.map.decode_points_from_blocks(&block_buffers);
            TelemetryFrame {
                ts_utc: Utc::now(),
                schema_ver: SCHEMA_VER,
                site_id: site_id.to_string(),
                tank_id: device.tank_id.clone(),
                device_id,
                fw: None,
                s: values,
                qc: Qc {
                    status: QcStatus::Ok,
                    error: None,
                },
            }
        }
        Err(e) => {
            tlog!(
                "[poller] {}/{} read failed: {}",
                family.device_prefix, device.tank_id, e
            );
            TelemetryFrame {
                ts_utc: Utc::now(),
                schema_ver: SCHEMA_VER,
                site_id: site_id.to_string(),
                tank_id: device.tank_id.clone(),
                device_id,
                fw: None,
                s: Default::default(),
                qc: Qc {
                    status: QcStatus::Fail,
                    error: Some(e.to_string()),
                },
            }
        }
    };

    cache::update(&device.tank_id, family.id, &device.ip, &frame);
    publisher.publish(&frame).await;
    log_writer
        .enqueue(LogJob {
            family: family.device_prefix.to_string(),
            tank_id: device.tank_id.clone(),
            frame: frame.clone(),
        })
        .await;
    alarm_engine.evaluate_frame(family.id, &frame);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_ver_is_stable() {
        assert_eq!(SCHEMA_VER, 1);
    }
}
