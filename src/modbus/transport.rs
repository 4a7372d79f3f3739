// src/modbus/transport.rs
//
// readBlocksForDevice / writeRegisters (spec.md §4.2): retries each
// block read up to `max_retries+1` attempts with a `150 + attempt*200ms`
// backoff, and collapses every failure mode (connect, timeout, framing)
// into a single "transport failure" error so the poller can turn it into
// a failure frame without inspecting the cause.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_modbus::client::Reader;

use super::pool::{ModbusPool, PoolKey};
use crate::registermap::Block;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(2500),
            request_timeout: Duration::from_millis(1500),
            max_retries: 2, // max_retries+1 = 3 attempts total
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

pub async fn read_blocks_for_device(
    pool: &Arc<ModbusPool>,
    ip: &str,
    port: u16,
    unit_id: u8,
    blocks: &[Block],
    config: &TransportConfig,
) -> Result<HashMap<String, Vec<u8>>, TransportError> {
    let key: PoolKey = (ip.to_string(), port, unit_id);
    let mut out = HashMap::new();

    for block in blocks {
        if block.function != 3 {
            // Declared register maps are validated at load time; reaching
            // this with a non-FC3 block is a programmer error, not a
            // recoverable transport condition.
            panic!("block '{}' is not fn=3 (holding registers)", block.name);
        }

        let bytes = read_one_block_with_retry(pool, &key, block, config).await?;
        out.insert(block.name.clone(), bytes);
    }

    Ok(out)
}

async fn read_one_block_with_retry(
    pool: &Arc<ModbusPool>,
    key: &PoolKey,
    block: &Block,
    config: &TransportConfig,
) -> Result<Vec<u8>, TransportError> {
    let attempts = config.max_retries + 1;
    let mut last_err = None;

    for attempt in 0..attempts {
        match read_one_block(pool, key, block, config).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                last_err = Some(e);
                if attempt + 1 < attempts {
                    let backoff = Duration::from_millis(150 + (attempt as u64) * 200);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| TransportError("unknown transport failure".to_string())))
}

async fn read_one_block(
    pool: &Arc<ModbusPool>,
    key: &PoolKey,
    block: &Block,
    config: &TransportConfig,
) -> Result<Vec<u8>, TransportError> {
    let ctx = pool
        .get_or_create(key)
        .await
        .map_err(TransportError)?;
    let mut guard = ctx.lock().await;

    let result = tokio::time::timeout(
        config.request_timeout,
        guard.read_holding_registers(block.start, block.len),
    )
    .await;
    drop(guard);

    let registers = match result {
        Ok(Ok(Ok(regs))) => regs,
        Ok(Ok(Err(exception))) => {
            pool.poison(key).await;
            return Err(TransportError(format!("modbus exception: {}", exception)));
        }
        Ok(Err(io_err)) => {
            pool.poison(key).await;
            return Err(TransportError(format!("io error: {}", io_err)));
        }
        Err(_elapsed) => {
            pool.poison(key).await;
            return Err(TransportError(format!(
                "request timeout reading block '{}'",
                block.name
            )));
        }
    };

    Ok(registers_to_be_bytes(&registers))
}

pub async fn write_registers(
    pool: &Arc<ModbusPool>,
    ip: &str,
    port: u16,
    unit_id: u8,
    function_code: u8,
    start: u16,
    values: &[u16],
    config: &TransportConfig,
) -> Result<(), TransportError> {
    use tokio_modbus::client::Writer;

    let key: PoolKey = (ip.to_string(), port, unit_id);
    let attempts = config.max_retries + 1;
    let mut last_err = None;

    for attempt in 0..attempts {
        let ctx = pool.get_or_create(&key).await.map_err(TransportError)?;
        let mut guard = ctx.lock().await;

        let outcome = match function_code {
            6 => {
                let value = *values.first().ok_or_else(|| {
                    TransportError("FC6 requires exactly one value".to_string())
                })?;
                tokio::time::timeout(config.request_timeout, guard.write_single_register(start, value))
                    .await
            }
            16 => {
                tokio::time::timeout(
                    config.request_timeout,
                    guard.write_multiple_registers(start, values),
                )
                .await
            }
            other => {
                return Err(TransportError(format!("unknown function code {}", other)));
            }
        };
        drop(guard);

        match outcome {
            Ok(Ok(Ok(()))) => return Ok(()),
            Ok(Ok(Err(exception))) => {
                last_err = Some(TransportError(format!("modbus exception: {}", exception)));
            }
            Ok(Err(io_err)) => {
                pool.poison(&key).await;
                last_err = Some(TransportError(format!("io error: {}", io_err)));
            }
            Err(_elapsed) => {
                pool.poison(&key).await;
                last_err = Some(TransportError("request timeout".to_string()));
            }
        }

        if attempt + 1 < attempts {
            let backoff = Duration::from_millis(150 + (attempt as u64) * 200);
            tokio::time::sleep(backoff).await;
        }
    }

    Err(last_err.unwrap_or_else(|| TransportError("unknown transport failure".to_string())))
}

fn registers_to_be_bytes(registers: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(registers.len() * 2);
    for &reg in registers {
        bytes.push((reg >> 8) as u8);
        bytes.push((reg & 0xFF) as u8);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_to_be_bytes_is_msb_first() {
        assert_eq!(registers_to_be_bytes(&[0x02E4]), vec![0x02, 0xE4]);
        assert_eq!(registers_to_be_bytes(&[0x0001, 0x0002]), vec![0, 1, 0, 2]);
    }

    #[test]
    fn backoff_schedule_matches_spec() {
        let delays: Vec<u64> = (0..3).map(|attempt| 150 + attempt * 200).collect();
        assert_eq!(delays, vec![150, 350, 550]);
    }
}
