// src/modbus/mod.rs
//
// Modbus Transport (spec.md §4.2): a process-wide pool of persistent TCP
// clients keyed by (ip, port, unit_id), block reads under a retry
// policy, and register writes (FC6/FC16). Built on tokio-modbus, the
// same crate the teacher's own modbus_tcp poller depends on.

mod pool;
mod transport;

pub use pool::{ModbusPool, PoolKey};
pub use transport::{TransportConfig, TransportError};

use std::collections::HashMap;
use std::sync::Arc;

use crate::registermap::Block;

pub async fn read_blocks_for_device(
    pool: &Arc<ModbusPool>,
    ip: &str,
    port: u16,
    unit_id: u8,
    blocks: &[Block],
    config: &TransportConfig,
) -> Result<HashMap<String, Vec<u8>>, TransportError> {
    transport::read_blocks_for_device(pool, ip, port, unit_id, blocks, config).await
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
    transport::write_registers(pool, ip, port, unit_id, function_code, start, values, config).await
}
