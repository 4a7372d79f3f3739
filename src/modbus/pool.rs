// src/modbus/pool.rs
//
// Connection pool keyed by (ip, port, unit_id), mirroring the teacher's
// once_cell-backed singleton pattern (buffer_store.rs) rather than
// threading a pool struct through every call site — the poller and any
// future command-plane caller both need shared access to the same
// sockets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_modbus::client::{tcp, Context};
use tokio_modbus::Slave;

pub type PoolKey = (String, u16, u8);

struct PooledEntry {
    ctx: Arc<Mutex<Context>>,
    last_used: Instant,
    closing: bool,
}

/// Process-wide pool of open Modbus TCP contexts. One entry per device;
/// the poller's scheduling guarantee (one worker per device per tick)
/// means concurrent callers never contend for the same entry within a
/// tick, but the map itself is still behind a mutex since the idle-close
/// sweep and reads/writes run on independent tasks.
pub struct ModbusPool {
    entries: Mutex<HashMap<PoolKey, PooledEntry>>,
    connect_timeout: Duration,
    idle_close: Duration,
}

impl ModbusPool {
    pub fn new(connect_timeout: Duration, idle_close: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            connect_timeout,
            idle_close,
        })
    }

    /// Returns the existing client for `key` if open, otherwise connects a
    /// fresh one and schedules its idle-close check.
    pub async fn get_or_create(
        self: &Arc<Self>,
        key: &PoolKey,
    ) -> Result<Arc<Mutex<Context>>, String> {
        {
            let mut entries = self.entries.lock().await;
            if let Some(entry) = entries.get_mut(key) {
                if !entry.closing {
                    entry.last_used = Instant::now();
                    return Ok(entry.ctx.clone());
                }
            }
        }

        let (ip, port, unit_id) = key.clone();
        let addr = format!("{}:{}", ip, port);
        let socket_addr: std::net::SocketAddr = addr
            .parse()
            .map_err(|e| format!("invalid device address {}: {}", addr, e))?;

        let ctx = tokio::time::timeout(
            self.connect_timeout,
            tcp::connect_slave(socket_addr, Slave(unit_id)),
        )
        .await
        .map_err(|_| format!("connect timeout to {}", addr))?
        .map_err(|e| format!("connect failed to {}: {}", addr, e))?;

        let ctx = Arc::new(Mutex::new(ctx));

        let mut entries = self.entries.lock().await;
        entries.insert(
            key.clone(),
            PooledEntry {
                ctx: ctx.clone(),
                last_used: Instant::now(),
                closing: false,
            },
        );
        drop(entries);

        self.schedule_idle_check(key.clone());
        Ok(ctx)
    }

    /// Mark a pooled entry closing and drop it, so the next `get_or_create`
    /// reconnects. Called on socket-level errors surfaced from a read or
    /// write — the pool is poisoned rather than retried in place.
    pub async fn poison(&self, key: &PoolKey) {
        self.entries.lock().await.remove(key);
    }

    fn schedule_idle_check(self: &Arc<Self>, key: PoolKey) {
        let pool = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(pool.idle_close).await;
                let mut entries = pool.entries.lock().await;
                let Some(entry) = entries.get(&key) else {
                    return;
                };
                if entry.last_used.elapsed() >= pool.idle_close {
                    entries.remove(&key);
                    return;
                }
                // Still in use recently — reschedule by looping again.
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_key_equality() {
        let a: PoolKey = ("10.0.0.1".to_string(), 502, 1);
        let b: PoolKey = ("10.0.0.1".to_string(), 502, 1);
        assert_eq!(a, b);
    }
}
