// src/registermap/mod.rs
//
// Register Map (spec.md §4.1): loads the JSON register map for a family,
// exposes the declared blocks, decodes raw block buffers into named
// points, and plans register writes. Immutable after load — the only
// mutable piece is the per-point deadband tracker, which lives alongside
// it rather than on the point definitions (spec.md §9, Open Question 2).

mod decode;
mod load;
mod writeplan;

pub use decode::decode_points_from_blocks;
pub use load::{
    Block, ByteOrder, PointDef, PointType, RegisterMap, RegisterMapError, RegisterMapFile,
    WordOrder,
};
pub use writeplan::{PlanWriteError, WritePlan, WriteReason};

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::PointName;

/// A loaded register map plus the mutable deadband state that goes with
/// it. One of these is created per family at load time and handed out as
/// an `Arc` so every worker decoding frames for that family shares it.
pub struct RegisterMapContext {
    pub map: RegisterMap,
    last_set: Mutex<HashMap<PointName, f64>>,
}

impl RegisterMapContext {
    pub fn new(map: RegisterMap) -> Self {
        Self {
            map,
            last_set: Mutex::new(HashMap::new()),
        }
    }

    pub fn decode_points_from_blocks(
        &self,
        block_buffers: &HashMap<String, Vec<u8>>,
    ) -> HashMap<PointName, f64> {
        decode::decode_points_from_blocks(&self.map, block_buffers)
    }

    pub fn plan_write(
        &self,
        point_name: &str,
        raw_value: f64,
        allow_clamp: bool,
    ) -> Result<WritePlan, PlanWriteError> {
        writeplan::plan_write(&self.map, &self.last_set, point_name, raw_value, allow_clamp)
    }
}
