use std::sync::Arc;

use crate::registermap::{Block, RegisterMapContext};
use crate::types::{Device, FamilyId};

/// A named group of devices sharing a register map and device-id prefix
/// (spec.md §3). The register map is a direct field, not resolved from a
/// filename convention at poll time (spec.md §9).
pub struct Family {
    pub id: FamilyId,
    pub device_prefix: &'static str,
    pub map: Arc<RegisterMapContext>,
    pub blocks: Vec<Block>,
    pub devices: Vec<Device>,
}

impl Family {
    pub fn device_id(&self, tank_id: &str) -> String {
        format!("{}-{}", self.device_prefix, tank_id)
    }
}
