// src/api/state.rs
//
// Shared state handed to every handler (spec.md §4.9). Read-only
// references into the same singletons/services the poller drives — no
// separate copy of state is kept for the API.

use std::sync::Arc;

use crate::alarms::AlarmEngine;
use crate::config::GatewayConfig;
use crate::families::FamilyRegistry;

pub struct AppState {
    pub config: GatewayConfig,
    pub families: Arc<FamilyRegistry>,
    pub alarm_engine: Arc<AlarmEngine>,
}
