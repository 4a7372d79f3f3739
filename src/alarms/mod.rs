// src/alarms/mod.rs
//
// Alarm Engine (spec.md §4.7): rule evaluation, state transitions,
// connectivity tracking, batched notification egress, and persisted
// thresholds.

mod connectivity;
mod engine;
mod notify;
mod persist;
mod rules;

pub use connectivity::ConnectivityState;
pub use engine::{AlarmEngine, AlarmEvent, AlarmKind};
pub use notify::{NullNotifier, Notifier, WebhookNotifier};
pub use persist::{load_or_default, save_atomic};
pub use rules::{AlarmConfig, AlarmRule, Bounds, RuleKind};
