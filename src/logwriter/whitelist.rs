// src/logwriter/whitelist.rs
//
// Per-family log point whitelist: `logPoints.<family>.json` if present,
// else the default `logPoints.json`, cached after first load
// (spec.md §4.5).

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

#[derive(Default)]
pub struct Whitelist {
    cache: RwLock<HashMap<String, Arc<HashSet<String>>>>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn for_family(&self, config_dir: &Path, family: &str) -> Arc<HashSet<String>> {
        if let Some(cached) = self.cache.read().unwrap().get(family) {
            return cached.clone();
        }

        let specific = config_dir.join(format!("logPoints.{}.json", family));
        let default = config_dir.join("logPoints.json");
        let path = if specific.is_file() { specific } else { default };

        let points: HashSet<String> = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str::<Vec<String>>(&text).ok())
            .map(|v| v.into_iter().collect())
            .unwrap_or_default();

        let points = Arc::new(points);
        self.cache
            .write()
            .unwrap()
            .insert(family.to_string(), points.clone());
        points
    }

    /// Does `field` get truncated to an integer rather than rounded to
    /// one decimal place (spec.md §4.5: counter-typed points)?
    pub fn is_counter_field(field: &str) -> bool {
        matches!(field, "counter_value" | "timer_seconds")
    }
}
