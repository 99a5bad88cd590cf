use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-epoch training metrics, keyed by metric name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    metrics: BTreeMap<String, Vec<f32>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, metric: &str, value: f32) {
        self.metrics
            .entry(metric.to_string())
            .or_default()
            .push(value);
    }

    pub fn get(&self, metric: &str) -> Option<&[f32]> {
        self.metrics.get(metric).map(Vec::as_slice)
    }

    pub fn last(&self, metric: &str) -> Option<f32> {
        self.get(metric).and_then(|values| values.last().copied())
    }

    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    /// Number of epochs recorded, taken from the longest series.
    pub fn epochs(&self) -> usize {
        self.metrics.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
