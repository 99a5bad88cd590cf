use std::path::PathBuf;

use crate::dataset::{LoadOptions, DEFAULT_TARGET_COLUMNS};
use crate::network::NetworkConfig;

/// Adam with time-based learning rate decay.
#[derive(Debug, Clone, PartialEq)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    /// Per-update decay: `lr / (1 + decay * iterations)`.
    pub decay: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            decay: 0.005,
        }
    }
}

impl AdamConfig {
    /// Learning rate for the update following `iterations` earlier updates.
    pub fn learning_rate_at(&self, iterations: usize) -> f64 {
        self.learning_rate / (1.0 + self.decay * iterations as f64)
    }
}

/// A saved model to start from instead of building a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingModel {
    pub dir: PathBuf,
    pub name: String,
}

/// Everything a training run needs, fixed before the first session starts.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub data_path: PathBuf,
    pub output_dir: PathBuf,
    /// Base name of the output files; the run index is appended.
    pub run_tag: String,
    pub runs: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub square_theta: bool,
    /// Pose columns used as regression targets, one per network output.
    pub target_columns: Vec<usize>,
    pub load: LoadOptions,
    pub optimizer: AdamConfig,
    /// Topology for fresh models. `input_dim` is filled from the data.
    pub network: NetworkConfig,
    pub existing_model: Option<ExistingModel>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/raw_sensor_data_01.mat"),
            output_dir: PathBuf::from("data"),
            run_tag: "_240_fun_0".to_string(),
            runs: 4,
            epochs: 2000,
            batch_size: 200,
            square_theta: false,
            target_columns: DEFAULT_TARGET_COLUMNS.to_vec(),
            load: LoadOptions::default(),
            optimizer: AdamConfig::default(),
            network: NetworkConfig::default(),
            existing_model: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learning_rate_decay() {
        let adam = AdamConfig::default();
        assert_eq!(adam.learning_rate_at(0), 0.01);
        assert!((adam.learning_rate_at(200) - 0.005).abs() < 1e-12);
        assert!((adam.learning_rate_at(6000) - 0.01 / 31.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_decay() {
        let adam = AdamConfig {
            decay: 0.0,
            ..AdamConfig::default()
        };
        assert_eq!(adam.learning_rate_at(1_000_000), adam.learning_rate);
    }
}
