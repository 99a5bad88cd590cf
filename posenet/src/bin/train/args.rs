use std::path::PathBuf;

use clap::Parser;
use posenet::config::{AdamConfig, ExistingModel, TrainingConfig};
use posenet::dataset::{LoadOptions, TableKeys};
use posenet::network::{Activation, NetworkConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "Pose CNN Trainer")]
#[command(author = "Jørgen Hanssen <jorgen@hanssen.io>")]
#[command(version = "0.1.0")]
pub struct Args {
    /// Data file with the sensor and pose tables (.mat, .npz or .safetensors).
    #[arg(long, default_value = "data/raw_sensor_data_01.mat")]
    pub data: PathBuf,

    /// Name of the sensor table inside the data file.
    #[arg(long, default_value = "data_sensor")]
    pub sensor_key: String,

    /// Name of the pose table inside the data file.
    #[arg(long, default_value = "data_pose")]
    pub pose_key: String,

    /// Directory for history, architecture and parameter files.
    #[arg(long, default_value = "data")]
    pub output_dir: PathBuf,

    /// Base name of the output files. The run index is appended.
    #[arg(long, default_value = "_240_fun_0")]
    pub tag: String,

    /// Number of independent training sessions.
    #[arg(long, default_value_t = 4)]
    pub runs: usize,

    /// Fraction of samples used for training, the rest is held out.
    #[arg(long, default_value_t = 0.9)]
    pub train_ratio: f64,

    /// Seed for the train/test permutation. Random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Square the theta pose column before training.
    #[arg(long)]
    pub square_theta: bool,

    /// Pose columns used as regression targets.
    #[arg(long, value_delimiter = ',', default_value = "0,1,3")]
    pub targets: Vec<usize>,

    #[arg(long, default_value_t = 2000)]
    pub epochs: usize,

    #[arg(long, default_value_t = 200)]
    pub batch_size: usize,

    /// Initial learning rate for Adam.
    #[arg(long, default_value_t = 0.01)]
    pub learning_rate: f64,

    /// Time-based learning rate decay per optimizer update.
    #[arg(long, default_value_t = 0.005)]
    pub decay: f64,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f32,

    /// Filters per convolution; the dense head is derived from it.
    #[arg(long, default_value_t = 64)]
    pub hidden_units: usize,

    /// L2 penalty on dense kernels.
    #[arg(long, default_value_t = 0.0)]
    pub l2: f64,

    #[arg(long, value_enum, default_value_t = Activation::Sigmoid)]
    pub activation: Activation,

    /// Start every session from the saved model `model_<NAME>` instead of a fresh one.
    #[arg(long, value_name = "NAME")]
    pub load_model: Option<String>,

    /// Directory holding the model given by --load-model.
    #[arg(long, default_value = "data")]
    pub model_dir: PathBuf,
}

impl Args {
    pub fn to_config(&self) -> TrainingConfig {
        TrainingConfig {
            data_path: self.data.clone(),
            output_dir: self.output_dir.clone(),
            run_tag: self.tag.clone(),
            runs: self.runs,
            epochs: self.epochs,
            batch_size: self.batch_size,
            square_theta: self.square_theta,
            target_columns: self.targets.clone(),
            load: LoadOptions {
                train_ratio: self.train_ratio,
                seed: self.seed,
                keys: TableKeys {
                    sensors: self.sensor_key.clone(),
                    poses: self.pose_key.clone(),
                },
            },
            optimizer: AdamConfig {
                learning_rate: self.learning_rate,
                decay: self.decay,
                ..AdamConfig::default()
            },
            network: NetworkConfig {
                hidden_size: self.hidden_units,
                output_dim: self.targets.len(),
                activation: self.activation,
                dropout: self.dropout,
                l2_reg: self.l2,
                ..NetworkConfig::default()
            },
            existing_model: self.load_model.as_ref().map(|name| ExistingModel {
                dir: self.model_dir.clone(),
                name: name.clone(),
            }),
        }
    }
}
