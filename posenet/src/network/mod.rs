pub mod activation;
pub mod config;
pub mod layers;
pub mod model;
pub mod recurrent;

pub use activation::Activation;
pub use config::NetworkConfig;
pub use layers::{LayerSpec, LayerStack, Shape, WeightInit};
pub use model::PoseNetwork;
pub use recurrent::{RecurrentConfig, RecurrentNetwork};

/// Convolution kernel width, applied with same padding.
pub const KERNEL_SIZE: usize = 3;

/// Pool width and stride of each max-pooling stage.
pub const POOL_SIZE: usize = 8;

/// Number of conv-conv-pool-dropout blocks in the trunk.
pub const CONV_BLOCKS: usize = 2;

/// The first three dense layers are this many times wider than the conv layers.
pub const DENSE_WIDTH_MULTIPLIER: usize = 8;

pub const BATCH_NORM_EPS: f64 = 1e-3;

/// Weight of the current batch in the running statistics
/// (a moving-average decay of 0.99).
pub const BATCH_NORM_MOMENTUM: f64 = 0.01;
