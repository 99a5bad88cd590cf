use serde::{Deserialize, Serialize};

use super::layers::{LayerSpec, Shape, WeightInit};
use super::{
    Activation, BATCH_NORM_EPS, BATCH_NORM_MOMENTUM, CONV_BLOCKS, DENSE_WIDTH_MULTIPLIER,
    KERNEL_SIZE, POOL_SIZE,
};
use crate::error::{Error, Result};

/// Hyperparameters that fully determine the convolutional topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Sensor channels per scan.
    pub input_dim: usize,
    pub hidden_size: usize,
    pub output_dim: usize,
    pub activation: Activation,
    pub dropout: f32,
    pub l2_reg: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            input_dim: 0,
            hidden_size: 64,
            output_dim: 3,
            activation: Activation::Sigmoid,
            dropout: 0.1,
            l2_reg: 0.0,
        }
    }
}

impl NetworkConfig {
    pub fn with_input_dim(mut self, input_dim: usize) -> Self {
        self.input_dim = input_dim;
        self
    }

    pub fn input_shape(&self) -> Shape {
        Shape::Sequence {
            channels: 1,
            length: self.input_dim,
        }
    }

    /// Convolutional feature extractor, up to and including flatten.
    pub fn trunk_layers(&self) -> Vec<LayerSpec> {
        let conv = LayerSpec::Conv1d {
            filters: self.hidden_size,
            kernel_size: KERNEL_SIZE,
            activation: self.activation,
        };

        let mut layers = Vec::new();
        for _ in 0..CONV_BLOCKS {
            layers.push(conv.clone());
            layers.push(conv.clone());
            layers.push(LayerSpec::MaxPool1d {
                pool_size: POOL_SIZE,
            });
            layers.push(LayerSpec::Dropout { rate: self.dropout });
        }
        layers.push(LayerSpec::Flatten);
        layers
    }

    /// Complete topology: trunk, four dense blocks and the linear output.
    pub fn layers(&self) -> Vec<LayerSpec> {
        let mut layers = self.trunk_layers();

        for units in self.dense_widths() {
            layers.push(LayerSpec::Dense {
                units,
                init: WeightInit::LecunUniform,
                l2_reg: self.l2_reg,
            });
            layers.push(LayerSpec::BatchNorm {
                eps: BATCH_NORM_EPS,
                momentum: BATCH_NORM_MOMENTUM,
            });
            layers.push(LayerSpec::Activation {
                activation: self.activation,
            });
            layers.push(LayerSpec::Dropout {
                rate: self.dropout / 2.0,
            });
        }

        layers.push(LayerSpec::Dense {
            units: self.output_dim,
            init: WeightInit::GlorotUniform,
            l2_reg: 0.0,
        });
        layers.push(LayerSpec::Activation {
            activation: Activation::Linear,
        });
        layers
    }

    pub fn dense_widths(&self) -> [usize; 4] {
        let wide = self.hidden_size * DENSE_WIDTH_MULTIPLIER;
        [wide, wide, wide, self.hidden_size]
    }

    /// Length of each feature map after both pooling stages.
    pub fn pooled_len(&self) -> usize {
        (0..CONV_BLOCKS).fold(self.input_dim, |len, _| len / POOL_SIZE)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hidden_size == 0 || self.output_dim == 0 {
            return Err(Error::InvalidConfig(
                "hidden and output sizes must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.pooled_len() == 0 {
            return Err(Error::InvalidConfig(format!(
                "{} sensor channels do not survive {} pooling stages of {}; at least {} are needed",
                self.input_dim,
                CONV_BLOCKS,
                POOL_SIZE,
                POOL_SIZE.pow(CONV_BLOCKS as u32)
            )));
        }
        Ok(())
    }
}
