use std::collections::HashMap;
use std::fmt;

use candle_core::{Module, ModuleT, Result as CandleResult, Tensor};
use candle_nn::{
    batch_norm, BatchNorm, BatchNormConfig, Conv1d, Conv1dConfig, Dropout, Init, Linear,
    VarBuilder,
};
use serde::{Deserialize, Serialize};

use super::Activation;
use crate::error::{Error, Result};

/// Uniform weight initialisers, bounded by fan-in (and fan-out).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightInit {
    LecunUniform,
    GlorotUniform,
}

impl WeightInit {
    pub fn bound(&self, fan_in: usize, fan_out: usize) -> f64 {
        match self {
            Self::LecunUniform => (3.0 / fan_in as f64).sqrt(),
            Self::GlorotUniform => (6.0 / (fan_in + fan_out) as f64).sqrt(),
        }
    }

    fn init(&self, fan_in: usize, fan_out: usize) -> Init {
        let bound = self.bound(fan_in, fan_out);
        Init::Uniform {
            lo: -bound,
            up: bound,
        }
    }
}

/// One entry of a serialized network topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    /// Same-padded 1-D convolution.
    Conv1d {
        filters: usize,
        kernel_size: usize,
        activation: Activation,
    },
    /// Valid max pooling with stride equal to the pool size.
    MaxPool1d { pool_size: usize },
    Dropout { rate: f32 },
    Flatten,
    Dense {
        units: usize,
        init: WeightInit,
        l2_reg: f64,
    },
    BatchNorm { eps: f64, momentum: f64 },
    Activation { activation: Activation },
}

impl LayerSpec {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Conv1d { .. } => "conv1d",
            Self::MaxPool1d { .. } => "max_pool1d",
            Self::Dropout { .. } => "dropout",
            Self::Flatten => "flatten",
            Self::Dense { .. } => "dense",
            Self::BatchNorm { .. } => "batch_norm",
            Self::Activation { .. } => "activation",
        }
    }

    /// Prefix of the variables this layer owns, `None` for stateless layers.
    fn var_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Conv1d { .. } => Some("conv"),
            Self::Dense { .. } => Some("dense"),
            Self::BatchNorm { .. } => Some("batch_norm"),
            _ => None,
        }
    }

    pub fn output_shape(&self, input: Shape) -> Result<Shape> {
        match (self, input) {
            (Self::Conv1d { filters, .. }, Shape::Sequence { length, .. }) => Ok(Shape::Sequence {
                channels: *filters,
                length,
            }),
            (Self::MaxPool1d { pool_size }, Shape::Sequence { channels, length }) => {
                let pooled = length / pool_size;
                if pooled == 0 {
                    return Err(Error::InvalidConfig(format!(
                        "sequence of length {} is too short for a pool of {}",
                        length, pool_size
                    )));
                }
                Ok(Shape::Sequence {
                    channels,
                    length: pooled,
                })
            }
            (Self::Flatten, Shape::Sequence { channels, length }) => {
                Ok(Shape::Flat(channels * length))
            }
            (Self::Dense { units, .. }, Shape::Flat(_)) => Ok(Shape::Flat(*units)),
            (Self::Dropout { .. } | Self::Activation { .. }, shape) => Ok(shape),
            (Self::BatchNorm { .. }, shape) => Ok(shape),
            (spec, shape) => Err(Error::InvalidConfig(format!(
                "{} cannot take input of shape {}",
                spec.name(),
                shape
            ))),
        }
    }

    /// Number of stored values, running statistics included.
    pub fn param_count(&self, input: Shape) -> usize {
        match (self, input) {
            (
                Self::Conv1d {
                    filters,
                    kernel_size,
                    ..
                },
                Shape::Sequence { channels, .. },
            ) => filters * channels * kernel_size + filters,
            (Self::Dense { units, .. }, Shape::Flat(features)) => units * features + units,
            (Self::BatchNorm { .. }, shape) => 4 * shape.channels(),
            _ => 0,
        }
    }
}

/// Activation shape of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Sequence { channels: usize, length: usize },
    Flat(usize),
}

impl Shape {
    fn channels(&self) -> usize {
        match self {
            Self::Sequence { channels, .. } => *channels,
            Self::Flat(features) => *features,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence { channels, length } => write!(f, "({}, {})", length, channels),
            Self::Flat(features) => write!(f, "({})", features),
        }
    }
}

enum Layer {
    Conv {
        conv: Conv1d,
        activation: Activation,
    },
    MaxPool(usize),
    Dropout(Dropout),
    Flatten,
    Dense {
        linear: Linear,
        l2_reg: f64,
    },
    BatchNorm(BatchNorm),
    Activation(Activation),
}

impl Layer {
    fn build(spec: &LayerSpec, input: Shape, vb: VarBuilder) -> Result<Self> {
        let layer = match (spec, input) {
            (
                LayerSpec::Conv1d {
                    filters,
                    kernel_size,
                    activation,
                },
                Shape::Sequence { channels, .. },
            ) => {
                let init =
                    WeightInit::GlorotUniform.init(kernel_size * channels, kernel_size * filters);
                let weight = vb.get_with_hints((*filters, channels, *kernel_size), "weight", init)?;
                let bias = vb.get_with_hints(*filters, "bias", Init::Const(0.0))?;
                let config = Conv1dConfig {
                    padding: kernel_size / 2,
                    ..Default::default()
                };
                Self::Conv {
                    conv: Conv1d::new(weight, Some(bias), config),
                    activation: *activation,
                }
            }
            (LayerSpec::Dense { units, init, l2_reg }, Shape::Flat(features)) => {
                let weight =
                    vb.get_with_hints((*units, features), "weight", init.init(features, *units))?;
                let bias = vb.get_with_hints(*units, "bias", Init::Const(0.0))?;
                Self::Dense {
                    linear: Linear::new(weight, Some(bias)),
                    l2_reg: *l2_reg,
                }
            }
            (LayerSpec::BatchNorm { eps, momentum }, shape) => {
                let config = BatchNormConfig {
                    eps: *eps,
                    momentum: *momentum,
                    ..Default::default()
                };
                Self::BatchNorm(batch_norm(shape.channels(), config, vb)?)
            }
            (LayerSpec::MaxPool1d { pool_size }, _) => Self::MaxPool(*pool_size),
            (LayerSpec::Dropout { rate }, _) => Self::Dropout(Dropout::new(*rate)),
            (LayerSpec::Flatten, _) => Self::Flatten,
            (LayerSpec::Activation { activation }, _) => Self::Activation(*activation),
            (spec, shape) => {
                return Err(Error::InvalidConfig(format!(
                    "{} cannot take input of shape {}",
                    spec.name(),
                    shape
                )))
            }
        };
        Ok(layer)
    }

    fn forward_t(&self, x: &Tensor, train: bool) -> CandleResult<Tensor> {
        match self {
            Self::Conv { conv, activation } => activation.apply(&conv.forward(x)?),
            Self::MaxPool(size) => x.unsqueeze(3)?.max_pool2d((*size, 1))?.squeeze(3),
            Self::Dropout(dropout) => dropout.forward_t(x, train),
            Self::Flatten => x.flatten_from(1),
            Self::Dense { linear, .. } => linear.forward(x),
            Self::BatchNorm(bn) => bn.forward_t(x, train),
            Self::Activation(activation) => activation.apply(x),
        }
    }
}

/// A sequential stack of layers built from specs. Sequence inputs are laid
/// out `(batch, channels, length)`.
pub struct LayerStack {
    layers: Vec<Layer>,
    output: Shape,
}

impl LayerStack {
    pub fn build(specs: &[LayerSpec], input: Shape, vb: &VarBuilder) -> Result<Self> {
        let mut counters: HashMap<&'static str, usize> = HashMap::new();
        let mut layers = Vec::with_capacity(specs.len());
        let mut shape = input;

        for spec in specs {
            let layer_vb = match spec.var_prefix() {
                Some(prefix) => {
                    let n = counters.entry(prefix).or_insert(0);
                    *n += 1;
                    vb.pp(format!("{}{}", prefix, n))
                }
                None => vb.clone(),
            };

            let next = spec.output_shape(shape)?;
            layers.push(Layer::build(spec, shape, layer_vb)?);
            shape = next;
        }

        Ok(Self {
            layers,
            output: shape,
        })
    }

    pub fn output_shape(&self) -> Shape {
        self.output
    }

    /// `Σ l2 · ‖W‖²` over dense kernels with a non-zero penalty.
    pub fn l2_penalty(&self) -> CandleResult<Option<Tensor>> {
        let mut total: Option<Tensor> = None;
        for layer in &self.layers {
            if let Layer::Dense { linear, l2_reg } = layer {
                if *l2_reg > 0.0 {
                    let term = (linear.weight().sqr()?.sum_all()? * *l2_reg)?;
                    total = Some(match total {
                        Some(acc) => (acc + term)?,
                        None => term,
                    });
                }
            }
        }
        Ok(total)
    }
}

impl ModuleT for LayerStack {
    fn forward_t(&self, x: &Tensor, train: bool) -> CandleResult<Tensor> {
        let mut x = x.clone();
        for layer in &self.layers {
            x = layer.forward_t(&x, train)?;
        }
        Ok(x)
    }
}
