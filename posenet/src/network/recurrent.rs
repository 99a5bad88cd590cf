use candle_core::{DType, Device, Module, ModuleT, Result as CandleResult, Tensor};
use candle_nn::{linear, lstm, LSTMConfig, Linear, VarBuilder, VarMap, LSTM, RNN};
use serde::{Deserialize, Serialize};

use super::layers::{LayerStack, Shape};
use super::model::channels_first;
use super::NetworkConfig;
use crate::error::{Error, Result};

/// Units in each of the two recurrent layers.
pub const RECURRENT_HIDDEN_SIZE: usize = 64;

/// Variables with this prefix belong to the convolutional trunk.
const TRUNK_PREFIX: &str = "conv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentConfig {
    /// Topology of the convolutional network the trunk is taken from.
    pub encoder: NetworkConfig,
    pub state_dim: usize,
    pub hidden_size: usize,
    pub output_dim: usize,
}

impl RecurrentConfig {
    pub fn new(encoder: NetworkConfig, state_dim: usize) -> Self {
        let output_dim = encoder.output_dim;
        Self {
            encoder,
            state_dim,
            hidden_size: RECURRENT_HIDDEN_SIZE,
            output_dim,
        }
    }
}

/// Sequence model over scans: each scan is encoded by the convolutional
/// trunk, concatenated with the state vector of the same step, and fed
/// through two stacked LSTMs and a linear output layer.
pub struct RecurrentNetwork {
    config: RecurrentConfig,
    encoder: LayerStack,
    encoded_dim: usize,
    lstm1: LSTM,
    lstm2: LSTM,
    output: Linear,
}

impl RecurrentNetwork {
    pub fn new(config: &RecurrentConfig, vs: &VarBuilder) -> Result<Self> {
        config.encoder.validate()?;

        let encoder = LayerStack::build(
            &config.encoder.trunk_layers(),
            config.encoder.input_shape(),
            vs,
        )?;
        let encoded_dim = match encoder.output_shape() {
            Shape::Flat(features) => features,
            shape => {
                return Err(Error::InvalidConfig(format!(
                    "encoder must end flat, got {}",
                    shape
                )))
            }
        };

        let lstm1 = lstm(
            encoded_dim + config.state_dim,
            config.hidden_size,
            LSTMConfig::default(),
            vs.pp("lstm1"),
        )?;
        let lstm2 = lstm(
            config.hidden_size,
            config.hidden_size,
            LSTMConfig::default(),
            vs.pp("lstm2"),
        )?;
        let output = linear(config.hidden_size, config.output_dim, vs.pp("output"))?;

        Ok(Self {
            config: config.clone(),
            encoder,
            encoded_dim,
            lstm1,
            lstm2,
            output,
        })
    }

    /// Builds the recurrent network and copies the convolutional trunk
    /// weights out of a trained pose network's variables.
    pub fn from_cnn(
        trained: &VarMap,
        config: &RecurrentConfig,
        device: &Device,
    ) -> Result<(Self, VarMap)> {
        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let network = Self::new(config, &vs)?;

        let copied = transfer_trunk(trained, &varmap)?;
        log::info!("Copied {} trunk tensors from the trained network", copied);

        Ok((network, varmap))
    }

    pub fn config(&self) -> &RecurrentConfig {
        &self.config
    }

    /// `scans`: `(batch, steps, channels)`, `states`: `(batch, steps, state_dim)`.
    /// Returns `(batch, steps, output_dim)`.
    pub fn forward_t(&self, scans: &Tensor, states: &Tensor, train: bool) -> CandleResult<Tensor> {
        let (batch, steps, channels) = scans.dims3()?;

        let flat = scans.reshape((batch * steps, channels, 1))?;
        let encoded = self.encoder.forward_t(&channels_first(&flat)?, train)?;
        let encoded = encoded.reshape((batch, steps, self.encoded_dim))?;

        let x = Tensor::cat(&[&encoded, states], 2)?;

        let h1 = self.lstm1.states_to_tensor(&self.lstm1.seq(&x)?)?;
        let h2 = self.lstm2.states_to_tensor(&self.lstm2.seq(&h1)?)?;

        self.output.forward(&h2)
    }
}

fn transfer_trunk(source: &VarMap, target: &VarMap) -> Result<usize> {
    let source = source
        .data()
        .lock()
        .map_err(|e| candle_core::Error::Msg(e.to_string()))?;
    let target = target
        .data()
        .lock()
        .map_err(|e| candle_core::Error::Msg(e.to_string()))?;

    let mut copied = 0;
    for (name, var) in target.iter() {
        if !name.starts_with(TRUNK_PREFIX) {
            continue;
        }
        let trained = source.get(name).ok_or_else(|| {
            Error::InvalidConfig(format!("trained network has no variable '{}'", name))
        })?;
        var.set(trained.as_tensor())?;
        copied += 1;
    }
    Ok(copied)
}
