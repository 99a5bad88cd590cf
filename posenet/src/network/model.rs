use candle_core::{ModuleT, Result as CandleResult, Tensor};
use candle_nn::VarBuilder;

use super::layers::{LayerSpec, LayerStack, Shape};
use super::NetworkConfig;
use crate::error::Result;

/// Convolutional pose regressor. Takes scans shaped `(batch, channels, 1)`
/// and returns poses shaped `(batch, output_dim)`.
pub struct PoseNetwork {
    config: NetworkConfig,
    stack: LayerStack,
}

impl PoseNetwork {
    pub fn new(config: &NetworkConfig, vs: &VarBuilder) -> Result<Self> {
        config.validate()?;
        let stack = LayerStack::build(&config.layers(), config.input_shape(), vs)?;

        Ok(Self {
            config: config.clone(),
            stack,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn l2_penalty(&self) -> CandleResult<Option<Tensor>> {
        self.stack.l2_penalty()
    }

    /// Inference-mode forward pass: no dropout, running batch-norm statistics.
    pub fn predict(&self, x: &Tensor) -> CandleResult<Tensor> {
        self.forward_t(x, false)
    }

    pub fn log_summary(&self) -> Result<()> {
        let rows = summary(&self.config.layers(), self.config.input_shape())?;

        log::info!("{:<14} {:<14} {:>10}", "Layer", "Output", "Params");
        for row in &rows {
            log::info!(
                "{:<14} {:<14} {:>10}",
                row.name,
                row.output.to_string(),
                row.params
            );
        }
        log::info!(
            "Total params: {}",
            rows.iter().map(|row| row.params).sum::<usize>()
        );
        Ok(())
    }
}

impl ModuleT for PoseNetwork {
    fn forward_t(&self, x: &Tensor, train: bool) -> CandleResult<Tensor> {
        self.stack.forward_t(&channels_first(x)?, train)
    }
}

/// `(batch, length, channels)` to the `(batch, channels, length)` layout
/// convolutions expect.
pub(crate) fn channels_first(x: &Tensor) -> CandleResult<Tensor> {
    x.transpose(1, 2)?.contiguous()
}

pub struct SummaryRow {
    pub name: &'static str,
    pub output: Shape,
    pub params: usize,
}

pub fn summary(specs: &[LayerSpec], input: Shape) -> Result<Vec<SummaryRow>> {
    let mut rows = Vec::with_capacity(specs.len());
    let mut shape = input;
    for spec in specs {
        let output = spec.output_shape(shape)?;
        rows.push(SummaryRow {
            name: spec.name(),
            output,
            params: spec.param_count(shape),
        });
        shape = output;
    }
    Ok(rows)
}
