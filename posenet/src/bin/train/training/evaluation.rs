use candle_core::{ModuleT, Result as CandleResult, Tensor};
use posenet::network::PoseNetwork;

use super::metrics::EpochMetrics;
use crate::utils::loss::{categorical_accuracy, objective};

/// Scores the network in inference mode over `x`/`y` in batches.
pub fn evaluate(
    network: &PoseNetwork,
    x: &Tensor,
    y: &Tensor,
    batch_size: usize,
) -> CandleResult<EpochMetrics> {
    let mut metrics = EpochMetrics::new();
    let num_samples = x.dim(0)?;

    let mut start = 0;
    while start < num_samples {
        let len = batch_size.min(num_samples - start);
        let x_batch = x.narrow(0, start, len)?;
        let y_batch = y.narrow(0, start, len)?;

        let preds = network.forward_t(&x_batch, false)?;
        let loss = objective(network, &preds, &y_batch)?;

        metrics.add(
            loss.to_scalar::<f32>()?,
            categorical_accuracy(&preds, &y_batch)?,
            len,
        );
        start += len;
    }

    Ok(metrics)
}
