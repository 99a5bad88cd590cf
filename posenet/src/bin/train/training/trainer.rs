use std::error::Error;

use candle_core::{ModuleT, Tensor};
use candle_nn::{AdamW, Optimizer};
use posenet::config::AdamConfig;
use posenet::dataset::TensorSplit;
use posenet::history::History;
use posenet::network::PoseNetwork;
use rand::{seq::SliceRandom, thread_rng};

use super::evaluation::evaluate;
use super::metrics::EpochMetrics;
use super::progress::TrainingProgressBar;
use crate::utils::loss::{categorical_accuracy, objective};

/// Runs every epoch; there is no early stopping.
pub struct Trainer {
    batch_size: usize,
    epochs: usize,
    schedule: AdamConfig,
    iterations: usize,
}

impl Trainer {
    pub fn new(batch_size: usize, epochs: usize, schedule: AdamConfig) -> Self {
        Self {
            batch_size,
            epochs,
            schedule,
            iterations: 0,
        }
    }

    /// Optimizer updates performed so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn fit(
        &mut self,
        network: &PoseNetwork,
        optimizer: &mut AdamW,
        split: &TensorSplit,
    ) -> Result<History, Box<dyn Error>> {
        let mut history = History::new();

        let num_samples = split.train_x.dim(0)?;
        let has_validation = split.test_x.dim(0)? > 0;
        if !has_validation {
            log::warn!("Test split is empty, no validation metrics will be recorded");
        }

        let mut indices: Vec<u32> = (0..num_samples as u32).collect();

        for epoch in 1..=self.epochs {
            let num_batches = num_samples.div_ceil(self.batch_size);
            let progress = TrainingProgressBar::new(num_batches, epoch, self.epochs)?;

            indices.shuffle(&mut thread_rng());

            let train = self.train_epoch(network, optimizer, split, &indices, &progress)?;
            if !train.loss().is_finite() {
                return Err(posenet::Error::Diverged {
                    epoch,
                    loss: train.loss(),
                }
                .into());
            }

            history.record("loss", train.loss());
            history.record("acc", train.accuracy());

            let val = if has_validation {
                let val = evaluate(network, &split.test_x, &split.test_y, self.batch_size)?;
                history.record("val_loss", val.loss());
                history.record("val_acc", val.accuracy());
                Some(val)
            } else {
                None
            };

            progress.finish(&train, val.as_ref());
        }

        Ok(history)
    }

    fn train_epoch(
        &mut self,
        network: &PoseNetwork,
        optimizer: &mut AdamW,
        split: &TensorSplit,
        indices: &[u32],
        progress: &TrainingProgressBar,
    ) -> Result<EpochMetrics, Box<dyn Error>> {
        let mut metrics = EpochMetrics::new();
        let device = split.train_x.device();

        for batch in indices.chunks(self.batch_size) {
            let batch_idx = Tensor::from_slice(batch, batch.len(), device)?;
            let x_batch = split.train_x.index_select(&batch_idx, 0)?;
            let y_batch = split.train_y.index_select(&batch_idx, 0)?;

            let preds = network.forward_t(&x_batch, true)?;
            let loss = objective(network, &preds, &y_batch)?;

            optimizer.set_learning_rate(self.schedule.learning_rate_at(self.iterations));
            optimizer.backward_step(&loss)?;
            self.iterations += 1;

            metrics.add(
                loss.to_scalar::<f32>()?,
                categorical_accuracy(&preds, &y_batch)?,
                batch.len(),
            );
            progress.update(metrics.loss());
        }

        Ok(metrics)
    }
}
