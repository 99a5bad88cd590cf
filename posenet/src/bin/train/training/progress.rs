use indicatif::{ProgressBar, ProgressStyle};

use super::metrics::EpochMetrics;

pub struct TrainingProgressBar {
    bar: ProgressBar,
}

impl TrainingProgressBar {
    pub fn new(
        num_batches: usize,
        epoch: usize,
        epochs: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(num_batches as u64);
        bar.set_style(ProgressStyle::default_bar().template(
            "{prefix} {spinner:.cyan} {pos}/{len} [{wide_bar:.cyan/blue}] {eta_precise} | {msg}",
        )?);
        bar.set_prefix(format!("Epoch {}/{}", epoch, epochs));
        Ok(Self { bar })
    }

    pub fn update(&self, loss: f32) {
        self.bar.set_message(format!("loss: {:.5}", loss));
        self.bar.inc(1);
    }

    pub fn finish(&self, train: &EpochMetrics, val: Option<&EpochMetrics>) {
        let message = match val {
            Some(val) => format!(
                "loss: {:.5}, acc: {:.4}, val_loss: {:.5}, val_acc: {:.4}",
                train.loss(),
                train.accuracy(),
                val.loss(),
                val.accuracy()
            ),
            None => format!("loss: {:.5}, acc: {:.4}", train.loss(), train.accuracy()),
        };
        self.bar.set_message(message);
        self.bar.finish();
    }
}
