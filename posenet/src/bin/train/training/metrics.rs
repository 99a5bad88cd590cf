/// Sample-weighted running averages of loss and accuracy over one epoch.
#[derive(Debug, Clone, Default)]
pub struct EpochMetrics {
    loss_sum: f64,
    acc_sum: f64,
    samples: usize,
}

impl EpochMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, loss: f32, accuracy: f32, batch_len: usize) {
        self.loss_sum += loss as f64 * batch_len as f64;
        self.acc_sum += accuracy as f64 * batch_len as f64;
        self.samples += batch_len;
    }

    pub fn loss(&self) -> f32 {
        (self.loss_sum / self.samples.max(1) as f64) as f32
    }

    pub fn accuracy(&self) -> f32 {
        (self.acc_sum / self.samples.max(1) as f64) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_by_batch_size() {
        let mut metrics = EpochMetrics::new();
        metrics.add(1.0, 1.0, 3);
        metrics.add(3.0, 0.0, 1);

        assert!((metrics.loss() - 1.5).abs() < 1e-6);
        assert!((metrics.accuracy() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_empty_epoch() {
        let metrics = EpochMetrics::new();
        assert_eq!(metrics.loss(), 0.0);
        assert_eq!(metrics.accuracy(), 0.0);
    }
}
