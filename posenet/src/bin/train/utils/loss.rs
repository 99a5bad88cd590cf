use candle_core::{DType, Result as CandleResult, Tensor, D};
use posenet::network::PoseNetwork;

pub fn mae(pred: &Tensor, target: &Tensor) -> CandleResult<Tensor> {
    (pred - target)?.abs()?.mean_all()
}

/// Training objective: mean absolute error plus the network's L2 penalty.
pub fn objective(network: &PoseNetwork, pred: &Tensor, target: &Tensor) -> CandleResult<Tensor> {
    let loss = mae(pred, target)?;
    match network.l2_penalty()? {
        Some(penalty) => loss + penalty,
        None => Ok(loss),
    }
}

/// Fraction of rows whose largest predicted component is also the largest target component.
pub fn categorical_accuracy(pred: &Tensor, target: &Tensor) -> CandleResult<f32> {
    pred.argmax(D::Minus1)?
        .eq(&target.argmax(D::Minus1)?)?
        .to_dtype(DType::F32)?
        .mean_all()?
        .to_scalar::<f32>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_mae() -> CandleResult<()> {
        let pred = Tensor::new(&[[1f32, 2.0, 3.0], [0.0, 0.0, 0.0]], &Device::Cpu)?;
        let target = Tensor::new(&[[1f32, 0.0, 4.0], [-1.0, 0.5, 0.0]], &Device::Cpu)?;

        // |0| + |2| + |-1| + |1| + |-0.5| + |0| = 4.5 over 6 values
        let loss = mae(&pred, &target)?.to_scalar::<f32>()?;
        assert!((loss - 0.75).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_categorical_accuracy() -> CandleResult<()> {
        let pred = Tensor::new(
            &[[0.9f32, 0.1, 0.0], [0.2, 0.7, 0.1], [0.0, 0.0, 1.0], [0.5, 0.4, 0.1]],
            &Device::Cpu,
        )?;
        let target = Tensor::new(
            &[[1f32, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            &Device::Cpu,
        )?;

        let acc = categorical_accuracy(&pred, &target)?;
        assert!((acc - 0.5).abs() < 1e-6);
        Ok(())
    }
}
