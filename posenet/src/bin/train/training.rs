pub mod evaluation;
pub mod metrics;
pub mod progress;
pub mod session;
pub mod trainer;

use std::error::Error;

use candle_core::{DType, Device};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use posenet::artifact::run_tag;
use posenet::config::{AdamConfig, TrainingConfig};
use posenet::dataset::PreparedData;
use posenet::network::{NetworkConfig, PoseNetwork};

pub use session::{Session, SessionReport};

pub fn create_network(
    config: &NetworkConfig,
    device: &Device,
) -> posenet::Result<(PoseNetwork, VarMap)> {
    let varmap = VarMap::new();
    let vs = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let network = PoseNetwork::new(config, &vs)?;
    Ok((network, varmap))
}

pub fn create_optimizer(varmap: &VarMap, adam: &AdamConfig) -> candle_core::Result<AdamW> {
    AdamW::new(
        varmap.all_vars(),
        ParamsAdamW {
            lr: adam.learning_rate,
            beta1: adam.beta1,
            beta2: adam.beta2,
            eps: adam.eps,
            weight_decay: 0.0,
        },
    )
}

/// Trains `config.runs` independent models on the same split, one after the other.
pub fn run_sessions(
    config: &TrainingConfig,
    data: &PreparedData,
    device: &Device,
) -> Result<Vec<SessionReport>, Box<dyn Error>> {
    if config.batch_size == 0 {
        return Err(posenet::Error::InvalidConfig("batch size must be positive".into()).into());
    }
    if data.train_len() == 0 {
        return Err(posenet::Error::InvalidConfig("training split is empty".into()).into());
    }

    let mut reports = Vec::with_capacity(config.runs);
    for index in 1..=config.runs {
        let tag = run_tag(&config.run_tag, index);
        log::info!("Starting session {}/{} ({})", index, config.runs, tag);

        let report = Session::new(config, tag).run(data, device)?;
        reports.push(report);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_uses_adam_config() -> Result<(), Box<dyn Error>> {
        let config = NetworkConfig {
            hidden_size: 2,
            ..NetworkConfig::default()
        }
        .with_input_dim(64);
        let (_, varmap) = create_network(&config, &Device::Cpu)?;

        let adam = AdamConfig::default();
        let optimizer = create_optimizer(&varmap, &adam)?;
        assert_eq!(optimizer.learning_rate(), adam.learning_rate);
        Ok(())
    }
}
