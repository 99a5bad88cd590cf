use std::error::Error;
use std::path::PathBuf;

use candle_core::Device;
use candle_nn::VarMap;
use posenet::artifact::{history_path, load_cnn, save_model, Architecture, ArtifactPaths};
use posenet::config::TrainingConfig;
use posenet::dataset::PreparedData;
use posenet::network::PoseNetwork;

use super::trainer::Trainer;
use super::{create_network, create_optimizer};

/// Outcome of one training session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub tag: String,
    pub epochs: usize,
    pub final_loss: Option<f32>,
    pub final_val_loss: Option<f32>,
    pub model: ArtifactPaths,
    pub history: PathBuf,
}

pub struct Session<'a> {
    config: &'a TrainingConfig,
    tag: String,
}

impl<'a> Session<'a> {
    pub fn new(config: &'a TrainingConfig, tag: String) -> Self {
        Self { config, tag }
    }

    pub fn run(&self, data: &PreparedData, device: &Device) -> Result<SessionReport, Box<dyn Error>> {
        let (network, varmap) = self.obtain_model(data, device)?;
        self.log_parameters(network.config());

        let mut optimizer = create_optimizer(&varmap, &self.config.optimizer)?;
        let split = data.to_tensors(&self.config.target_columns, device)?;

        let mut trainer = Trainer::new(
            self.config.batch_size,
            self.config.epochs,
            self.config.optimizer.clone(),
        );
        let history = trainer.fit(&network, &mut optimizer, &split)?;
        log::info!(
            "Session {} finished after {} optimizer updates",
            self.tag,
            trainer.iterations()
        );
        for metric in history.metrics() {
            if let Some(value) = history.last(metric) {
                log::info!("  final {}: {:.5}", metric, value);
            }
        }

        let history_file = history_path(&self.config.output_dir, &self.tag);
        history.save(&history_file)?;
        log::info!("Saved history to {}", history_file.display());

        let model = ArtifactPaths::cnn_run(&self.config.output_dir, &self.tag);
        save_model(&model, &Architecture::cnn(network.config()), &varmap)?;

        Ok(SessionReport {
            tag: self.tag.clone(),
            epochs: history.epochs(),
            final_loss: history.last("loss"),
            final_val_loss: history.last("val_loss"),
            model,
            history: history_file,
        })
    }

    fn obtain_model(
        &self,
        data: &PreparedData,
        device: &Device,
    ) -> Result<(PoseNetwork, VarMap), Box<dyn Error>> {
        let Some(existing) = &self.config.existing_model else {
            log::info!("Creating network");
            let config = self.config.network.clone().with_input_dim(data.input_dim);
            let (network, varmap) = create_network(&config, device)?;
            network.log_summary()?;
            return Ok((network, varmap));
        };

        let paths = ArtifactPaths::named(&existing.dir, &existing.name);
        let (network, varmap) = load_cnn(&paths, device)?;
        log::info!("Loaded model from disk: {}", paths.architecture.display());

        let loaded = network.config();
        if loaded.input_dim != data.input_dim {
            return Err(posenet::Error::InvalidConfig(format!(
                "model {} expects {} sensor channels, data has {}",
                existing.name, loaded.input_dim, data.input_dim
            ))
            .into());
        }
        if loaded.output_dim != self.config.target_columns.len() {
            return Err(posenet::Error::InvalidConfig(format!(
                "model {} predicts {} values, {} target columns were requested",
                existing.name,
                loaded.output_dim,
                self.config.target_columns.len()
            ))
            .into());
        }

        Ok((network, varmap))
    }

    fn log_parameters(&self, network: &posenet::network::NetworkConfig) {
        let adam = &self.config.optimizer;
        log::info!("Training parameters for {}:", self.tag);
        log::info!("  epochs: {}, batch size: {}", self.config.epochs, self.config.batch_size);
        log::info!("  optimizer: adam, loss: mean absolute error");
        log::info!(
            "  learning rate: {}, decay: {}, beta1: {}, beta2: {}, eps: {}",
            adam.learning_rate,
            adam.decay,
            adam.beta1,
            adam.beta2,
            adam.eps
        );
        log::info!(
            "  hidden units: {}, activation: {}, dropout: {}, l2: {}",
            network.hidden_size,
            network.activation,
            network.dropout,
            network.l2_reg
        );
        log::info!(
            "  square theta: {}, targets: {:?}",
            self.config.square_theta,
            self.config.target_columns
        );
    }
}
