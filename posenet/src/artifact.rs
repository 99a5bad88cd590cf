//! On-disk model artifacts.
//!
//! A model is stored as two files sharing a name: `model_<name>.json` holds
//! the architecture description and `model_<name>.safetensors` the learned
//! parameters. Training runs are named `cnn_<tag>`, their histories go to
//! `eval-data_cnn_<tag>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::{LayerSpec, NetworkConfig, PoseNetwork, RecurrentConfig};

/// Serialized topology of a saved model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Architecture {
    Cnn {
        config: NetworkConfig,
        layers: Vec<LayerSpec>,
    },
    Recurrent {
        config: RecurrentConfig,
    },
}

impl Architecture {
    pub fn cnn(config: &NetworkConfig) -> Self {
        Self::Cnn {
            config: config.clone(),
            layers: config.layers(),
        }
    }

    pub fn recurrent(config: &RecurrentConfig) -> Self {
        Self::Recurrent {
            config: config.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub architecture: PathBuf,
    pub parameters: PathBuf,
}

impl ArtifactPaths {
    pub fn named(dir: &Path, name: &str) -> Self {
        Self {
            architecture: dir.join(format!("model_{}.json", name)),
            parameters: dir.join(format!("model_{}.safetensors", name)),
        }
    }

    /// Artifacts of the convolutional training run `tag`.
    pub fn cnn_run(dir: &Path, tag: &str) -> Self {
        Self::named(dir, &format!("cnn_{}", tag))
    }
}

pub fn history_path(dir: &Path, tag: &str) -> PathBuf {
    dir.join(format!("eval-data_cnn_{}.json", tag))
}

/// Tag of the `index`-th run: the index appended to the base tag.
pub fn run_tag(base: &str, index: usize) -> String {
    format!("{}{}", base, index)
}

pub fn save_model(paths: &ArtifactPaths, architecture: &Architecture, varmap: &VarMap) -> Result<()> {
    for path in [&paths.architecture, &paths.parameters] {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(
        &paths.architecture,
        serde_json::to_string_pretty(architecture)?,
    )?;
    varmap.save(&paths.parameters)?;

    log::info!(
        "Saved model to {} and {}",
        paths.architecture.display(),
        paths.parameters.display()
    );
    Ok(())
}

pub fn load_architecture(path: &Path) -> Result<Architecture> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Rebuilds a convolutional network from its artifacts, skipping the
/// initialiser: every variable is overwritten by the stored parameters.
pub fn load_cnn(paths: &ArtifactPaths, device: &Device) -> Result<(PoseNetwork, VarMap)> {
    let config = match load_architecture(&paths.architecture)? {
        Architecture::Cnn { config, layers } => {
            if layers != config.layers() {
                return Err(Error::InvalidConfig(format!(
                    "{} lists layers that do not match its configuration",
                    paths.architecture.display()
                )));
            }
            config
        }
        Architecture::Recurrent { .. } => {
            return Err(Error::InvalidConfig(format!(
                "{} describes a recurrent network, expected a convolutional one",
                paths.architecture.display()
            )))
        }
    };

    let mut varmap = VarMap::new();
    let vs = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let network = PoseNetwork::new(&config, &vs)?;
    varmap.load(&paths.parameters)?;

    Ok((network, varmap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Tensor;

    use crate::network::{Activation, RecurrentNetwork};

    fn config() -> NetworkConfig {
        NetworkConfig {
            hidden_size: 4,
            activation: Activation::Sigmoid,
            l2_reg: 0.01,
            ..NetworkConfig::default()
        }
        .with_input_dim(64)
    }

    #[test]
    fn test_naming_convention() {
        let dir = Path::new("data");
        let tag = run_tag("_240_fun_0", 3);
        assert_eq!(tag, "_240_fun_03");

        let paths = ArtifactPaths::cnn_run(dir, &tag);
        assert_eq!(paths.architecture, dir.join("model_cnn__240_fun_03.json"));
        assert_eq!(
            paths.parameters,
            dir.join("model_cnn__240_fun_03.safetensors")
        );
        assert_eq!(
            history_path(dir, &tag),
            dir.join("eval-data_cnn__240_fun_03.json")
        );
        assert_eq!(
            ArtifactPaths::named(dir, "cnn_07").architecture,
            dir.join("model_cnn_07.json")
        );
    }

    #[test]
    fn test_cnn_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = ArtifactPaths::named(dir.path(), "roundtrip");
        let config = config();

        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let original = PoseNetwork::new(&config, &vs)?;
        save_model(&paths, &Architecture::cnn(&config), &varmap)?;

        let (loaded, _) = load_cnn(&paths, &Device::Cpu)?;
        assert_eq!(loaded.config(), &config);

        let x = Tensor::rand(0f32, 7.0, (4, 64, 1), &Device::Cpu)?;
        let expected = original.predict(&x)?.to_vec2::<f32>()?;
        let actual = loaded.predict(&x)?.to_vec2::<f32>()?;
        assert_eq!(expected, actual);
        Ok(())
    }

    #[test]
    fn test_architecture_json_is_readable() -> Result<()> {
        let json = serde_json::to_value(Architecture::cnn(&config()))?;
        assert_eq!(json["model"], "cnn");
        assert_eq!(json["config"]["activation"], "sigmoid");
        assert_eq!(json["layers"][0]["type"], "conv1d");
        assert_eq!(json["layers"][0]["filters"], 4);
        Ok(())
    }

    #[test]
    fn test_kind_mismatch() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = ArtifactPaths::named(dir.path(), "rnn");
        let config = RecurrentConfig::new(config(), 3);

        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        RecurrentNetwork::new(&config, &vs)?;
        save_model(&paths, &Architecture::recurrent(&config), &varmap)?;

        assert!(matches!(
            load_cnn(&paths, &Device::Cpu),
            Err(Error::InvalidConfig(_))
        ));
        assert_eq!(
            load_architecture(&paths.architecture)?,
            Architecture::recurrent(&config)
        );
        Ok(())
    }

    #[test]
    fn test_missing_artifact() {
        let paths = ArtifactPaths::named(Path::new("does/not/exist"), "cnn_07");
        assert!(matches!(
            load_cnn(&paths, &Device::Cpu),
            Err(Error::Io(_))
        ));
    }
}
