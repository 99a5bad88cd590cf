use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "Pose RNN Converter")]
#[command(author = "Jørgen Hanssen <jorgen@hanssen.io>")]
#[command(version = "0.1.0")]
pub struct Args {
    /// Directory holding the trained model; the converted model is written here too.
    #[arg(long, default_value = "data")]
    pub model_dir: PathBuf,

    /// Name of the trained convolutional model, as in `model_<NAME>.json`.
    #[arg(long, value_name = "NAME", default_value = "cnn_07")]
    pub model: String,

    /// Width of the per-step state vector concatenated to each encoded scan.
    #[arg(long, default_value_t = 3)]
    pub state_dim: usize,

    /// Name of the converted model. Defaults to the source name with `cnn` replaced by `rnn`.
    #[arg(long, value_name = "NAME")]
    pub output: Option<String>,
}

impl Args {
    pub fn output_name(&self) -> String {
        match &self.output {
            Some(name) => name.clone(),
            None => match self.model.strip_prefix("cnn") {
                Some(rest) => format!("rnn{}", rest),
                None => format!("rnn_{}", self.model),
            },
        }
    }
}
