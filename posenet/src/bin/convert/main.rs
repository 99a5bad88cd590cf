mod args;

use std::error::Error;

use args::Args;
use candle_core::Device;
use clap::Parser;
use log::LevelFilter;
use posenet::artifact::{load_cnn, save_model, Architecture, ArtifactPaths};
use posenet::network::{RecurrentConfig, RecurrentNetwork};
use simplelog::{Config, SimpleLogger};

fn main() -> Result<(), Box<dyn Error>> {
    let args = init()?;
    let device = Device::Cpu;

    let source = ArtifactPaths::named(&args.model_dir, &args.model);
    let (network, trained) = load_cnn(&source, &device)?;
    log::info!("Loaded model from disk: {}", source.architecture.display());

    let config = RecurrentConfig::new(network.config().clone(), args.state_dim);
    let (recurrent, varmap) = RecurrentNetwork::from_cnn(&trained, &config, &device)?;
    let built = recurrent.config();
    log::info!(
        "Recurrent network: 2 LSTM layers of {} units, state width {}, {} outputs",
        built.hidden_size,
        built.state_dim,
        built.output_dim
    );

    let target = ArtifactPaths::named(&args.model_dir, &args.output_name());
    save_model(&target, &Architecture::recurrent(built), &varmap)?;

    log::info!("Done!");
    Ok(())
}

fn init() -> Result<Args, Box<dyn Error>> {
    SimpleLogger::init(LevelFilter::Info, Config::default())?;
    Ok(Args::parse())
}
