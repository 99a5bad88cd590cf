mod args;
mod training;
mod utils;

use std::error::Error;

use args::Args;
use clap::Parser;
use log::LevelFilter;
use posenet::dataset::load_data;
use simplelog::{Config, SimpleLogger};
use training::run_sessions;
use utils::device::get_device;

fn main() -> Result<(), Box<dyn Error>> {
    let args = init()?;
    let config = args.to_config();
    let device = get_device()?;

    let data = load_data(&config.data_path, config.square_theta, &config.load)?;
    data.log();

    let reports = run_sessions(&config, &data, &device)?;
    for report in &reports {
        log::info!(
            "{}: {} epochs, loss {}, val_loss {}, model {}",
            report.tag,
            report.epochs,
            format_metric(report.final_loss),
            format_metric(report.final_val_loss),
            report.model.parameters.display()
        );
    }

    log::info!("Done!");
    Ok(())
}

fn format_metric(value: Option<f32>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.5}", v))
}

fn init() -> Result<Args, Box<dyn Error>> {
    SimpleLogger::init(LevelFilter::Info, Config::default())?;
    Ok(Args::parse())
}
