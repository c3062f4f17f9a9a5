use std::{env, io};

use log::{error, info};
use trainer::{JsonlSink, TrainerBuilder, TrainerConfig};

fn main() -> io::Result<()> {
    env_logger::init();

    if let Err(e) = run() {
        error!("{e}");
        return Err(e.into());
    }

    Ok(())
}

fn run() -> trainer::Result<()> {
    let config = match env::args().nth(1).or_else(|| env::var("CONFIG").ok()) {
        Some(path) => {
            info!("reading config from {path}");
            TrainerConfig::from_file(path)?
        }
        None => {
            info!("no config given, using the defaults");
            TrainerConfig::default()
        }
    };

    let mut sink = JsonlSink::create(&config.log_dir, config.version)?;
    info!("writing metrics to {}", sink.path().display());

    let mut session = TrainerBuilder::new().build(config)?;
    let reports = session.run(&mut sink)?;
    sink.flush()?;

    if let Some(last) = reports.last() {
        info!(
            epochs = reports.len(),
            loss = last.mean_loss,
            accuracy = last.mean_accuracy;
            "done"
        );
    }

    Ok(())
}
