use clap::Parser;
use log::{error, info};
use simple_logger::SimpleLogger;
use std::process::ExitCode;

use stepipe::{
    cli::Args,
    config::{env_var, Config, Settings},
    core::{list_steps, run},
    error::StepError,
};

fn main() -> ExitCode {
    let start = std::time::Instant::now();
    let args: Args = Args::parse();

    if let Err(e) = SimpleLogger::new().with_level(args.log_level()).init() {
        eprintln!("ERROR: Could not initialize logger: {}", e);
    }

    let code = launch(args).unwrap_or_else(|e| {
        error!("{}", e);
        1
    });

    let elapsed = start.elapsed();
    info!("Elapsed time: {:.3?}", elapsed);

    ExitCode::from(code)
}

fn launch(args: Args) -> Result<u8, StepError> {
    let config = Config::load(args.config.as_deref(), &env_var)?;
    let settings = Settings::resolve(args, config, &env_var)?;

    if settings.list_steps {
        return list_steps(&settings);
    }

    run(&settings, chrono::Local::now().date_naive())
}
