use phase2_cli::*;
use phase2_coordinator::{logger::initialize_logger, Environment};

use gumdrop::Options;
use std::{process, time::Instant};
use tracing::{error, info};

async fn execute_cmd(opts: Phase2Opts, environment: &Environment) -> anyhow::Result<()> {
    let command = opts.command.unwrap_or_else(|| {
        eprintln!("No command was provided.");
        eprintln!("{}", Phase2Opts::usage());
        process::exit(2)
    });

    let now = Instant::now();
    match &command {
        Command::P1i(opt) => import_ptau(opt).await?,
        Command::P1n(opt) => new_transcript(opt).await?,
        Command::P2n(opt) => initialize(environment, opt).await?,
        Command::P2u(opt) => upload(environment, opt).await?,
        Command::P2c(opt) => contribute(environment, opt).await?,
        Command::P2v(opt) => verify(environment, opt).await?,
        Command::Presigned(opt) => presigned(environment, opt)?,
        Command::Key(opt) => extract_keys(environment, opt).await?,
        Command::Sol(opt) => export_verifier(opt).await?,
    };

    info!("Executing {:?} took: {:?}", command, now.elapsed());
    Ok(())
}

#[tokio::main]
async fn main() {
    let opts: Phase2Opts = Phase2Opts::parse_args_default_or_exit();

    let environment = Environment::from_env().unwrap_or_else(|error| {
        eprintln!("Invalid environment: {}", error);
        process::exit(1)
    });
    initialize_logger(&environment);

    if let Err(error) = execute_cmd(opts, &environment).await {
        error!("{:#}", error);
        process::exit(1);
    }
}
