use batlayer_core::{BatLayerResult, Config};
use log::info;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod cli;
mod logger;

fn main() -> ExitCode {
    let args = cli::parse_args();

    if let Err(e) = logger::init_logger(args.quiet, args.verbose) {
        eprintln!("Failed to initialize logger: {e}");
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("batlayer: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: cli::Args) -> BatLayerResult<()> {
    let mut config = Config::load_or_default(args.config_path.as_deref())?;
    args.apply(&mut config);

    if args.dry_run {
        batlayer_core::dry_run(&config)?;
        info!("Configuration and icons OK");
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = shutdown.clone();
    ctrlc::set_handler(move || shutdown_signal.store(true, Ordering::SeqCst))
        .map_err(|e| format!("Could not install signal handler: {e}"))?;

    info!("Starting BatLayer {}", batlayer_core::version());
    batlayer_core::start(shutdown, config)?;
    info!("BatLayer stopped");
    Ok(())
}
