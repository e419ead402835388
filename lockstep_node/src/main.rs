//! lockstep entry point.

use clap::Parser;
use eyre::{Result, WrapErr, eyre};
use lockstep_core::ReplayError;
use lockstep_node::{
    Config, ReplayNode,
    cli::{Cli, Commands, RunArgs},
    describe_log,
};
use std::process::ExitCode;
use tokio::{signal, sync::watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<ReplayError>()
                .map(ReplayError::exit_code)
                .unwrap_or(1);

            if tracing::dispatcher::has_been_set() {
                error!(error = ?err, exit_code = code, "lockstep failed");
            } else {
                eprintln!("Error: {err:?}");
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let Cli {
        verbose,
        quiet,
        command,
    } = cli;

    match command {
        Commands::Run(args) => {
            let config = load_config(&args)?;
            init_logging(verbose, quiet, &config.logging.level)?;
            run_replay(config)
        }
        Commands::Info(args) => {
            init_logging(verbose, quiet, "info")?;
            describe_log(&args.bag)
        }
    }
}

/// Load the configuration file and apply command-line overrides.
fn load_config(args: &RunArgs) -> Result<Config> {
    let mut config = Config::load(&args.config)?;

    if let Some(bag) = &args.bag {
        config.log.path = bag.clone();
    }
    if let Some(start_frame) = args.start_frame {
        config.replay.start_frame_index = start_frame;
    }
    if let Some(trace_dir) = &args.trace_dir {
        config.output.trace_dir = trace_dir.clone();
    }

    config.validate()?;
    Ok(config)
}

/// `RUST_LOG` wins, then -v/-q, then the configured level.
fn init_logging(verbose: u8, quiet: bool, configured: &str) -> Result<()> {
    let fallback = if quiet {
        "warn"
    } else {
        match verbose {
            0 => configured,
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))
}

fn run_replay(config: Config) -> Result<()> {
    let hold_on_finish = config.replay.hold_on_finish;
    let node = ReplayNode::new(config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("Failed to create tokio runtime")?;

    runtime.block_on(async move {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut hold = shutdown_rx.clone();

        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Ctrl+C received, stopping after the current frame");
                    shutdown_tx.send_replace(true);
                }
                Err(e) => warn!(error = %e, "unable to listen for Ctrl+C"),
            }
        });

        let outcome = tokio::task::spawn_blocking(move || node.run(shutdown_rx))
            .await
            .wrap_err("Replay task failed")??;

        if hold_on_finish && !outcome.is_interrupted() {
            info!("replay finished, press Ctrl+C to exit");
            // a closed channel means no signal can arrive anymore
            let _ = hold.wait_for(|stop| *stop).await;
        }

        info!("lockstep shutting down");
        Ok(())
    })
}
