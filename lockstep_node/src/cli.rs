//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lockstep - replay recorded IMU and camera logs into an estimator
#[derive(Parser, Debug)]
#[command(
    name = "lockstep",
    author,
    version,
    about = "Lockstep replay of recorded IMU and camera logs",
    long_about = "Feeds a recorded inertial stream and a recorded camera stream into a \n\
                  blocking estimator in strict temporal order, and records how long \n\
                  each frame took to process."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a log through the estimator
    Run(RunArgs),

    /// List the topics of a log
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "LOCKSTEP_CONFIG")]
    pub config: PathBuf,

    /// Override the log path from configuration
    #[arg(long, env = "LOCKSTEP_BAG")]
    pub bag: Option<PathBuf>,

    /// Override the number of leading frames to skip
    #[arg(long)]
    pub start_frame: Option<u64>,

    /// Override the output directory
    #[arg(long, env = "LOCKSTEP_TRACE_DIR")]
    pub trace_dir: Option<PathBuf>,
}

/// Arguments for the `info` command
#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {
    /// Path to the MCAP log
    #[arg(long)]
    pub bag: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "lockstep",
            "-vv",
            "run",
            "--config",
            "replay.yaml",
            "--bag",
            "run.mcap",
            "--start-frame",
            "100",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("replay.yaml"));
        assert_eq!(args.bag, Some(PathBuf::from("run.mcap")));
        assert_eq!(args.start_frame, Some(100));
        assert_eq!(args.trace_dir, None);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["lockstep", "-q", "-v", "info", "--bag", "x.mcap"]).is_err());
    }
}
