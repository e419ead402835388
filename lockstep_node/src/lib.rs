//! lockstep-node - Replay recorded IMU and camera logs in lockstep.
//!
//! This crate wires the [lockstep-core](../lockstep_core/index.html) replay
//! to an MCAP log on disk, a dry-run estimator and the trajectory and
//! timing files.
//!
//! # Configuration
//!
//! The node reads a YAML configuration file specifying:
//! - The MCAP log and the IMU and camera topics inside it
//! - Replay parameters (start frame, bootstrap window, IMU skip policy)
//! - The output directory and file names
//! - The default log level
//!
//! See the `config/example.yaml` file for a complete example.

pub mod cli;
pub mod config;
pub mod dry_run;
pub mod node;

pub use config::Config;
pub use dry_run::DryRunEstimator;
pub use node::{ReplayNode, describe_log};
