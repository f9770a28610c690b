//! Command-line surface.
//!
//! Same `Cli`/`Command` derive shape (top-level
//! `#[command]` metadata, a global `-v`/`-vv` verbosity counter, and one
//! subcommand per top-level operation).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "dutycycle",
    about = "Mission-driven orchestration: plan, execute, and validate a Definition of Done against a Manager/Executor backend pair",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a mission defined in a mission file to completion (or a fatal stop)
    Run {
        /// Path to a mission definition (TOML, YAML, or JSON — detected by extension)
        mission_file: PathBuf,

        /// Manager backend name (overrides config)
        #[arg(long)]
        manager: Option<String>,

        /// Executor backend name (overrides config)
        #[arg(long)]
        executor: Option<String>,

        /// Resume the most recent active session for this mission instead of starting a new one
        #[arg(long, default_value_t = false)]
        resume: bool,
    },

    /// Show the status of the most recent session for a mission
    Status {
        /// Path to a mission definition
        mission_file: PathBuf,

        /// Emit machine-readable JSON output
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show resolved project configuration
    Config {
        /// Emit machine-readable JSON output
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_subcommand_parses_mission_path() {
        let cli = Cli::parse_from(["dutycycle", "run", "mission.toml"]);
        match cli.command {
            Command::Run { mission_file, manager, executor, resume } => {
                assert_eq!(mission_file, PathBuf::from("mission.toml"));
                assert!(manager.is_none());
                assert!(executor.is_none());
                assert!(!resume);
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn run_subcommand_accepts_backend_overrides() {
        let cli = Cli::parse_from(["dutycycle", "run", "mission.toml", "--manager", "claude", "--resume"]);
        match cli.command {
            Command::Run { manager, resume, .. } => {
                assert_eq!(manager.as_deref(), Some("claude"));
                assert!(resume);
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn verbosity_counts_repeated_flags() {
        let cli = Cli::parse_from(["dutycycle", "-vv", "config"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn config_json_flag_defaults_to_false() {
        let cli = Cli::parse_from(["dutycycle", "config"]);
        match cli.command {
            Command::Config { json } => assert!(!json),
            _ => panic!("expected Config"),
        }
    }
}
