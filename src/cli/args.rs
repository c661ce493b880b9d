//! CLI argument definitions

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// shipwright - from a project request to a tested deliverable
#[derive(Parser, Debug)]
#[command(name = "shipwright")]
#[command(about = "Turn a natural-language project request into a tested, packaged deliverable")]
#[command(long_about = r#"
shipwright interviews you about a project, asks a generator command for code and
tests, runs the tests in a throwaway sandbox, repairs failures a bounded number
of times, and packages the accepted project as a zip archive.

EXAMPLES:
  # Full pipeline
  shipwright run "add two numbers and print the sum" --generator-cmd ./gen.sh

  # Run the sandbox alone on an existing project
  shipwright validate ./my-project

  # Show the effective configuration and where each value came from
  shipwright config

CONFIGURATION:
  Precedence: CLI flags > .shipwright/config.toml > defaults
  The config file is found by walking up from the current directory.

EXIT CODES:
  0 done, 2 config, 3 invalid input, 4 requirements incomplete,
  5 generation failed, 6 validation exhausted, 7 sandbox failure,
  8 packaging failed, 130 cancelled
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug-level console logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding run directories
    #[arg(long, global = true)]
    pub state_dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline for a request
    Run {
        /// The project request, in plain language
        request: String,

        /// Maximum generate/validate attempts
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Maximum clarifying questions before giving up
        #[arg(long)]
        turn_limit: Option<u32>,

        /// Test suite timeout in seconds
        #[arg(long, value_name = "SECS")]
        sandbox_timeout: Option<u64>,

        /// Generator command and its arguments
        #[arg(long, num_args = 1.., value_name = "ARGV", allow_hyphen_values = true)]
        generator_cmd: Option<Vec<String>>,
    },

    /// Run the validation sandbox on an existing project directory
    Validate {
        /// Project directory
        dir: PathBuf,

        /// Test suite timeout in seconds
        #[arg(long, value_name = "SECS")]
        sandbox_timeout: Option<u64>,
    },

    /// Print the effective configuration with sources
    Config,

    /// Remove the state directory and every run in it
    Clean {
        /// Do not ask for confirmation
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Overrides for configuration discovery.
    #[must_use]
    pub fn config_overrides(&self) -> shipwright_config::CliArgs {
        let mut args = shipwright_config::CliArgs {
            config_path: self.config.clone(),
            state_dir: self.state_dir.clone(),
            ..Default::default()
        };
        match &self.command {
            Commands::Run {
                max_attempts,
                turn_limit,
                sandbox_timeout,
                generator_cmd,
                ..
            } => {
                args.max_attempts = *max_attempts;
                args.turn_limit = *turn_limit;
                args.sandbox_timeout_secs = *sandbox_timeout;
                args.generator_command = generator_cmd.clone();
            }
            Commands::Validate {
                sandbox_timeout, ..
            } => {
                args.sandbox_timeout_secs = *sandbox_timeout;
            }
            Commands::Config | Commands::Clean { .. } => {}
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "shipwright",
            "run",
            "add two numbers",
            "--max-attempts",
            "1",
            "--sandbox-timeout",
            "5",
            "--generator-cmd",
            "python",
            "gen.py",
        ])
        .unwrap();
        let args = cli.config_overrides();
        assert_eq!(args.max_attempts, Some(1));
        assert_eq!(args.sandbox_timeout_secs, Some(5));
        assert_eq!(
            args.generator_command,
            Some(vec!["python".to_string(), "gen.py".to_string()])
        );
        assert!(args.turn_limit.is_none());
    }

    #[test]
    fn global_flags_apply_to_every_command() {
        let cli = Cli::try_parse_from(["shipwright", "config", "--state-dir", "/tmp/runs", "-v"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(
            cli.config_overrides().state_dir.as_deref().map(|p| p.as_str()),
            Some("/tmp/runs")
        );
    }
}
