//! # ipscout CLI Module
//!
//! Command-line arguments and the startup sequence:
//!
//! 1. load `ipscout.toml` (or `--config`), then environment overrides,
//!    then `--log-dir` / `--save-dir`
//! 2. open the session and register the enabled modules
//! 3. run `--target`, each `--command` in order, and `--saveas`
//! 4. exit (`--exit-after`) or enter the interactive loop

mod repl;

use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::modules::{self, http::ApiClient};
use clap::Parser;
use ipscout_core::{Control, ReconError, SessionPaths, Shell};
use std::io::Write;
use std::path::{Path, PathBuf};

pub use repl::run_repl;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// ipscout - interactive reconnaissance shell
///
/// Set a target (IP, domain or URL), run investigative modules against it,
/// and export what they found as a relationship graph.
#[derive(Parser, Debug, Default)]
#[command(name = "ipscout")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Initial target (IP, domain or URL)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Command to run after the target is set (repeatable, runs in order)
    #[arg(short, long = "command", value_name = "CMD")]
    pub commands: Vec<String>,

    /// Copy the per-target log to this file after the commands
    #[arg(long, value_name = "FILE")]
    pub saveas: Option<String>,

    /// Exit after the scripted commands instead of entering the shell
    #[arg(long)]
    pub exit_after: bool,

    /// Configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log directory override
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Save directory override
    #[arg(long, value_name = "DIR")]
    pub save_dir: Option<PathBuf>,

    /// Suppress banner output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Scripted lines in execution order: target, commands, saveas.
    pub fn script(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(target) = &self.target {
            lines.push(format!("target {target}"));
        }
        lines.extend(self.commands.iter().cloned());
        if let Some(file) = &self.saveas {
            lines.push(format!("saveas {file}"));
        }
        lines
    }

    /// Apply `--log-dir` and `--save-dir` on top of `config`.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(dir) = &self.log_dir {
            config.paths.log_dir = dir.clone();
        }
        if let Some(dir) = &self.save_dir {
            config.paths.save_dir = dir.clone();
        }
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Load the layered configuration for `cli`.
pub fn load_config(cli: &Cli) -> Result<Config, ReconError> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env();
    cli.apply_to(&mut config);
    tracing::debug!(
        config = %cli.config.as_deref().unwrap_or(Path::new(DEFAULT_CONFIG_FILE)).display(),
        log_dir = %config.paths.log_dir.display(),
        save_dir = %config.paths.save_dir.display(),
        "configuration loaded"
    );
    Ok(config)
}

/// Build a shell with every enabled module registered.
pub fn build_shell(config: &Config) -> Result<Shell, ReconError> {
    let client =
        ApiClient::new(&config.network).map_err(|e| ReconError::ConfigError(e.to_string()))?;
    let paths = SessionPaths::new(&config.paths.log_dir, &config.paths.save_dir);
    let mut shell = Shell::new(&paths, &config.paths.graph_file)?;
    modules::register_all(&mut shell, config, &client);
    tracing::debug!(modules = shell.registry().len(), "shell ready");
    Ok(shell)
}

/// Run scripted lines in order. Returns `Exit` if one of them exits.
pub fn run_script(
    shell: &mut Shell,
    lines: &[String],
    out: &mut dyn Write,
) -> Result<Control, ReconError> {
    for line in lines {
        if let Control::Exit = shell.execute(line, out)? {
            return Ok(Control::Exit);
        }
    }
    Ok(Control::Continue)
}

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), ReconError> {
    let config = load_config(&cli)?;
    let mut shell = build_shell(&config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Control::Exit = run_script(&mut shell, &cli.script(), &mut out)? {
        return Ok(());
    }
    if cli.exit_after {
        return shell.shutdown(&mut out);
    }
    drop(out);
    run_repl(&mut shell)
}
