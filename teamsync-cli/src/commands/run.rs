//! Startup run followed by scheduled runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args};
use tracing_subscriber::{fmt, EnvFilter};

use teamsync_core::{Config, Settings};
use teamsync_daemon::{Job, Schedule};
use teamsync_sync::run_once;

use crate::commands::report;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML configuration file. Environment variables are used when it cannot
    /// be read.
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// trace, debug, info, warn or error. RUST_LOG overrides it.
    #[arg(long, default_value = "info")]
    pub loglevel: String,

    /// Log intended membership changes instead of applying them.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub dryrun: bool,

    /// Run once and exit, ignoring any configured schedule.
    #[arg(long)]
    pub once: bool,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        init_tracing(&self.loglevel);

        let settings = load_settings(&self.config)?;
        let schedule = match (&settings.schedule, self.once) {
            (Some(expr), false) => Some(Schedule::parse(expr).context("cannot schedule runs")?),
            _ => None,
        };

        if self.dryrun {
            tracing::info!("dry-run enabled; membership changes will be logged, not sent");
        }

        let first = run_once(&settings, self.dryrun);
        let Some(schedule) = schedule else {
            let summary = first.context("sync run failed")?;
            return report::print(&summary, self.json);
        };

        match first {
            Ok(summary) => report::print(&summary, self.json)?,
            Err(err) => tracing::error!(error = %err, "initial run failed; waiting for the next trigger"),
        }

        let config = self.config.clone();
        let dry_run = self.dryrun;
        let job: Job = Arc::new(move || {
            let settings = Config::load(&config)?.validate()?;
            run_once(&settings, dry_run)
        });

        tracing::info!(schedule = %settings.schedule.as_deref().unwrap_or_default(), "daemon starting");
        teamsync_daemon::start_blocking(schedule, job).context("daemon stopped with an error")
    }
}

fn load_settings(path: &Path) -> Result<Settings> {
    Config::load(path)
        .and_then(|config| config.validate())
        .with_context(|| format!("invalid configuration (from {} or environment)", path.display()))
}

/// Logs go to stderr so stdout carries only the summary.
fn init_tracing(level: &str) {
    let level = level.to_ascii_lowercase();
    let known = LOG_LEVELS.contains(&level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if known { level.as_str() } else { "info" })
    });
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    if !known {
        tracing::warn!(loglevel = %level, "unknown log level; using info");
    }
}
