mod cli;
mod error_fmt;
mod logging;
mod run;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use crate::cli::{Cli, Commands, JSON_MODE, flush_logs};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("color-eyre install failed: {e}");
    }

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        tracing::error!(error = %err, "exiting with error");
        flush_logs();
        std::process::exit(exit_code_for_error(&err));
    }
    flush_logs();
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    // Config first: a bad config is fatal before any device is opened.
    let loaded = run::load_config(&cli.config);
    logging::init_logging(
        &cli.log_level,
        cli.json,
        loaded.as_ref().ok().map(|c| &c.logging),
    )?;
    let mut cfg = loaded?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })?;
    }

    match cli.cmd {
        Commands::Run {
            max_cycles,
            dry_run,
        } => {
            if dry_run {
                cfg.sprinkler.enabled = false;
            }
            run::run_loop(&cfg, cli.seed, max_cycles, shutdown, cli.json).map(|_| ())
        }
        Commands::Once { dry_run } => {
            if dry_run {
                cfg.sprinkler.enabled = false;
            }
            run::run_once(&cfg, cli.seed, shutdown, cli.json)
        }
        Commands::SelfCheck => run::self_check(&cfg, cli.seed, cli.json),
    }
}
