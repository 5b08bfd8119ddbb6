//! marksync - keep Diigo bookmarks and a directory of org files in sync.
//!
//! Credentials come from the environment (or a `.env` file); run modes
//! come from the command line. The reconciliation itself lives in
//! marksync-engine; this binary supplies the two stores, the watermark
//! file and the terminal interaction.

mod cli;
mod config;
mod diigo;
mod error;
mod org;
mod prompt;
mod report;
mod watermark;

use crate::cli::Cli;
use crate::config::Config;
use crate::diigo::DiigoClient;
use crate::error::{AppError, Result};
use crate::org::OrgStore;
use crate::watermark::FileWatermarkStore;
use clap::Parser;
use marksync_engine::SyncSession;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marksync=info,marksync_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("marksync: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

/// One sync run. Returns whether every action succeeded.
fn run(cli: Cli) -> Result<bool> {
    let mut config = Config::from_env()?;
    if let Some(dir) = &cli.dir {
        config.dir = dir.clone();
    }
    let options = cli.sync_options();

    let mut local = OrgStore::open(&config.dir)
        .map_err(|_| AppError::MissingDirectory(config.dir.display().to_string()))?;
    let mut remote = DiigoClient::new(&config)?.with_limit(cli.limit);
    let mut watermarks = FileWatermarkStore::new(&config.dir);

    tracing::info!(
        dir = %local.root().display(),
        endpoint = remote.endpoint(),
        watermark_file = %watermarks.path().display(),
        mode = ?options.mode,
        safe = options.safe,
        "starting marksync"
    );

    let mut session = SyncSession::new(&mut local, &mut remote, &mut watermarks, options);
    let prepared = {
        // Dropped before confirming; it may hold stdin
        let mut policy = prompt::policy_for(cli.on_conflict, cli.json);
        session.prepare(&mut *policy)?
    };

    // JSON output keeps stdout for the summary alone
    let needs_confirmation = prepared.plan.has_destructive() && !options.auto_confirm;
    let plan = report::render_plan(&prepared.plan);
    if !cli.json {
        print!("{plan}");
    } else if needs_confirmation {
        eprint!("{plan}");
    }

    if needs_confirmation {
        let apply = prompt::confirm(
            io::stdin().lock(),
            prompt::prompt_output(cli.json),
            "Apply these changes?",
        )?;
        if !apply {
            return Err(AppError::Cancelled);
        }
    }

    let summary = session.apply(prepared, || chrono::Utc::now().timestamp())?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", report::render_summary(&summary));
    }

    Ok(summary.report.is_clean())
}
