//! `trellisd`: drives a persisted job graph to completion.
//!
//! Usage: `trellisd --config <path>`. No subcommand grammar, no other
//! flags — daemon-local settings come from the config file or from the
//! `TRELLIS_*` environment overrides documented on [`trellis_daemon::TrellisConfig`].

use std::path::PathBuf;
use std::process::ExitCode;
use trellis_daemon::{lock, logging, TrellisConfig};
use trellis_worker::JobRegistry;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let config_path = match parse_args() {
        Ok(path) => path,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    match run(&config_path).await {
        Ok(failed_jobs) => {
            if failed_jobs == 0 {
                ExitCode::SUCCESS
            } else {
                tracing::error!(failed_jobs, "daemon exiting: jobs failed terminally");
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "daemon exiting on error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: &PathBuf) -> Result<u32, trellis_daemon::DaemonError> {
    let trellis_config = TrellisConfig::load(config_path)?;
    let lock_path = trellis_config.resolved_lock_path();
    let _lock = lock::LockFile::acquire(&lock_path)?;

    // An embedder linking this crate as a library supplies its own
    // populated registry; the standalone binary only resumes graphs whose
    // jobs require no dynamic dispatch (e.g. pure deletion cleanup).
    let result = trellis_daemon::run_daemon(&trellis_config, JobRegistry::new()).await;

    drop(_lock);
    lock::remove(&lock_path);

    result
}

fn parse_args() -> Result<PathBuf, String> {
    let mut args = std::env::args().skip(1);
    match (args.next(), args.next()) {
        (Some(flag), Some(path)) if flag == "--config" => Ok(PathBuf::from(path)),
        _ => Err("usage: trellisd --config <path>".to_string()),
    }
}
