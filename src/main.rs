use clap::Parser;
use std::process::exit;
use tracing_subscriber::filter::LevelFilter;
use tsundoku_backup::cli::{dispatch, Cli};
use tsundoku_backup::errors::BackupError;

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    if let Err(err) = dispatch(cli) {
        match err.downcast_ref::<BackupError>() {
            Some(backup_err) => eprintln!("{}", backup_err.user_message()),
            None => eprintln!("{err:#}"),
        }
        tracing::debug!(error = ?err, "command failed");
        exit(1);
    }
}
