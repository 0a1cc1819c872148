use crate::backup_decoder::BackupDecoder;
use crate::backup_restorer::{BackupRestorer, RestoreOptions, RestoreOutcome};
use crate::backup_validator::BackupValidator;
use crate::config_loader::{load_config, BackupConfig};
use crate::container::{ContainerSource, FileContainer};
use crate::library_store_sled::SledLibraryStore;
use crate::registry::{ConfiguredSources, ConfiguredTrackers};
use crate::restore_progress::TracingObserver;
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Inspect, validate and restore library backups
#[derive(Parser)]
#[command(name = "tsundoku-backup", version, about = "Library backup inspection and restore")]
pub struct Cli {
    /// Configuration file (defaults to $TSUNDOKU_CONFIG or ./tsundoku.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode a backup in one shot and print its section counts
    Inspect { file: PathBuf },

    /// Report sources and trackers a backup needs that are not available
    Validate { file: PathBuf },

    /// Restore selected sections of a backup into the library store
    Restore {
        file: PathBuf,
        #[command(flatten)]
        sections: SectionArgs,
    },
}

#[derive(Args, Debug, Default)]
pub struct SectionArgs {
    #[arg(long)]
    pub library: bool,
    #[arg(long)]
    pub categories: bool,
    #[arg(long)]
    pub app_settings: bool,
    #[arg(long)]
    pub source_settings: bool,
    #[arg(long)]
    pub extension_repos: bool,
    /// Restore every section
    #[arg(long)]
    pub all: bool,
}

impl SectionArgs {
    pub fn to_options(&self) -> RestoreOptions {
        if self.all {
            return RestoreOptions::all();
        }
        RestoreOptions {
            library_entries: self.library,
            categories: self.categories,
            app_settings: self.app_settings,
            source_settings: self.source_settings,
            extension_repos: self.extension_repos,
        }
    }
}

pub fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Inspect { file } => inspect(&config, file),
        Commands::Validate { file } => validate(&config, file),
        Commands::Restore { file, sections } => restore(&config, file, sections.to_options()),
    }
}

fn inspect(config: &BackupConfig, file: PathBuf) -> anyhow::Result<()> {
    let container = FileContainer::new(file);
    let backup = BackupDecoder::new(config.max_decode_bytes, config.read_chunk_bytes)
        .decode(&container)
        .with_context(|| format!("failed to decode {}", container.describe()))?;

    println!("Backup: {}", container.describe());
    println!("  library entries:     {}", backup.backup_manga.len());
    println!("  categories:          {}", backup.backup_categories.len());
    println!("  sources:             {}", backup.backup_sources.len());
    println!("  app preferences:     {}", backup.backup_preferences.len());
    println!("  source preferences:  {}", backup.backup_source_preferences.len());
    println!("  extension repos:     {}", backup.backup_extension_repo.len());
    Ok(())
}

fn validate(config: &BackupConfig, file: PathBuf) -> anyhow::Result<()> {
    let container = FileContainer::new(file);
    let sources = ConfiguredSources::from_config(config);
    let trackers = ConfiguredTrackers::from_config(config);

    let report = BackupValidator::new(&sources, &trackers)
        .validate(&container)
        .with_context(|| format!("failed to validate {}", container.describe()))?;

    if report.is_complete() {
        println!("All sources and trackers are available");
        return Ok(());
    }
    if !report.missing_sources.is_empty() {
        println!("Missing sources:");
        for name in &report.missing_sources {
            println!("  {name}");
        }
    }
    if !report.missing_trackers.is_empty() {
        println!("Trackers not logged in:");
        for name in &report.missing_trackers {
            println!("  {name}");
        }
    }
    Ok(())
}

fn restore(config: &BackupConfig, file: PathBuf, options: RestoreOptions) -> anyhow::Result<()> {
    if options.is_empty() {
        bail!("no sections selected; pass --all or at least one section flag");
    }

    let store = Arc::new(
        SledLibraryStore::open(&config.store_path)
            .with_context(|| format!("failed to open store at {}", config.store_path.display()))?,
    );
    let restorer = BackupRestorer::new(
        store.clone(),
        store.clone(),
        Arc::new(TracingObserver),
        config.error_log_dir.clone(),
    )
    .with_error_log_name(config.error_log_name.clone());
    let container: Arc<dyn ContainerSource> = Arc::new(FileContainer::new(file));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let outcome = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling restore");
                on_interrupt.cancel();
            }
        });
        restorer.restore(container, options, cancel).await
    })?;

    store.flush().context("failed to flush store")?;

    match outcome {
        RestoreOutcome::Completed(report) => {
            println!(
                "Restore completed in {:.1}s: {}/{} items, {} errors",
                report.elapsed.as_secs_f64(),
                report.completed,
                report.total,
                report.error_count
            );
            if let Some(path) = report.error_log {
                println!("Error log: {}", path.display());
            }
        }
        RestoreOutcome::Cancelled { progress, error_count } => {
            println!(
                "Restore cancelled after {}/{} items ({} errors)",
                progress.completed, progress.total, error_count
            );
        }
    }
    Ok(())
}
