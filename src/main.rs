use clap::Parser;
use miette::{IntoDiagnostic, Result};
use referral_ledger::application::engine::Dashboard;
use referral_ledger::config::Settings;
use referral_ledger::domain::ports::RepositoryRef;
use referral_ledger::infrastructure::in_memory::InMemoryRepository;
use referral_ledger::infrastructure::notify::LogNotifier;
#[cfg(feature = "storage-rocksdb")]
use referral_ledger::infrastructure::rocksdb::RocksDbRepository;
use referral_ledger::interfaces::csv::command_reader::CommandReader;
use referral_ledger::interfaces::csv::member_writer::MemberWriter;
use referral_ledger::interfaces::seed::Seed;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// JSON file with members and tasks to load before replaying commands
    #[arg(long)]
    seed: Option<PathBuf>,

    /// JSON settings file. Missing fields fall back to defaults;
    /// `REFERRAL_LEDGER__*` environment variables override both.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

fn open_repository(db_path: Option<PathBuf>) -> Result<RepositoryRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Arc::new(RocksDbRepository::open(path).into_diagnostic()?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => Err(miette::miette!(
            "--db-path needs a build with the storage-rocksdb feature"
        )),
        None => Ok(Arc::new(InMemoryRepository::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "referral_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).into_diagnostic()?;
    let repo = open_repository(cli.db_path)?;

    if let Some(path) = &cli.seed {
        let seeded = Seed::load(path)
            .into_diagnostic()?
            .apply(repo.as_ref(), chrono::Utc::now())
            .await
            .into_diagnostic()?;
        info!(members = seeded, "seed applied");
    }

    let dashboard = Dashboard::new(repo, Arc::new(LogNotifier), settings);

    // Replay commands
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for cmd_result in reader.commands() {
        match cmd_result {
            Ok(cmd) => {
                let (op, member) = (cmd.op, cmd.member);
                match dashboard.execute(cmd).await {
                    Ok(outcome) => debug!(?op, member, ?outcome, "command applied"),
                    Err(e) => eprintln!("Error processing command: {}", e),
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let members = dashboard.into_results().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = MemberWriter::new(stdout.lock());
    writer.write_members(&members).into_diagnostic()?;

    Ok(())
}
