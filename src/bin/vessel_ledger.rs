//! Vessel Ledger CLI
//!
//! Replays operation files against the ledger and inspects saved state.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use serde::Serialize;

use vessel_ledger::core::config::LedgerConfig;
use vessel_ledger::core::fees::FeeStatistics;
use vessel_ledger::liquidation::stability_pool::StabilityPoolStats;
use vessel_ledger::protocol::ledger::Ledger;
use vessel_ledger::protocol::operations::{parse_operations, replay};
use vessel_ledger::storage::{FileStore, LedgerStore};

/// Vessel Ledger - stability pool and vessel interest accounting
#[derive(Parser)]
#[command(name = "vessel-ledger")]
#[command(version = vessel_ledger::VERSION)]
#[command(about = "Replay and inspect vessel ledger state", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, env = "VESSEL_LEDGER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding persisted ledger state
    #[arg(short, long, env = "VESSEL_LEDGER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a JSON array of operations in order
    Replay {
        /// Operations file
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show pools and balances of the persisted ledger
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Summary printed after a replay or by `status`
#[derive(Serialize)]
struct LedgerSummary {
    operations: usize,
    events: usize,
    event_digest: String,
    pools: Vec<StabilityPoolStats>,
    fees: FeeStatistics,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Replay { file, format } => {
            let config = load_config(cli.config.as_deref())?;
            let json = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let operations = parse_operations(&json)?;

            let store = open_store(cli.data_dir.as_deref())?;
            let ledger = match store.as_ref().map(|s| s.load()).transpose()?.flatten() {
                Some(ledger) => ledger,
                None => Ledger::new(config)?,
            };

            replay(&ledger, &operations)?;
            ledger.verify_invariants()?;

            if let Some(store) = &store {
                store.save(&ledger)?;
            }

            let summary = summarize(&ledger, operations.len())?;
            print_summary(term, &summary, *format)?;
        }

        Commands::Status { format } => {
            let store = open_store(cli.data_dir.as_deref())?
                .context("--data-dir is required for status")?;
            let ledger = store.load()?.context("no ledger saved in data directory")?;
            let summary = summarize(&ledger, 0)?;
            print_summary(term, &summary, *format)?;
        }

        Commands::Config => {
            let config = load_config(cli.config.as_deref())?;
            term.write_line(&serde_json::to_string_pretty(&config)?)?;
        }

        Commands::InitConfig { path, force } => {
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            LedgerConfig::default().save(path)?;
            term.write_line(&format!(
                "{} Configuration written to {}",
                style("✓").green(),
                style(path.display()).cyan()
            ))?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LedgerConfig> {
    let config = match path {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    let config = config.apply_env()?;
    config.validate()?;
    Ok(config)
}

fn open_store(dir: Option<&Path>) -> anyhow::Result<Option<LedgerStore<FileStore>>> {
    dir.map(|dir| {
        let backend = FileStore::open(dir).with_context(|| format!("opening {}", dir.display()))?;
        Ok::<_, anyhow::Error>(LedgerStore::new(backend))
    })
    .transpose()
}

fn summarize(ledger: &Ledger, operations: usize) -> anyhow::Result<LedgerSummary> {
    let events = ledger.events()?;
    let pools = ledger
        .assets()?
        .iter()
        .map(|asset| ledger.pool_statistics(asset))
        .collect::<vessel_ledger::error::Result<Vec<_>>>()?;

    Ok(LedgerSummary {
        operations,
        events: events.len(),
        event_digest: events.digest().to_hex(),
        pools,
        fees: ledger.fee_statistics()?,
    })
}

fn print_summary(term: &Term, summary: &LedgerSummary, format: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        term.write_line(&serde_json::to_string_pretty(summary)?)?;
        return Ok(());
    }

    term.write_line(&format!(
        "{} {} operations applied, {} events",
        style("✓").green(),
        summary.operations,
        summary.events
    ))?;
    term.write_line(&format!("  Event digest: {}", style(&summary.event_digest).dim()))?;

    for pool in &summary.pools {
        term.write_line(&format!(
            "\n{} Stability pool {}",
            style("→").cyan(),
            style(pool.asset.short()).yellow()
        ))?;
        term.write_line(&format!("  Deposits:        {}", style(pool.total_deposits).green()))?;
        term.write_line(&format!("  Collateral:      {}", pool.total_collateral))?;
        term.write_line(&format!("  Depositors:      {}", pool.depositor_count))?;
        term.write_line(&format!(
            "  Epoch / scale:   {} / {}",
            pool.epoch, pool.scale
        ))?;
        term.write_line(&format!("  P:               {}", pool.p.raw()))?;
        term.write_line(&format!("  Debt absorbed:   {}", pool.total_debt_absorbed))?;
        term.write_line(&format!(
            "  Rewards issued:  {} ({} left)",
            pool.total_rewards_issued, pool.remaining_rewards
        ))?;
    }

    term.write_line(&format!(
        "\n{} Interest collected: {}",
        style("ℹ").blue(),
        style(summary.fees.total_collected).green()
    ))?;
    Ok(())
}
