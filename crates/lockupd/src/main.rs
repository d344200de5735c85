//! lockupd — operator CLI for the lockup ledger.
//!
//! Every invocation:
//!   1. Opens (or creates) the state database under `--data-dir`
//!   2. Runs exactly one mutation, query, or maintenance command
//!   3. Prints the result as JSON on stdout and flushes the database

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use lockup_core::constants::{DEFAULT_MAX_DENOMS_PER_LOCK, DEFAULT_MAX_LOCK_DURATION_SECS};
use lockup_core::{AccountId, Coins, LockId, Timestamp};
use lockup_genesis::{export_genesis, import_genesis, load_genesis, save_genesis};
use lockup_query::LockupQuerier;
use lockup_state::{EngineConfig, LockupEngine, StateDb};

#[derive(Parser, Debug)]
#[command(
    name = "lockupd",
    version,
    about = "Lockup ledger — time-locked balances with unlock countdowns"
)]
struct Args {
    /// Directory for the persistent state database.
    #[arg(long, global = true, default_value = "~/.lockup/data")]
    data_dir: PathBuf,

    /// Reference time in unix seconds for unlock checks (defaults to now).
    #[arg(long, global = true)]
    now: Option<Timestamp>,

    /// Longest duration a deposit may request, in seconds.
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_LOCK_DURATION_SECS)]
    max_lock_duration: i64,

    /// Maximum distinct denominations in a single lock.
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_DENOMS_PER_LOCK)]
    max_denoms_per_lock: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lock coins for an owner.
    Deposit {
        #[arg(long)]
        owner: AccountId,
        /// Coin bundle, e.g. `100uosmo,5uatom`.
        #[arg(long)]
        coins: Coins,
        /// Seconds the lock must wait once unlocking begins.
        #[arg(long)]
        duration: i64,
    },
    /// Start the unlock countdown for a lock.
    BeginUnlock { lock_id: u64 },
    /// Release a lock whose countdown has elapsed.
    FinishUnlock { lock_id: u64 },
    /// Release a lock immediately, bypassing the countdown.
    ForceUnlock { lock_id: u64 },
    /// Run a named query; params are a JSON object.
    Query {
        endpoint: String,
        #[arg(default_value = "{}")]
        params: String,
    },
    /// Print a human-readable summary of a lock.
    Describe { lock_id: u64 },
    /// List every lock held by an owner.
    List { owner: AccountId },
    /// Verify the module balance and index consistency.
    Audit,
    /// Write the current state to a genesis JSON file.
    ExportGenesis { file: PathBuf },
    /// Seed an empty database from a genesis JSON file.
    ImportGenesis { file: PathBuf },
}

#[derive(Serialize)]
struct DepositOutput {
    lock_id: LockId,
}

#[derive(Serialize)]
struct BeginUnlockOutput {
    lock_id: LockId,
    end_time: Timestamp,
}

#[derive(Serialize)]
struct ReleaseOutput {
    lock_id: LockId,
    released: Coins,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,lockup=debug")),
        )
        .init();

    let args = Args::parse();

    // ── State database ────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let db = Arc::new(StateDb::open(&data_dir).context("opening state database")?);

    // ── Engine ────────────────────────────────────────────────────────────────
    let config = EngineConfig {
        max_lock_duration: args.max_lock_duration,
        max_denoms_per_lock: args.max_denoms_per_lock,
    };
    let engine = LockupEngine::with_config(Arc::clone(&db), config);
    // Host clock is read here, at the boundary, never inside the engine.
    let now = args.now.unwrap_or_else(|| chrono::Utc::now().timestamp());

    let result = run(&engine, &db, args.command, now);
    db.flush().context("flushing state database")?;
    result
}

fn run(engine: &LockupEngine, db: &StateDb, command: Command, now: Timestamp) -> anyhow::Result<()> {
    match command {
        Command::Deposit { owner, coins, duration } => {
            let lock_id = engine
                .deposit(&owner, coins, duration)
                .inspect_err(|e| warn!(error = %e, "deposit rejected"))
                .context("deposit")?;
            print_json(&DepositOutput { lock_id })
        }
        Command::BeginUnlock { lock_id } => {
            let lock_id = LockId(lock_id);
            let end_time = engine
                .begin_unlock(lock_id, now)
                .inspect_err(|e| warn!(error = %e, %lock_id, "begin-unlock rejected"))
                .context("begin-unlock")?;
            print_json(&BeginUnlockOutput { lock_id, end_time })
        }
        Command::FinishUnlock { lock_id } => {
            let lock_id = LockId(lock_id);
            let released = engine
                .finish_unlock(lock_id, now)
                .inspect_err(|e| warn!(error = %e, %lock_id, "finish-unlock rejected"))
                .context("finish-unlock")?;
            print_json(&ReleaseOutput { lock_id, released })
        }
        Command::ForceUnlock { lock_id } => {
            let lock_id = LockId(lock_id);
            let released = engine
                .force_unlock(lock_id)
                .inspect_err(|e| warn!(error = %e, %lock_id, "force-unlock rejected"))
                .context("force-unlock")?;
            print_json(&ReleaseOutput { lock_id, released })
        }
        Command::Query { endpoint, params } => {
            let params: serde_json::Value =
                serde_json::from_str(&params).context("parsing query params JSON")?;
            let out = LockupQuerier::new(engine)
                .query_json(&endpoint, params)
                .with_context(|| format!("query {endpoint}"))?;
            println!("{out}");
            Ok(())
        }
        Command::Describe { lock_id } => {
            let text = LockupQuerier::new(engine)
                .describe(LockId(lock_id), now)
                .context("describe")?;
            println!("{text}");
            Ok(())
        }
        Command::List { owner } => {
            let locks = engine.account_locks(&owner).context("listing locks")?;
            print_json(&locks)
        }
        Command::Audit => {
            engine.check_invariants().context("audit failed")?;
            info!(locks = db.lock_count(), "audit passed");
            print_json(&engine.module_balance()?)
        }
        Command::ExportGenesis { file } => {
            let genesis = export_genesis(db).context("exporting genesis")?;
            save_genesis(&file, &genesis)
                .with_context(|| format!("writing genesis to {}", file.display()))?;
            info!(path = %file.display(), "genesis exported");
            Ok(())
        }
        Command::ImportGenesis { file } => {
            let genesis = load_genesis(&file)
                .with_context(|| format!("reading genesis from {}", file.display()))?;
            let balance = import_genesis(db, &genesis, engine.config()).context("applying genesis")?;
            print_json(&balance)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("encoding output")?);
    Ok(())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
