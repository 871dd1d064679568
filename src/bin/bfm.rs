use bfm::backend::EngineBackend;
use bfm::catalog::Catalog;
use bfm::config::{ConnectionConfig, ServiceConfig};
use bfm::executor::{ExecuteOutcome, ExecuteResult, Executor};
use bfm::loader::Watcher;
use bfm::model::{Backend, ExecutionContext, Target};
use bfm::queue::ChannelQueue;
use bfm::reindexer;
use bfm::state::{PostgresStateTracker, StateStore};
use bfm::worker::Worker;
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Operator-convenience CLI over the BFM engine: scaffolding and the
/// HTTP/RPC surface it would normally sit behind are out of scope;
/// this binary exists to load, resolve, execute and reconcile
/// migrations directly, in the spirit of `swellow`'s
/// `peck`/`up`/`down`/`snapshot` commands.
#[derive(Parser)]
#[command(name = "bfm", version, about = "Multi-backend database migration engine.")]
struct Cli {
    /// Migration tree root (`BFM_SFM_PATH`).
    #[arg(long, env = "BFM_SFM_PATH", default_value = "../sfm")]
    sfm_path: String,

    /// Comma-separated logical connection names to configure from the
    /// environment (the `{CONN}_*` families). Discovering
    /// these from an arbitrary environment dump is out of scope for the
    /// core crate, so the operator lists them explicitly here.
    #[arg(long, env = "BFM_CONNECTIONS", value_delimiter = ',')]
    connections: Vec<String>,

    #[arg(short, long, action = clap::ArgAction::Count, help = "-v: DEBUG, -vv: TRACE")]
    verbose: u8,

    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Default)]
struct TargetArgs {
    #[arg(long)]
    backend: Option<String>,
    #[arg(long)]
    connection: Option<String>,
    #[arg(long)]
    schema: Option<String>,
    #[arg(long)]
    version: Option<String>,
    #[arg(long, value_delimiter = ',')]
    table: Vec<String>,
}

impl TargetArgs {
    fn into_target(self) -> anyhow::Result<Target> {
        let backend = match self.backend {
            Some(tag) => Some(Backend::parse(&tag).ok_or_else(|| anyhow::anyhow!("unknown backend '{tag}'"))?),
            None => None,
        };
        Ok(Target {
            backend,
            connection: self.connection,
            schema: self.schema,
            tables: self.table,
            version: self.version,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the migration tree and print a summary of what was discovered.
    Load,
    /// Resolve the execution order for migrations matching a target, without running them.
    Resolve {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Resolve, validate and apply migrations matching a target.
    Execute {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long, default_value = "")]
        schema: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Roll back a single migration, identified by any accepted id shape.
    Rollback {
        migration: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one reconciliation pass between the filesystem and the meta-DB.
    Reindex,
    /// Load once, then keep watching the filesystem and reconciling on a timer until interrupted.
    Watch,
    /// Show execution history, newest first, filtered by any subset of the fields below.
    History {
        #[command(flatten)]
        filter: HistoryFilterArgs,
    },
    /// Show the meta-DB's scanned-migrations list, filtered by any subset of the fields below.
    List {
        #[command(flatten)]
        filter: HistoryFilterArgs,
    },
    /// Print the highest successfully applied version for a schema/table.
    LastVersion {
        schema: String,
        #[arg(long, default_value = "")]
        table: String,
    },
}

#[derive(Args, Default)]
struct HistoryFilterArgs {
    #[arg(long)]
    migration_id: Option<String>,
    #[arg(long)]
    schema: Option<String>,
    #[arg(long)]
    table: Option<String>,
    #[arg(long)]
    connection: Option<String>,
    #[arg(long)]
    backend: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    version: Option<String>,
}

impl HistoryFilterArgs {
    fn into_filter(self) -> anyhow::Result<bfm::model::HistoryFilter> {
        let backend = match self.backend {
            Some(tag) => Some(Backend::parse(&tag).ok_or_else(|| anyhow::anyhow!("unknown backend '{tag}'"))?),
            None => None,
        };
        let status = match self.status {
            Some(tag) => Some(
                bfm::model::ExecutionStatus::parse(&tag)
                    .ok_or_else(|| anyhow::anyhow!("unknown status '{tag}'"))?,
            ),
            None => None,
        };
        Ok(bfm::model::HistoryFilter {
            migration_id: self.migration_id,
            schema: self.schema,
            table: self.table,
            connection: self.connection,
            backend,
            status,
            version: self.version,
        })
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        tracing::Level::ERROR
    } else {
        match verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn print_outcome(outcome: &ExecuteOutcome) {
    println!("success: {}", outcome.success);
    for id in &outcome.applied {
        println!("  applied: {id}");
    }
    for id in &outcome.skipped {
        println!("  skipped: {id}");
    }
    for err in &outcome.errors {
        println!("  error:   {err}");
    }
}

async fn build_backends(config: &ServiceConfig) -> anyhow::Result<HashMap<String, Mutex<EngineBackend>>> {
    let mut backends = HashMap::new();
    for (name, conn) in &config.connections {
        let engine = EngineBackend::new(conn.clone(), config.pool)?;
        backends.insert(name.clone(), Mutex::new(engine));
    }
    Ok(backends)
}

/// Build the meta-DB connection from `BFM_STATE_DB_*` / `BFM_STATE_SCHEMA`,
/// defaulting the schema to `public` and the database name to
/// `migration_state`.
async fn build_state_tracker() -> anyhow::Result<StateStore> {
    let env = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());
    let config = ConnectionConfig {
        name: "bfm_state".to_string(),
        backend: Backend::Postgresql,
        host: env("BFM_STATE_DB_HOST", "localhost"),
        port: env("BFM_STATE_DB_PORT", "5432").parse().unwrap_or(5432),
        username: env("BFM_STATE_DB_USERNAME", "postgres"),
        password: env("BFM_STATE_DB_PASSWORD", ""),
        database: env("BFM_STATE_DB_NAME", "migration_state"),
        schema: env("BFM_STATE_SCHEMA", "public"),
        extra: HashMap::new(),
    };
    let tracker = PostgresStateTracker::connect(&config.postgres_url()).await?;
    tracker.initialize().await?;
    Ok(StateStore::Postgres(tracker))
}

async fn load_catalog(sfm_path: &str, state: Option<&StateStore>) -> anyhow::Result<Catalog> {
    let catalog = Catalog::new();
    let mut watcher = Watcher::new(sfm_path, Duration::from_secs(60));
    let errors = watcher.rescan_once_with_state(&catalog, state).await?;
    for e in &errors {
        tracing::warn!("scan error: {e}");
    }
    Ok(catalog)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let connection_names: Vec<&str> = cli.connections.iter().map(String::as_str).collect();

    match cli.command {
        Commands::Load => {
            let catalog = load_catalog(&cli.sfm_path, None).await?;
            println!("loaded {} migration(s)", catalog.len());
            for id in catalog.all_ids() {
                println!("  {id}");
            }
        }
        Commands::Resolve { target } => {
            let catalog = load_catalog(&cli.sfm_path, None).await?;
            let target = target.into_target()?;
            let migrations = catalog.find_by_target(&target);
            let all = catalog.get_all();
            let expanded = bfm::resolver::expand_with_pending_dependencies(migrations, &all);
            match bfm::resolver::resolve_order(&expanded) {
                Ok(order) => {
                    for id in order {
                        println!("{id}");
                    }
                }
                Err(e) => {
                    eprintln!("resolution failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Execute { target, schema, dry_run } => {
            let config = ServiceConfig::from_env(&connection_names)?;
            let state = build_state_tracker().await?;
            let catalog = load_catalog(&cli.sfm_path, Some(&state)).await?;
            let backends = build_backends(&config).await?;

            let target = target.into_target()?;
            let connection = target.connection.clone().unwrap_or_default();

            if config.queue_enabled {
                let (queue, receiver) = ChannelQueue::new(8);
                let executor = Executor::with_queue(backends, state, queue);
                let result = executor
                    .execute(&catalog, &target, &connection, &schema, ExecutionContext::default(), dry_run)
                    .await?;
                match result {
                    ExecuteResult::Queued { job_id } => {
                        println!("queued: {job_id}");
                        let mut worker = Worker::new(receiver);
                        worker.run_one(&catalog, &executor).await;
                    }
                    ExecuteResult::Ran(outcome) => {
                        print_outcome(&outcome);
                        if !outcome.success {
                            std::process::exit(1);
                        }
                    }
                }
            } else {
                let executor = Executor::new(backends, state);
                let outcome = executor
                    .execute_sync(&catalog, &target, &schema, ExecutionContext::default(), dry_run)
                    .await?;
                print_outcome(&outcome);
                if !outcome.success {
                    std::process::exit(1);
                }
            }
        }
        Commands::Rollback { migration, dry_run } => {
            let config = ServiceConfig::from_env(&connection_names)?;
            let state = build_state_tracker().await?;
            let catalog = load_catalog(&cli.sfm_path, Some(&state)).await?;
            let backends = build_backends(&config).await?;
            let executor = Executor::new(backends, state);

            let outcome = executor.rollback(&catalog, &migration, ExecutionContext::default(), dry_run).await?;
            print_outcome(&outcome);
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Commands::Reindex => {
            let state = build_state_tracker().await?;
            let catalog = load_catalog(&cli.sfm_path, Some(&state)).await?;
            let events = reindexer::reindex(&catalog, &state).await?;
            for event in events {
                println!("{event:?}");
            }
        }
        Commands::Watch => {
            let reindex_interval_minutes: u64 =
                std::env::var("BFM_REINDEX_INTERVAL_MINUTES").ok().and_then(|v| v.parse().ok()).unwrap_or(5);
            let catalog = Catalog::new();
            let state = build_state_tracker().await?;
            let token = CancellationToken::new();

            let watcher_token = token.clone();
            let watcher_catalog = &catalog;
            let mut watcher = Watcher::new(cli.sfm_path.clone(), Duration::from_secs(60));

            let reindex_token = token.clone();
            let reindex_interval = Duration::from_secs(reindex_interval_minutes * 60);

            let shutdown_token = token.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown requested");
                shutdown_token.cancel();
            });

            let watcher_state = &state;
            tokio::join!(
                watcher.run(watcher_catalog, Some(watcher_state), watcher_token),
                reindexer::run(&catalog, &state, reindex_interval, reindex_token),
            );
        }
        Commands::History { filter } => {
            let state = build_state_tracker().await?;
            for record in state.history(&filter.into_filter()?).await? {
                println!(
                    "{} {} {} {} {}",
                    record.applied_at, record.status, record.migration_id, record.schema, record.executed_by
                );
                if let Some(err) = &record.error_message {
                    println!("    error: {err}");
                }
            }
        }
        Commands::List { filter } => {
            let state = build_state_tracker().await?;
            for scanned in state.list(&filter.into_filter()?).await? {
                let status = scanned.last_status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".to_string());
                println!("{} [{}] {}", scanned.migration_id, status, scanned.schema);
            }
        }
        Commands::LastVersion { schema, table } => {
            let state = build_state_tracker().await?;
            match state.last_version(&schema, &table).await? {
                Some(version) => println!("{version}"),
                None => println!("no applied migrations found for {schema}/{table}"),
            }
        }
    }

    Ok(())
}
