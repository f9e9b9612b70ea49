//! vector-migrate CLI - vector database migration with a control endpoint.

use std::collections::HashMap;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use vector_migrate::adapters::connect_store;
use vector_migrate::orchestrator::validate_and_record;
use vector_migrate::server::tools::register_builtin_tools;
use vector_migrate::{
    ControlServer, MigrateError, MigrationConfig, MigrationOptions, Orchestrator, RunState,
    SchemaMapping, ServerConfig, SqliteTracker, StateTracker, StoreConfig, StoreKind,
    ToolRegistry,
};

#[derive(Parser)]
#[command(name = "vector-migrate")]
#[command(about = "Vector database migration with checkpointing and a JSON-RPC control endpoint")]
#[command(version)]
struct Cli {
    /// Path to the SQLite state store
    #[arg(long, global = true, default_value = "vector-migrate.db")]
    db_path: String,

    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, global = true, default_value = "info")]
    verbosity: String,

    /// Log format: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct StoreArgs {
    /// Load source, target, and migration settings from a YAML or JSON file.
    /// Store flags below are ignored when this is set.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Source database type (pinecone, qdrant, weaviate, milvus)
    #[arg(long)]
    source_type: Option<String>,

    /// Source database URL
    #[arg(long, default_value = "")]
    source_url: String,

    /// Source database API key
    #[arg(long, default_value = "")]
    source_api_key: String,

    /// Source index/collection name
    #[arg(long)]
    source_index: Option<String>,

    /// Target database type (pinecone, qdrant, weaviate, milvus)
    #[arg(long)]
    target_type: Option<String>,

    /// Target database URL
    #[arg(long, default_value = "")]
    target_url: String,

    /// Target database API key
    #[arg(long, default_value = "")]
    target_api_key: String,

    /// Target index/collection name
    #[arg(long)]
    target_index: Option<String>,
}

impl StoreArgs {
    /// Resolve the source/target store configuration, from the config file
    /// when one is given and from flags otherwise. Also returns the file's
    /// migration options, when present.
    fn resolve(&self) -> Result<(StoreConfig, StoreConfig, Option<MigrationOptions>), MigrateError> {
        if let Some(path) = &self.config {
            let config = vector_migrate::Config::load(path)?;
            return Ok((config.source, config.target, Some(config.migration)));
        }

        let source = store_config(
            self.source_type.as_deref().ok_or_else(|| {
                MigrateError::Config("--source-type is required (or use --config)".into())
            })?,
            &self.source_url,
            &self.source_api_key,
            self.source_index.as_deref().ok_or_else(|| {
                MigrateError::Config("--source-index is required (or use --config)".into())
            })?,
        )?;
        let target = store_config(
            self.target_type.as_deref().ok_or_else(|| {
                MigrateError::Config("--target-type is required (or use --config)".into())
            })?,
            &self.target_url,
            &self.target_api_key,
            self.target_index.as_deref().ok_or_else(|| {
                MigrateError::Config("--target-index is required (or use --config)".into())
            })?,
        )?;
        Ok((source, target, None))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control endpoint
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,

        /// API key required on every control request
        #[arg(long)]
        api_key: String,

        /// Rate limit: requests per minute per principal
        #[arg(long, default_value_t = 100)]
        requests_per_minute: u32,

        /// Rate limit: burst capacity
        #[arg(long, default_value_t = 20)]
        burst: u32,
    },

    /// Start a migration
    Migrate {
        /// Migration identifier
        migration_id: String,

        #[command(flatten)]
        stores: StoreArgs,

        /// Records per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Retry attempts for transient errors
        #[arg(long)]
        max_retries: Option<u32>,

        /// Persist a checkpoint every N batches
        #[arg(long)]
        validate_every: Option<u64>,

        /// Validate configuration and connectivity without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show migration status
    Status {
        /// Migration identifier
        migration_id: String,

        /// Print the status as JSON
        #[arg(long)]
        output_json: bool,
    },

    /// Validate migrated data by sampling
    Validate {
        /// Migration identifier
        migration_id: String,

        #[command(flatten)]
        stores: StoreArgs,

        /// Number of records to sample
        #[arg(long, default_value_t = 100)]
        sample_size: usize,

        /// Print the report as JSON
        #[arg(long)]
        output_json: bool,
    },

    /// Mark a migration rolled back
    Rollback {
        /// Migration identifier
        migration_id: String,

        /// Skip the interactive confirmation
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)?;

    let cancel = CancellationToken::new();
    setup_signal_handler(cancel.clone());

    match cli.command {
        Commands::Serve {
            addr,
            api_key,
            requests_per_minute,
            burst,
        } => {
            let tracker: Arc<dyn StateTracker> =
                Arc::new(SqliteTracker::connect(&cli.db_path).await?);

            let registry = Arc::new(ToolRegistry::new());
            register_builtin_tools(&registry, Arc::clone(&tracker))?;

            let config = ServerConfig {
                addr,
                api_key,
                requests_per_minute,
                burst,
                db_path: cli.db_path.clone(),
            };

            let server = ControlServer::new(config, registry);
            server.serve(cancel).await?;
            tracker.close().await;
        }

        Commands::Migrate {
            migration_id,
            stores,
            batch_size,
            max_retries,
            validate_every,
            dry_run,
        } => {
            let (source_config, target_config, file_options) = stores.resolve()?;
            let base_options = file_options.unwrap_or_default();
            let options = MigrationOptions {
                batch_size: batch_size.unwrap_or(base_options.batch_size),
                max_retries: max_retries.unwrap_or(base_options.max_retries),
                validate_every: validate_every.unwrap_or(base_options.validate_every),
            };

            info!("starting migration: {}", migration_id);
            info!(
                "  source: {} ({})",
                source_config.kind, source_config.index
            );
            info!(
                "  target: {} ({})",
                target_config.kind, target_config.index
            );
            info!("  batch size: {}", options.batch_size);

            let source_store = connect_store(&source_config).await?;
            let target_store = connect_store(&target_config).await?;

            if dry_run {
                let stats = source_store.get_stats().await?;
                println!("Dry run: configuration and connectivity verified.");
                println!(
                    "  {} records of dimension {} would be migrated",
                    stats.total_records, stats.dimensions
                );
                return Ok(());
            }

            let tracker: Arc<dyn StateTracker> =
                Arc::new(SqliteTracker::connect(&cli.db_path).await?);

            let mapping = SchemaMapping::identity(source_config.kind, target_config.kind);
            let orchestrator = Orchestrator::new(&migration_id, Arc::clone(&tracker));
            orchestrator
                .start(MigrationConfig {
                    source: Arc::from(source_store),
                    target: Arc::from(target_store),
                    mapping,
                    options,
                })
                .await?;

            monitor_migration(&orchestrator, &migration_id, &cancel).await?;
            tracker.close().await;
        }

        Commands::Status {
            migration_id,
            output_json,
        } => {
            let tracker = SqliteTracker::connect(&cli.db_path).await?;
            let state = tracker.get_state(&migration_id).await?;
            let checkpoint = tracker.get_checkpoint(&migration_id).await?;

            if output_json {
                let body = serde_json::json!({
                    "migration_id": migration_id,
                    "status": state.as_str(),
                    "checkpoint": checkpoint,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("Migration: {}", migration_id);
                println!("Status: {}", state);
                match checkpoint {
                    Some(cp) => {
                        let percent = if cp.total_records > 0 {
                            cp.processed_count as f64 / cp.total_records as f64 * 100.0
                        } else {
                            0.0
                        };
                        println!(
                            "Progress: {}/{} records ({:.1}%)",
                            cp.processed_count, cp.total_records, percent
                        );
                        println!("Last checkpoint: {}", cp.last_checkpoint_at.to_rfc3339());
                        if let Some(stats) = cp.validation_stats {
                            println!(
                                "Validation: {} sampled, cosine min/avg/max {:.4}/{:.4}/{:.4}",
                                stats.sampled_count,
                                stats.min_cosine_similarity,
                                stats.avg_cosine_similarity,
                                stats.max_cosine_similarity
                            );
                        }
                    }
                    None => println!("Progress: 0/0 records (0.0%)"),
                }
            }
            tracker.close().await;
        }

        Commands::Validate {
            migration_id,
            stores,
            sample_size,
            output_json,
        } => {
            let (source_config, target_config, _) = stores.resolve()?;

            let source_store = connect_store(&source_config).await?;
            let target_store = connect_store(&target_config).await?;
            let tracker: Arc<dyn StateTracker> =
                Arc::new(SqliteTracker::connect(&cli.db_path).await?);

            let report = validate_and_record(
                Arc::clone(&tracker),
                &migration_id,
                source_store.as_ref(),
                target_store.as_ref(),
                sample_size,
            )
            .await?;
            tracker.close().await;

            if output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Validated migration: {}", migration_id);
                println!(
                    "  sampled {} records, {} valid, {} invalid",
                    report.total_sampled, report.valid_records, report.invalid_records
                );
                println!(
                    "  cosine similarity min/avg/max: {:.4}/{:.4}/{:.4}",
                    report.min_cosine_similarity,
                    report.avg_cosine_similarity,
                    report.max_cosine_similarity
                );
                for issue in &report.errors {
                    println!("  discrepancy {}: {}", issue.record_id, issue.message);
                }
            }

            if report.invalid_records > 0 {
                return Err(MigrateError::Validation(format!(
                    "validation found {} discrepancies",
                    report.invalid_records
                )));
            }
        }

        Commands::Rollback {
            migration_id,
            force,
        } => {
            if !force && !confirm_rollback(&migration_id)? {
                println!("Rollback aborted.");
                return Ok(());
            }

            let tracker: Arc<dyn StateTracker> =
                Arc::new(SqliteTracker::connect(&cli.db_path).await?);
            let orchestrator = Orchestrator::new(&migration_id, Arc::clone(&tracker));
            orchestrator.rollback(&migration_id).await?;
            tracker.close().await;

            println!("Migration {} marked rolled back.", migration_id);
            println!("Note: records already written to the target are not removed.");
        }
    }

    Ok(())
}

/// Poll progress until the worker reaches a terminal state; a SIGINT turns
/// into a cooperative stop.
async fn monitor_migration(
    orchestrator: &Orchestrator,
    migration_id: &str,
    cancel: &CancellationToken,
) -> Result<(), MigrateError> {
    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    let mut stop_requested = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled(), if !stop_requested => {
                eprintln!("Interrupt received, stopping migration...");
                orchestrator.stop(migration_id)?;
                stop_requested = true;
            }
            _ = ticker.tick() => {
                let stats = orchestrator.get_status(migration_id)?;

                let percent = if stats.total_records > 0 {
                    stats.migrated_records as f64 / stats.total_records as f64 * 100.0
                } else {
                    0.0
                };
                info!(
                    "progress: {}/{} records ({:.1}%) - {}",
                    stats.migrated_records, stats.total_records, percent, stats.state
                );

                match stats.state {
                    RunState::Completed => {
                        println!("Migration completed.");
                        println!(
                            "  {} records in {} batches",
                            stats.migrated_records, stats.batches_processed
                        );
                        return Ok(());
                    }
                    RunState::Stopped => return Err(MigrateError::Cancelled),
                    RunState::Failed => {
                        return Err(MigrateError::lifecycle(format!(
                            "migration failed: {}",
                            stats.error.unwrap_or_else(|| "unknown error".to_string())
                        )));
                    }
                    _ => {}
                }
            }
        }
    }
}

fn store_config(
    kind: &str,
    url: &str,
    api_key: &str,
    index: &str,
) -> Result<StoreConfig, MigrateError> {
    let kind: StoreKind = kind.parse()?;
    Ok(StoreConfig {
        kind,
        url: url.to_string(),
        api_key: api_key.to_string(),
        index: index.to_string(),
        timeout_secs: 30,
        extra: HashMap::new(),
    })
}

fn confirm_rollback(migration_id: &str) -> Result<bool, MigrateError> {
    println!(
        "WARNING: this marks migration {} as rolled back.",
        migration_id
    );
    print!("Are you sure? Type 'yes' to confirm: ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

fn setup_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, shutting down");
            cancel.cancel();
        }
    });
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), MigrateError> {
    let filter = tracing_subscriber::EnvFilter::try_new(verbosity)
        .map_err(|e| MigrateError::Config(format!("invalid verbosity: {}", e)))?;

    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init(),
        "text" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        other => {
            return Err(MigrateError::Config(format!(
                "invalid log format: {} (expected text or json)",
                other
            )));
        }
    }

    Ok(())
}
