//! sqlite-pg-migrate CLI - film catalog migration from SQLite to PostgreSQL.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlite_pg_migrate::{
    health_check, Config, MigrateError, Orchestrator, PostgresWriter, SqliteReader, TableReader,
    VerifyEngine,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Exit code when the migration finished with failed tables.
const EXIT_PARTIAL: u8 = 4;

/// Exit code when the consistency check found differences.
const EXIT_INCONSISTENT: u8 = 5;

/// Exit code when every table finished but some rows were rejected.
const EXIT_REJECTED: u8 = 6;

#[derive(Parser)]
#[command(name = "sqlite-pg-migrate")]
#[command(about = "Migrate the film catalog from SQLite to PostgreSQL and check the copy")]
#[command(version)]
struct Cli {
    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy all five tables into the target; existing rows are skipped
    Migrate,

    /// Compare row counts and contents of source and target
    Check,

    /// Test both database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(MigrateError::Config)?;

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: source {}, target {}:{}/{}",
        config.source.path.display(),
        config.target.host,
        config.target.port,
        config.target.database
    );

    let cancel_token = setup_signal_handler()?;

    match cli.command {
        Commands::Migrate => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.run(cancel_token).await;
            orchestrator.close().await;
            let result = result?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nMigration {}!", result.status);
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                for table in &result.tables {
                    println!(
                        "  {:<17} {:?}: read {}, inserted {}, skipped {}, rejected {}",
                        table.table.to_string(),
                        table.status,
                        table.rows_read,
                        table.inserted,
                        table.skipped,
                        table.rejected
                    );
                }
                if !result.failed_tables.is_empty() {
                    println!("  Failed tables: {:?}", result.failed_tables);
                }
                if result.rows_rejected > 0 {
                    println!("  Rejected rows: {} (see log for reasons)", result.rows_rejected);
                }
            }

            if !result.failed_tables.is_empty() {
                return Ok(ExitCode::from(EXIT_PARTIAL));
            }
            if result.rows_rejected > 0 {
                return Ok(ExitCode::from(EXIT_REJECTED));
            }
        }

        Commands::Check => {
            let batch_size = config.migration.get_batch_size();
            let source = Arc::new(SqliteReader::new(&config.source).await?);
            let target = Arc::new(PostgresWriter::new(&config.target).await?);
            let engine = VerifyEngine::new(source, target.clone(), batch_size);

            let result = engine.verify_all(&cancel_token).await;
            target.close().await;
            let result = result?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nConsistency check:");
                for table in &result.tables {
                    let status = if table.is_clean() { "OK" } else { "DIFFERS" };
                    println!(
                        "  {:<17} {} ({} rows, {} batches)",
                        table.table.to_string(),
                        status,
                        table.rows_compared,
                        table.batches_compared
                    );
                    for finding in &table.findings {
                        println!("    - {}", finding);
                    }
                }
                println!(
                    "\n  Overall: {}",
                    if result.is_clean() { "CONSISTENT" } else { "INCONSISTENT" }
                );
            }

            if !result.is_clean() {
                return Ok(ExitCode::from(EXIT_INCONSISTENT));
            }
        }

        Commands::HealthCheck => {
            let result = health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (SQLite): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (PostgreSQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Invalid verbosity '{}'", other)),
    };

    // stdout carries only command results.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Invalid log format '{}'", other)),
    }

    Ok(())
}

/// Cancel the returned token on SIGINT or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let mut stream = signal(kind)?;
        let token = cancel_token.clone();
        tokio::spawn(async move {
            stream.recv().await;
            eprintln!("\nReceived {}. Stopping after the current page...", name);
            token.cancel();
        });
    }

    Ok(cancel_token)
}

/// Cancel the returned token on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current page...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
