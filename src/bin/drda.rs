//! drda: command-line DRDA client
//!
//! # Usage
//!
//! ```bash
//! # Run a statement through the pool
//! drda query "SELECT id, name FROM users WHERE id > ?" --bind 10
//!
//! # Pool health after connecting
//! drda --config ./drda.toml health
//!
//! # Generate an RSA key pair for credential encryption tests
//! drda keygen --bits 2048
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use drda::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drda")]
#[command(version)]
#[command(about = "DRDA database client", long_about = None)]
#[command(after_help = "EXAMPLES:
    drda query 'SELECT * FROM users WHERE id = ?' --bind 42
    drda --config ./drda.toml health
    drda keygen --bits 1024")]
struct Cli {
    /// Settings file (defaults to $DRDA_CONFIG, then the user config dir)
    #[arg(short, long, env = "DRDA_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one SQL statement
    Query {
        sql: String,

        /// Positional parameter values
        #[arg(short, long, value_delimiter = ',')]
        bind: Vec<String>,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Connect the pool and report its health
    Health,
    /// Generate an RSA key pair and print it as PEM
    Keygen {
        #[arg(long, default_value_t = 2048)]
        bits: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("drda={level},drda_client={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Keygen { bits } => keygen(bits),
        Commands::Health => {
            let ctx = DrdaContext::new(Settings::load(cli.config.as_deref())?)?;
            let connected = ctx.connect().await;
            print_health(&ctx);
            ctx.shutdown().await?;
            connected?;
            Ok(())
        }
        Commands::Query { sql, bind, format } => {
            let ctx = DrdaContext::new(Settings::load(cli.config.as_deref())?)?;
            ctx.connect().await?;
            let outcome = run_query(&ctx, &sql, &bind, format).await;
            ctx.shutdown().await?;
            outcome
        }
    }
}

async fn run_query(
    ctx: &DrdaContext,
    sql: &str,
    bind: &[String],
    format: OutputFormat,
) -> anyhow::Result<()> {
    let params: Vec<Value> = bind.iter().map(|b| parse_binding(b)).collect();
    let mut conn = ctx.acquire().await?;
    let result = conn.query(sql, &params).await?;
    ctx.manager().release(conn);

    if result.rows.is_empty() {
        println!(
            "{} {} rows affected",
            "✓".green(),
            result.rows_affected.to_string().cyan()
        );
        return Ok(());
    }
    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = result
                .rows
                .iter()
                .map(|row| row.values.iter().map(to_json).collect())
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Table => print_table(&result.rows),
    }
    Ok(())
}

/// Integer, then float, then boolean, then `null`, else text.
fn parse_binding(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        Value::BigInt(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Double(f)
    } else if let Ok(b) = raw.parse::<bool>() {
        Value::Boolean(b)
    } else if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else {
        Value::from(raw)
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::BigInt(n) => serde_json::Value::from(*n),
        Value::Double(f) => serde_json::Value::from(*f),
        Value::Boolean(b) => serde_json::Value::from(*b),
        Value::Varchar(s) => serde_json::Value::from(s.as_str()),
        Value::Varbyte(_) => serde_json::Value::from(value.to_string()),
    }
}

fn print_table(rows: &[Row]) {
    let columns = rows.iter().map(Row::len).max().unwrap_or(0);
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.values.iter().map(ToString::to_string).collect())
        .collect();

    let mut widths: Vec<usize> = (1..=columns).map(|i| i.to_string().len() + 1).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let header: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, w)| format!("{:w$}", format!("#{}", i + 1), w = *w))
        .collect();
    println!("{}", header.join(" │ ").white().bold());
    let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", sep.join("─┼─").dimmed());

    for row in &cells {
        let line: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| format!("{:w$}", row.get(i).map(String::as_str).unwrap_or(""), w = *w))
            .collect();
        println!("{}", line.join(" │ "));
    }
    println!();
    println!("{} row(s) returned", rows.len().to_string().cyan());
}

fn print_health(ctx: &DrdaContext) {
    let health = ctx.health();
    let status = if health.healthy {
        "healthy".green().bold()
    } else {
        "unhealthy".red().bold()
    };
    let settings = ctx.settings();
    println!(
        "{} {}:{}/{}",
        "Server:".dimmed(),
        settings.connection.host,
        settings.connection.port,
        settings.connection.database.yellow()
    );
    println!("{} {}", "Status:".dimmed(), status);
    println!("{} {}", "State:".dimmed(), health.state.to_string().cyan());
    println!(
        "{} {} active ({} idle, {} in use), {} waiting",
        "Pool:".dimmed(),
        health.active_connections,
        health.idle,
        health.in_use,
        health.waiting
    );
}

fn keygen(bits: usize) -> anyhow::Result<()> {
    tracing::debug!(bits, "generating key pair");
    let key = RsaKeyPair::generate(bits)?;
    println!("{}", key.export_public_pem().trim_end());
    println!("{}", key.export_private_pem()?.trim_end());
    Ok(())
}
