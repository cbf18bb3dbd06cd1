//! recordloom CLI - Load a remote JSON collection into SQL tables
//!
//! Usage:
//!   recordloom ingest <prefix> <path> [--query <cql> | --param k=v ...]
//!   recordloom drop <prefix>
//!
//! Examples:
//!   recordloom ingest users /users --query 'active==true' --depth 2
//!   recordloom ingest folio.instances /instance-storage/instances --limit 500
//!   recordloom --config ./ld.toml drop folio.instances

use clap::{Parser, Subcommand};
use recordloom::config::Settings;
use recordloom::db;
use recordloom::fetch::QueryFilter;
use recordloom::ingest::{self, Flow, IngestRequest, Ingestor};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recordloom")]
#[command(about = "recordloom - Load paged JSON collections into relational tables")]
#[command(version)]
struct Cli {
    /// Path to a recordloom.toml (defaults to the usual search locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a collection and build its tables
    Ingest {
        /// Table prefix, `table` or `schema.table`
        prefix: String,

        /// Collection path, e.g. /users
        path: String,

        /// CQL filter
        #[arg(short, long, conflicts_with = "param")]
        query: Option<String>,

        /// Raw query parameter, repeatable
        #[arg(short, long, value_name = "KEY=VALUE", value_parser = parse_param)]
        param: Vec<(String, String)>,

        /// Nesting levels to expand (0-4, 0 keeps only the raw table)
        #[arg(short, long)]
        depth: Option<u32>,

        /// Stop after this many records
        #[arg(short, long)]
        limit: Option<u64>,

        /// Drop the raw table once the derived tables are built
        #[arg(long)]
        drop_raw: bool,

        /// Page by offset, sorted by this field
        #[arg(long, value_name = "FIELD")]
        page_by: Option<String>,
    },

    /// Drop every table belonging to a prefix
    Drop {
        /// Table prefix, `table` or `schema.table`
        prefix: String,
    },
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings, String> {
    let settings = match path {
        Some(path) => Settings::from_file(&path)
            .map_err(|e| format!("Error reading config '{}': {}", path.display(), e))?,
        None => Settings::load().map_err(|e| format!("Error loading config: {}", e))?,
    };
    settings
        .validate()
        .map_err(|e| format!("Invalid config: {}", e))?;
    Ok(settings)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match load_settings(cli.config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Ingest {
            prefix,
            path,
            query,
            param,
            depth,
            limit,
            drop_raw,
            page_by,
        } => {
            let filter = match (query, param) {
                (Some(cql), _) => QueryFilter::Cql(cql),
                (None, params) if !params.is_empty() => QueryFilter::Params(params),
                _ => QueryFilter::None,
            };
            let mut request = IngestRequest::new(prefix, path)
                .filter(filter)
                .max_depth(depth.unwrap_or(settings.ingest.max_depth))
                .keep_raw(settings.ingest.keep_raw && !drop_raw);
            if let Some(limit) = limit {
                request = request.row_limit(limit);
            }
            if let Some(field) = page_by {
                request = request.page_by(field);
            }
            cmd_ingest(&settings, &request)
        }
        Commands::Drop { prefix } => cmd_drop(&settings, &prefix),
    }
}

fn cmd_ingest(settings: &Settings, request: &IngestRequest) -> ExitCode {
    let mut ingestor = match Ingestor::from_settings(settings) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = ingestor.ingest_with_progress(request, |p| {
        if p.ingested % 10_000 == 0 {
            match p.total {
                Some(total) => tracing::info!(ingested = p.ingested, total, "progress"),
                None => tracing::info!(ingested = p.ingested, "progress"),
            }
        }
        Flow::Continue
    });

    match result {
        Ok(outcome) => {
            for table in &outcome.tables {
                println!("{}", table);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Ingestion failed: {}", e);
            if let Some(statement) = e.statement() {
                eprintln!("  statement: {}", statement);
            }
            ExitCode::FAILURE
        }
    }
}

fn cmd_drop(settings: &Settings, prefix: &str) -> ExitCode {
    let config = match settings.database.to_connection_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid database config: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut db = match db::open(&config) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match ingest::drop_prefix(db.as_mut(), prefix) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Drop failed: {}", e);
            if let Some(statement) = e.statement() {
                eprintln!("  statement: {}", statement);
            }
            ExitCode::FAILURE
        }
    }
}
