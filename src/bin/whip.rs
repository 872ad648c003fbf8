//! CLI surface (collaborator, spec §6): `load`/`lookup`/`shell`/`perftest`/`serve`
//! subcommands, grounded in `whip/cli.py`. All route to the same `Database`
//! handle; exit 0 on success, nonzero on argument or file errors.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use whipcore::config::Config;
use whipcore::db::Database;
use whipcore::lookup::LookupMode;
use whipcore::reader::ndjson::NdjsonReader;
use whipcore::reader::SnapshotReader;
use whipcore::WhipError;

#[derive(Parser)]
#[command(name = "whip", about = "Temporally versioned IP geo lookup")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load one or more NDJSON snapshot files.
    Load {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Look up one or more IP addresses.
    Lookup {
        #[arg(required = true)]
        ips: Vec<String>,
        #[arg(long, alias = "dt")]
        datetime: Option<String>,
    },
    /// Interactive REPL: read an IP per line from stdin, print the result.
    Shell {
        #[arg(long, alias = "dt")]
        datetime: Option<String>,
    },
    /// Run a throughput benchmark of random or file-sourced lookups.
    Perftest {
        #[arg(long, short = 'n', default_value_t = 100_000)]
        iterations: u64,
        #[arg(long)]
        test_set: Option<PathBuf>,
        #[arg(long, alias = "dt")]
        datetime: Option<String>,
    },
    /// Serve the HTTP surface.
    Serve,
}

fn main() -> Result<(), WhipError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Load { inputs } => run_load(&cli.config, inputs),
        Command::Lookup { ips, datetime } => run_lookup(&cli.config, ips, datetime),
        Command::Shell { datetime } => run_shell(&cli.config, datetime),
        Command::Perftest { iterations, test_set, datetime } => {
            run_perftest(&cli.config, iterations, test_set, datetime)
        }
        Command::Serve => run_serve(cli.config),
    }
}

fn run_load(config: &Config, inputs: Vec<PathBuf>) -> Result<(), WhipError> {
    tracing::info!(count = inputs.len(), "importing data files");
    let db = Database::open(&config.database_dir, true)?.with_progress_interval(config.progress_interval());
    let readers: Vec<Box<dyn SnapshotReader>> = inputs
        .iter()
        .map(|path| NdjsonReader::open(path).map(|r| Box::new(r) as Box<dyn SnapshotReader>))
        .collect::<Result<_, _>>()?;
    let stats = db.load(readers)?;
    println!("wrote {} sub-ranges", stats.sub_ranges_written);
    Ok(())
}

fn run_lookup(config: &Config, ips: Vec<String>, datetime: Option<String>) -> Result<(), WhipError> {
    let db = Database::open(&config.database_dir, config.create_if_missing)?;
    let mode = LookupMode::from_query(datetime.as_deref());
    for ip in ips {
        print_lookup(&db, &ip, mode.clone());
    }
    Ok(())
}

fn run_shell(config: &Config, datetime: Option<String>) -> Result<(), WhipError> {
    let db = Database::open(&config.database_dir, config.create_if_missing)?;
    let mode = LookupMode::from_query(datetime.as_deref());
    let stdin = io::stdin();
    loop {
        print!("IP: ");
        io::stdout().flush().ok();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let ip = line.trim();
        if ip.is_empty() {
            continue;
        }
        print_lookup(&db, ip, mode.clone());
    }
    Ok(())
}

fn print_lookup(db: &Database, ip: &str, mode: LookupMode) {
    match db.lookup(ip, mode) {
        Ok(Some(bytes)) => match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default()),
            Err(_) => println!("{}", String::from_utf8_lossy(&bytes)),
        },
        Ok(None) => println!("No hit found"),
        Err(e) => eprintln!("error looking up {ip}: {e}"),
    }
}

fn run_perftest(
    config: &Config,
    iterations: u64,
    test_set: Option<PathBuf>,
    datetime: Option<String>,
) -> Result<(), WhipError> {
    let db = Database::open(&config.database_dir, config.create_if_missing)?;
    let mode = LookupMode::from_query(datetime.as_deref());

    let ips: Vec<String> = match test_set {
        Some(path) => {
            tracing::info!(path = %path.display(), "using test set");
            let contents = std::fs::read_to_string(&path).map_err(|e| WhipError::io(&path, e))?;
            contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect()
        }
        None => {
            tracing::info!(iterations, "running iterations with random IP addresses");
            (0..iterations)
                .map(|_| {
                    let octets: [u8; 4] = rand::random();
                    format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
                })
                .collect()
        }
    };

    let start = Instant::now();
    let mut n = 0u64;
    for ip in &ips {
        let _ = db.lookup(ip, mode.clone());
        n += 1;
    }
    let elapsed = start.elapsed().as_secs_f64();
    println!("{n} lookups in {elapsed:.2}s ({:.2} req/s)", n as f64 / elapsed.max(f64::EPSILON));
    Ok(())
}

fn run_serve(config: Config) -> Result<(), WhipError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");
    let db = Arc::new(Database::open(&config.database_dir, config.create_if_missing)?);
    runtime
        .block_on(whipcore::http::serve(db, &config.host, config.port))
        .map_err(|e| WhipError::io(&config.database_dir, e))
}
