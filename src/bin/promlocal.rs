//! Dumps the heads file of a local storage directory.
//!
//! Loads configuration from (in precedence order): defaults, config file, environment variables
//! (`PROMLOCAL_*`), and CLI flags. Prints one line per series in file order:
//! `<fingerprint as 16 hex digits>: <metric>`.

use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use config::{Config, Environment, File};
use promlocal::telemetry::noop_event_listener;
use promlocal::{stringify, DecodeEvent, DecodeEventListener, Error, LocalStorage, ReaderConfig};

// ---------- CLI ----------

/// Decode and print the series recorded in a heads file.
#[derive(Parser, Debug)]
#[command(name = "promlocal", version, about)]
pub struct Cli {
    /// Path to config file (TOML). If omitted, no file is loaded unless default path exists.
    #[arg(long, env = "PROMLOCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the storage directory holding heads.db and the index tables.
    #[arg(long, env = "PROMLOCAL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Override the heads file name inside the data directory.
    #[arg(long)]
    pub heads_file: Option<String>,

    /// Do not load any config file; use defaults + env + CLI only.
    #[arg(long, default_value_t = false)]
    pub no_config: bool,

    /// Load and validate config (file + env + CLI), print the effective settings, then exit.
    #[arg(long, default_value_t = false)]
    pub validate_config: bool,

    /// Accept bytes after the last heads record instead of failing.
    #[arg(long, default_value_t = false)]
    pub allow_trailing_bytes: bool,

    /// Print decode events to stderr.
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

// ---------- File/env config (all optional for partial config) ----------

/// Settings as read from file + env. Every field optional for layering.
#[derive(Debug, Default, serde::Deserialize)]
pub struct FileConfig {
    pub data_dir: Option<String>,
    pub heads_file_name: Option<String>,
    pub require_full_consumption: Option<bool>,
}

/// Load merged config. CLI overrides file/env.
fn load_reader_config(cli: &Cli) -> Result<ReaderConfig, Error> {
    let mut builder = Config::builder();

    if !cli.no_config {
        if let Some(ref path) = cli.config {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path.as_path()).required(false));
        } else {
            let default_path = PathBuf::from("promlocal.toml");
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path.as_path()).required(false));
            }
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("PROMLOCAL")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .ignore_empty(true),
    );

    let merged = builder
        .build()
        .map_err(|e| Error::Config(e.to_string()))?;
    let partial: FileConfig = merged
        .try_deserialize()
        .map_err(|e| Error::Config(e.to_string()))?;

    let mut config = ReaderConfig {
        event_listener: noop_event_listener(),
        ..ReaderConfig::default()
    };
    merge_into_reader_config(&mut config, &partial);

    if let Some(ref d) = cli.data_dir {
        config.data_dir = d.clone();
    }
    if let Some(ref name) = cli.heads_file {
        config.heads_file_name = name.clone();
    }
    if cli.allow_trailing_bytes {
        config.require_full_consumption = false;
    }
    if cli.verbose {
        config.event_listener = Arc::new(StderrEventListener);
    }
    config.validate()?;
    Ok(config)
}

/// Merge file/env partial config onto `ReaderConfig`. Only overwrites fields that are `Some`.
fn merge_into_reader_config(base: &mut ReaderConfig, partial: &FileConfig) {
    if let Some(s) = &partial.data_dir {
        base.data_dir = PathBuf::from(s);
    }
    if let Some(name) = &partial.heads_file_name {
        base.heads_file_name = name.clone();
    }
    if let Some(b) = partial.require_full_consumption {
        base.require_full_consumption = b;
    }
}

// ---------- Events ----------

#[derive(Debug)]
struct StderrEventListener;

impl DecodeEventListener for StderrEventListener {
    fn on_event(&self, event: DecodeEvent) {
        eprintln!("{:?}", event);
    }
}

// ---------- Main ----------

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let config = load_reader_config(&cli).map_err(|e| {
        eprintln!("config error: {}", e);
        e
    })?;

    if cli.validate_config {
        println!("data_dir={}", config.data_dir.display());
        println!("heads_file_name={}", config.heads_file_name);
        println!("require_full_consumption={}", config.require_full_consumption);
        return Ok(());
    }

    let storage = LocalStorage::with_config(config);
    let heads = storage.read_heads().map_err(|e| {
        eprintln!("failed to read {}: {}", storage.heads_path().display(), e);
        e
    })?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for record in &heads.records {
        writeln!(out, "{:016x}: {}", record.fingerprint, stringify(&record.metric)?)?;
    }
    out.flush()?;
    Ok(())
}
