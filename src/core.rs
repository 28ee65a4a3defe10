//! Entry point over a local storage directory: configuration, heads file loading, and table
//! locations.

use crate::error::Error;
use crate::heads::{parse_heads, HeadsFile};
use crate::index::Table;
use crate::telemetry::{decode_metrics, noop_event_listener, DecodeEvent, DecodeEventListener};

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default file name of the heads checkpoint inside the data directory.
pub const DEFAULT_HEADS_FILE_NAME: &str = "heads.db";

/// Configuration options for [`LocalStorage`].
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Storage directory holding the heads file and the index table directories
    pub data_dir: PathBuf,
    /// Heads file name relative to `data_dir`
    pub heads_file_name: String,
    /// Fail when bytes remain after the last heads record
    pub require_full_consumption: bool,
    /// Structured event hook for observability (no-op by default).
    pub event_listener: Arc<dyn DecodeEventListener>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            data_dir: PathBuf::from("./data"),
            heads_file_name: DEFAULT_HEADS_FILE_NAME.to_string(),
            require_full_consumption: true,
            event_listener: noop_event_listener(),
        }
    }
}

impl ReaderConfig {
    /// Checks settings that would otherwise surface as confusing I/O errors.
    pub fn validate(&self) -> Result<(), Error> {
        if self.heads_file_name.is_empty() {
            return Err(Error::Config("heads_file_name must not be empty".to_string()));
        }
        if Path::new(&self.heads_file_name).is_absolute() {
            return Err(Error::Config(format!(
                "heads_file_name must be relative to data_dir, got {}",
                self.heads_file_name
            )));
        }
        Ok(())
    }
}

/// Read-only view of one local storage directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    config: ReaderConfig,
}

impl LocalStorage {
    pub fn with_config(config: ReaderConfig) -> Self {
        Self { config }
    }

    pub fn open<P: AsRef<Path>>(data_dir: P) -> Self {
        Self::with_config(ReaderConfig {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..ReaderConfig::default()
        })
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn heads_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.heads_file_name)
    }

    /// Directory of an index table, for handing to an ordered store implementation.
    pub fn table_path(&self, table: Table) -> PathBuf {
        self.config.data_dir.join(table.name())
    }

    /// Loads the heads file fully into memory and parses it.
    ///
    /// The file handle is closed before parsing starts.
    pub fn read_heads(&self) -> Result<HeadsFile, Error> {
        self.config.validate()?;
        let events = &self.config.event_listener;
        let path = self.heads_path();
        let data = read_file(&path)?;
        decode_metrics::record_heads_bytes_read(data.len() as u64);
        events.on_event(DecodeEvent::HeadsFileLoaded {
            path,
            bytes: data.len() as u64,
        });

        match parse_heads(&data, self.config.require_full_consumption) {
            Ok(heads) => {
                decode_metrics::record_heads_records(heads.records.len() as u64);
                events.on_event(DecodeEvent::HeadsParsed {
                    version: heads.header.version,
                    records: heads.records.len() as u64,
                });
                Ok(heads)
            }
            Err(e) => {
                decode_metrics::record_decode_failure("heads");
                events.on_event(DecodeEvent::HeadsParseFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, Error> {
    let mut file = File::open(path)?;
    let mut data = Vec::with_capacity(file.metadata().map(|m| m.len() as usize).unwrap_or(0));
    file.read_to_end(&mut data)?;
    Ok(data)
}
