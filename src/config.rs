//! Server configuration with defaults matching the `ordis` binary.

use std::path::PathBuf;

use crate::codec::Limits;
use crate::db::{self, Db};

pub const DEFAULT_PORT: u16 = 6380;
pub const DEFAULT_JOURNAL: &str = "./ordis.journal";

#[derive(Debug, Clone)]
pub struct Config {
    /// Address to listen on.
    pub bind: String,
    pub port: u16,
    pub storage: Storage,
    /// Request size limits enforced by the codec.
    pub limits: Limits,
}

/// Where the data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// Gone when the process exits.
    Memory,
    /// Every commit is appended to a journal that is replayed on start. Past `compact_after`
    /// bytes the journal is rewritten as a snapshot.
    File {
        path: PathBuf,
        fsync: bool,
        compact_after: u64,
    },
}

impl Storage {
    pub fn open_db(&self) -> Result<Db, db::Error> {
        match self {
            Storage::Memory => Ok(Db::memory()),
            Storage::File {
                path,
                fsync,
                compact_after,
            } => Db::open_with(path, *fsync, *compact_after),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            storage: Storage::Memory,
            limits: Limits::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn bind(mut self, address: impl Into<String>) -> Self {
        self.config.bind = address.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn storage(mut self, storage: Storage) -> Self {
        self.config.storage = storage;
        self
    }

    /// Largest bulk payload accepted, in bytes.
    pub fn max_bulk_len(mut self, len: usize) -> Self {
        self.config.limits.max_bulk_len = len;
        self
    }

    /// Largest number of elements in one multi-bulk request.
    pub fn max_args(mut self, count: usize) -> Self {
        self.config.limits.max_args = count;
        self
    }

    /// Longest inline request line accepted, in bytes.
    pub fn max_inline_len(mut self, len: usize) -> Self {
        self.config.limits.max_inline_len = len;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
