use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use ordis::config::{Config, Storage, DEFAULT_JOURNAL, DEFAULT_PORT};
use ordis::db::DEFAULT_COMPACT_AFTER;
use ordis::{server, Error};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StorageKind {
    Memory,
    File,
}

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The address to listen on
    #[arg(long, env = "ORDIS_BIND", default_value = "127.0.0.1")]
    bind: String,

    /// The port to listen on
    #[arg(short, long, env = "ORDIS_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Keep data in memory only, or journal every write to a file
    #[arg(long, env = "ORDIS_STORAGE", value_enum, default_value_t = StorageKind::Memory)]
    storage: StorageKind,

    /// The journal file used by file storage
    #[arg(long, env = "ORDIS_PATH", default_value = DEFAULT_JOURNAL)]
    path: PathBuf,

    /// Sync the journal to disk after every write
    #[arg(long, env = "ORDIS_FSYNC")]
    fsync: bool,

    /// Journal size in bytes past which it is rewritten as a snapshot
    #[arg(long, env = "ORDIS_COMPACT_AFTER", default_value_t = DEFAULT_COMPACT_AFTER)]
    compact_after: u64,

    /// Largest bulk string a client may send, in bytes
    #[arg(long, env = "ORDIS_MAX_BULK_LEN")]
    max_bulk_len: Option<usize>,

    /// Most arguments a single multi-bulk command may carry
    #[arg(long, env = "ORDIS_MAX_ARGS")]
    max_args: Option<usize>,

    /// Longest inline command line a client may send, in bytes
    #[arg(long, env = "ORDIS_MAX_INLINE_LEN")]
    max_inline_len: Option<usize>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let storage = match args.storage {
            StorageKind::Memory => Storage::Memory,
            StorageKind::File => Storage::File {
                path: args.path,
                fsync: args.fsync,
                compact_after: args.compact_after,
            },
        };

        let mut builder = Config::builder()
            .bind(args.bind)
            .port(args.port)
            .storage(storage);
        if let Some(len) = args.max_bulk_len {
            builder = builder.max_bulk_len(len);
        }
        if let Some(count) = args.max_args {
            builder = builder.max_args(count);
        }
        if let Some(len) = args.max_inline_len {
            builder = builder.max_inline_len(len);
        }

        builder.build()
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    server::run(args.into()).await
}
