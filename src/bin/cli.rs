//! spool CLI
//!
//! Inspect, append to, and repair persistent buffer file pairs.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use spool::codec::RawCodec;
use spool::persist::PersistentCodecBuffer;
use spool::{BufferConfig, IndexRecovery};
use tracing_subscriber::{fmt, EnvFilter};

/// spool CLI
#[derive(Parser, Debug)]
#[command(name = "spool-cli")]
#[command(about = "Inspect and repair spool buffer files")]
#[command(version)]
struct Args {
    /// Index file (defaults to the data file with an .index extension)
    #[arg(short, long, global = true)]
    index: Option<PathBuf>,

    /// Expected magic value (decimal or 0x-prefixed hex)
    #[arg(short, long, global = true, default_value = "0", value_parser = parse_magic)]
    magic: u32,

    /// Create new files with the sparse layout
    #[arg(long, global = true)]
    sparse: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show header, metadata and record count
    Info {
        /// The data file
        data: PathBuf,
    },

    /// Print one record
    Get {
        /// The data file
        data: PathBuf,

        /// Logical record index
        index: u64,
    },

    /// Append records given as UTF-8 strings
    Append {
        /// The data file
        data: PathBuf,

        /// Values to append
        values: Vec<String>,
    },

    /// Check the index against the data file without modifying anything
    Verify {
        /// The data file
        data: PathBuf,
    },

    /// Rewrite the index file from the data file
    RebuildIndex {
        /// The data file
        data: PathBuf,
    },
}

fn parse_magic(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid magic value '{}': {}", value, e))
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,spool=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn config_for(args: &Args, data: &PathBuf) -> BufferConfig {
    let mut builder = BufferConfig::builder(data)
        .magic_value(args.magic)
        .sparse(args.sparse);
    if let Some(index) = &args.index {
        builder = builder.index_path(index);
    }
    builder.build()
}

fn run(args: &Args) -> spool::Result<()> {
    match &args.command {
        Commands::Info { data } => {
            let buffer = PersistentCodecBuffer::<Vec<u8>>::open(config_for(args, data), RawCodec)?;
            let header = buffer.header();

            println!("data file:    {}", buffer.data_path().display());
            println!("index file:   {}", buffer.index_path().display());
            println!("magic value:  0x{:08x}", header.magic_value);
            println!("layout:       {}", if header.is_sparse() { "sparse" } else { "dense" });
            println!("data offset:  {}", header.data_offset);
            println!("records:      {}", buffer.size());
            match &header.metadata {
                Some(metadata) => {
                    println!("metadata:     {} entries", metadata.entries.len());
                    for (key, value) in &metadata.entries {
                        println!("  {} = {}", key, value);
                    }
                }
                None => println!("metadata:     none"),
            }
        }

        Commands::Get { data, index } => {
            let buffer = PersistentCodecBuffer::<Vec<u8>>::open(config_for(args, data), RawCodec)?;
            match buffer.get(*index) {
                Some(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => println!("{}", text),
                    Err(e) => println!("{}", hex(e.as_bytes())),
                },
                None => {
                    println!("(none)");
                }
            }
        }

        Commands::Append { data, values } => {
            let buffer = PersistentCodecBuffer::<Vec<u8>>::open(config_for(args, data), RawCodec)?;
            let records: Vec<Vec<u8>> = values.iter().map(|v| v.as_bytes().to_vec()).collect();
            let range = buffer.add_all(&records)?;
            println!("appended records {}..{}", range.start, range.end);
        }

        Commands::Verify { data } => {
            let report = IndexRecovery::verify(&config_for(args, data))?;
            println!("{:#?}", report);
            if !report.is_consistent() {
                println!("inconsistent: run rebuild-index to repair");
                process::exit(2);
            }
        }

        Commands::RebuildIndex { data } => {
            let report = IndexRecovery::rebuild(&config_for(args, data))?;
            println!("{:#?}", report);
        }
    }

    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
