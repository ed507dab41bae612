//! blobd-cli: drives a `blobadapter::Backend` directly over a local data
//! directory for manual smoke-testing. Not part of the commands consumed in
//! production (spec.md §4.5/§6) — those arrive over the external
//! transport — but the same dispatcher the transport would call.

use anyhow::{anyhow, Context, Result};
use blobadapter::dispatcher::{self, CommandCode, Reply};
use blobadapter::{Backend, BackendCallbacks};
use blobcodec::{CommandFlags, IoAttr, Key, ID_LEN};
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

#[derive(Parser)]
#[command(name = "blobd-cli")]
#[command(about = "Local smoke-test harness for the blob storage backend", long_about = None)]
struct Cli {
    /// Path to the backend's textual config file (`data = ...`, etc.)
    #[arg(short = 'c', long)]
    conf: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a key from a file ("-" for stdin)
    Put { key: String, file: String },
    /// Read a key to a file ("-" for stdout)
    Get { key: String, file: String },
    /// Report a key's size and timestamp without reading its payload
    Stat { key: String },
    /// Remove a key
    Rm { key: String },
    /// List keys in `[start, end]`, optionally sorted
    Range {
        start: String,
        end: String,
        #[arg(long)]
        sort: bool,
    },
    /// Report filesystem usage and record counters
    Stats,
    /// Start (or report the status of) a defragmentation pass
    Defrag {
        #[arg(long)]
        status: bool,
    },
}

/// Keys on the wire are opaque `ID_LEN`-byte identifiers; this CLI maps a
/// human-typed name onto one by copying its UTF-8 bytes left-justified into
/// the fixed-size array (truncating or zero-padding as needed), since there
/// is no hashing scheme specified for this backend's callers to agree on.
fn parse_key(s: &str) -> Key {
    let mut bytes = [0u8; ID_LEN];
    let src = s.as_bytes();
    let n = src.len().min(ID_LEN);
    bytes[..n].copy_from_slice(&src[..n]);
    Key(bytes)
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = blobconfig::BackendConfig::from_file(&cli.conf).context("failed to parse backend config")?;
    let backend = Backend::init(config).context("failed to initialize backend")?;

    match cli.command {
        Commands::Put { key, file } => cmd_put(&backend, &key, &file),
        Commands::Get { key, file } => cmd_get(&backend, &key, &file),
        Commands::Stat { key } => cmd_stat(&backend, &key),
        Commands::Rm { key } => cmd_rm(&backend, &key),
        Commands::Range { start, end, sort } => cmd_range(&backend, &start, &end, sort),
        Commands::Stats => cmd_stats(&backend),
        Commands::Defrag { status } => cmd_defrag(&backend, status),
    }
}

fn read_input(file: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    if file == "-" {
        std::io::stdin().read_to_end(&mut buf)?;
    } else {
        buf = std::fs::read(file)?;
    }
    Ok(buf)
}

fn cmd_put(backend: &Backend, key: &str, file: &str) -> Result<()> {
    let payload = read_input(file)?;
    let mut io = IoAttr::new(parse_key(key));
    io.size = payload.len() as u64;
    io.timestamp = now_secs();
    io.flags = CommandFlags::PLAIN_WRITE;

    match dispatcher::dispatch(backend, CommandCode::Write, &mut io, &payload, None, |_| Ok(()))? {
        Reply::FileInfo(info) => {
            debug!(size = info.size, "write committed");
            println!("wrote {} bytes for key {}", payload.len(), key);
        }
        _ => unreachable!("WRITE always yields FileInfo"),
    }
    Ok(())
}

fn cmd_get(backend: &Backend, key: &str, file: &str) -> Result<()> {
    let mut io = IoAttr::new(parse_key(key));
    let reply = match dispatcher::dispatch(backend, CommandCode::Read, &mut io, &[], None, |_| Ok(()))? {
        Reply::Read(reply) => reply,
        _ => unreachable!("READ always yields Read"),
    };

    // The dispatcher hands back a zero-copy (fd, offset, size) descriptor for
    // a real transport to sendfile(); this in-process CLI instead re-reads
    // the record through the engine to get an owned, safely-readable handle.
    let wc = backend.engine().lookup(parse_key(key), true)?;
    let mut buf = vec![0u8; reply.size as usize];
    wc.file().read_exact_at(&mut buf, reply.offset)?;

    if file == "-" {
        std::io::stdout().write_all(&buf)?;
    } else {
        std::fs::write(file, &buf)?;
    }
    if reply.cache_forget {
        debug!("classifier flagged this read as random access");
    }
    Ok(())
}

fn cmd_stat(backend: &Backend, key: &str) -> Result<()> {
    let mut io = IoAttr::new(parse_key(key));
    match dispatcher::dispatch(backend, CommandCode::Lookup, &mut io, &[], None, |_| Ok(()))? {
        Reply::FileInfo(info) => {
            println!("size={} timestamp={}", info.size, info.timestamp);
            Ok(())
        }
        _ => unreachable!("LOOKUP always yields FileInfo"),
    }
}

fn cmd_rm(backend: &Backend, key: &str) -> Result<()> {
    let mut io = IoAttr::new(parse_key(key));
    match dispatcher::dispatch(backend, CommandCode::Del, &mut io, &[], None, |_| Ok(()))? {
        Reply::Deleted => {
            println!("removed {key}");
            Ok(())
        }
        _ => unreachable!("DEL always yields Deleted"),
    }
}

fn cmd_range(backend: &Backend, start: &str, end: &str, sort: bool) -> Result<()> {
    let mut io = IoAttr::new(parse_key(start));
    io.parent = parse_key(end);
    if sort {
        io.flags |= CommandFlags::SORT;
    }

    let mut count = 0u64;
    let result = match dispatcher::dispatch(backend, CommandCode::ReadRange, &mut io, &[], None, |frame| {
        count += 1;
        println!("hit #{count}: key={} offset={} size={}", frame.key, frame.offset, frame.size);
        Ok(())
    })? {
        Reply::RangeRead(result) => result,
        _ => unreachable!("READ_RANGE always yields RangeRead"),
    };
    println!("terminator: num={}", result.emitted);
    Ok(())
}

fn cmd_stats(backend: &Backend) -> Result<()> {
    let stats = backend.stats();
    println!(
        "fs_used={} fs_free={} total_records={} removed_records={}",
        stats.fs.used_bytes, stats.fs.free_bytes, stats.total_records, stats.removed_records
    );
    Ok(())
}

fn cmd_defrag(backend: &Backend, status_only: bool) -> Result<()> {
    let mut io = IoAttr::new(Key::ZERO);
    if status_only {
        io.flags |= CommandFlags::STATUS;
    }
    let ctl = blobcodec::DefragCtl::default();
    match dispatcher::dispatch(backend, CommandCode::Defrag, &mut io, &[], Some(&ctl), |_| Ok(()))? {
        Reply::DefragState(state) => {
            println!("defrag state: {state:?}");
            Ok(())
        }
        Reply::DefragStarted => {
            println!("defrag started");
            Ok(())
        }
        _ => Err(anyhow!("unexpected defrag reply")),
    }
}
