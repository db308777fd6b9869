//! vroot CLI - Inspect how a vroot session sees the filesystem
//!
//! Usage:
//!   vroot clean '/a/./b/../c'                  # Canonicalize only
//!   vroot -c vroot.json resolve /pub/readme    # Virtual path to real path
//!   vroot -c vroot.json ls /                   # Listing with alias overlay
//!   vroot -c vroot.json stat /pub
//!   vroot -c vroot.json aliases                # Dump the alias table
//!
//! A config with a `server_root` performs a real chroot(2) and needs the
//! matching privileges.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;
use vroot::{DirEntry, LookupFlags, Metadata, StdFs, VrootConfig, VrootFs};

/// vroot - Virtual chroot path engine
#[derive(Parser, Debug)]
#[command(name = "vroot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Virtual working directory for relative paths
    #[arg(long, global = true)]
    cwd: Option<String>,

    /// Log filter, e.g. "debug" or "vroot::path=trace" (default: RUST_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Canonicalize paths without resolving them
    Clean {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Resolve virtual paths to real paths
    Resolve {
        /// Do not follow aliases
        #[arg(long)]
        no_alias: bool,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// List a virtual directory, alias entries included
    Ls {
        #[arg(default_value = ".")]
        dir: String,
    },
    /// Show metadata of a virtual path
    Stat {
        path: String,
        /// Do not follow a final symlink (subject to allow_symlinks)
        #[arg(long)]
        lstat: bool,
    },
    /// Dump the configured aliases
    Aliases,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log.as_deref())?;

    match &args.command {
        Command::Clean { paths } => {
            let rows: Vec<Value> = paths
                .iter()
                .map(|path| json!({ "path": path, "clean": vroot::clean(path) }))
                .collect();
            emit(&args, rows, |row| {
                row["clean"].as_str().unwrap_or_default().to_string()
            })
        }
        Command::Resolve { no_alias, paths } => {
            let fs = session(&args)?;
            let flags = if *no_alias {
                LookupFlags::NO_ALIAS
            } else {
                LookupFlags::NONE
            };
            let mut rows = Vec::with_capacity(paths.len());
            for path in paths {
                let anchored = fs.resolver().realpath(path, true);
                let resolved = fs
                    .resolver()
                    .lookup(&anchored, flags)
                    .with_context(|| format!("failed to resolve {path}"))?;
                rows.push(json!({
                    "path": path,
                    "real": resolved.real,
                    "alias": resolved.alias,
                }));
            }
            emit(&args, rows, |row| match row["alias"].as_str() {
                Some(alias) => format!(
                    "{} -> {} (alias {})",
                    row["path"].as_str().unwrap_or_default(),
                    row["real"].as_str().unwrap_or_default(),
                    alias
                ),
                None => format!(
                    "{} -> {}",
                    row["path"].as_str().unwrap_or_default(),
                    row["real"].as_str().unwrap_or_default()
                ),
            })
        }
        Command::Ls { dir } => {
            let mut fs = session(&args)?;
            let entries = fs
                .read_dir(dir)
                .with_context(|| format!("failed to list {dir}"))?;
            let rows = entries.iter().map(entry_json).collect();
            emit(&args, rows, |row| {
                let name = row["name"].as_str().unwrap_or_default();
                if row["alias"].as_bool().unwrap_or(false) {
                    format!("{name}\t(alias)")
                } else {
                    name.to_string()
                }
            })
        }
        Command::Stat { path, lstat } => {
            let fs = session(&args)?;
            let meta = if *lstat { fs.lstat(path) } else { fs.stat(path) }
                .with_context(|| format!("failed to stat {path}"))?;
            emit(&args, vec![meta_json(path, &meta)], |row| {
                format!(
                    "{}: {} size={} mode={:o} uid={} gid={} mtime={}",
                    path,
                    row["type"].as_str().unwrap_or_default(),
                    row["size"],
                    row["mode"].as_u64().unwrap_or_default(),
                    row["uid"],
                    row["gid"],
                    row["mtime"]
                )
            })
        }
        Command::Aliases => {
            let fs = session(&args)?;
            let mut pairs = Vec::new();
            fs.resolver().aliases().for_each(|alias, real| {
                pairs.push((alias.to_string(), real.to_string()));
                ControlFlow::Continue(())
            });
            pairs.sort();
            let rows = pairs
                .into_iter()
                .map(|(alias, real)| json!({ "alias": alias, "real": real }))
                .collect();
            emit(&args, rows, |row| {
                format!(
                    "{} -> {}",
                    row["alias"].as_str().unwrap_or_default(),
                    row["real"].as_str().unwrap_or_default()
                )
            })
        }
    }
}

fn init_logging(filter: Option<&str>) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = match filter {
        Some(filter) => EnvFilter::try_new(filter).context("invalid --log filter")?,
        None => match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            // Quiet unless asked
            Err(_) => return Ok(()),
        },
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Build the session from `--config` (an empty config when absent).
fn session(args: &Args) -> Result<VrootFs> {
    let config = match &args.config {
        Some(path) => VrootConfig::from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => VrootConfig::default(),
    };
    let (mut fs, report) = VrootFs::from_config(StdFs::new(), &config)
        .context("failed to set up vroot session")?;
    if report.skipped > 0 {
        eprintln!(
            "vroot: {} alias(es) skipped, run with --log warn for details",
            report.skipped
        );
    }
    if let Some(cwd) = &args.cwd {
        fs.chdir(cwd)
            .with_context(|| format!("failed to change directory to {cwd}"))?;
    }
    Ok(fs)
}

fn entry_json(entry: &DirEntry) -> Value {
    let kind = match entry.file_type {
        Some(ft) if ft.is_dir() => "directory",
        Some(ft) if ft.is_file() => "file",
        Some(ft) if ft.is_symlink() => "symlink",
        Some(_) => "other",
        None => "unknown",
    };
    json!({ "name": entry.name, "type": kind, "alias": entry.aliased })
}

fn meta_json(path: &str, meta: &Metadata) -> Value {
    let kind = if meta.file_type.is_dir() {
        "directory"
    } else if meta.file_type.is_file() {
        "file"
    } else if meta.file_type.is_symlink() {
        "symlink"
    } else {
        "other"
    };
    let mtime = meta
        .modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    json!({
        "path": path,
        "type": kind,
        "size": meta.size,
        "mode": meta.mode,
        "uid": meta.uid,
        "gid": meta.gid,
        "mtime": mtime,
    })
}

/// Print rows as a JSON array or one text line each.
fn emit(args: &Args, rows: Vec<Value>, text: impl Fn(&Value) -> String) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for row in &rows {
            println!("{}", text(row));
        }
    }
    Ok(())
}
