use std::fs;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use linelog::{Codec, Direction, LogDir, LogDirConfig};

#[derive(Parser)]
#[command(name = "linelog", version, about = "Rotating compressed line store tooling")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// JSON file with a LogDirConfig; flags below override its fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory levels above segment files
    #[arg(long, global = true)]
    subdirs: Option<usize>,

    /// Raw segment size that triggers sealing on the next append
    #[arg(long, global = true)]
    max_segment_bytes: Option<u64>,

    /// Codec for sealed segments (zstd, gzip, xz)
    #[arg(long, global = true)]
    codec: Option<Codec>,

    #[arg(long, global = true)]
    compression_level: Option<i32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Append lines given as arguments, or read from stdin when none are given
    Append { root: PathBuf, lines: Vec<String> },
    /// Print every line of the log
    Cat {
        root: PathBuf,
        #[arg(short, long)]
        reverse: bool,
    },
    /// List segment files
    Segments {
        root: PathBuf,
        #[arg(short, long)]
        reverse: bool,
    },
    /// Seal the current tail segment
    Seal { root: PathBuf },
    /// Print the id of the tail segment
    Tail { root: PathBuf },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let mut out = BufWriter::new(io::stdout());

    match cli.command {
        Commands::Append { root, lines } => {
            let mut log = open(&root, config)?;
            let mut appended = 0usize;
            if lines.is_empty() {
                for line in io::stdin().lock().lines() {
                    log.append(&line.context("read stdin")?)?;
                    appended += 1;
                }
            } else {
                for line in &lines {
                    log.append(line)?;
                    appended += 1;
                }
            }
            info!("appended {} lines to {}", appended, root.display());
        }
        Commands::Cat { root, reverse } => {
            let log = open(&root, config)?;
            for line in log.iter(direction(reverse)) {
                writeln!(out, "{}", line?)?;
            }
        }
        Commands::Segments { root, reverse } => {
            let log = open(&root, config)?;
            for location in log.segments(direction(reverse)) {
                let location = location?;
                writeln!(out, "{}\t{}", location.id(), location.path().display())?;
            }
        }
        Commands::Seal { root } => {
            let mut log = open(&root, config)?;
            if log.seal_tail()? {
                info!("sealed tail of {}", root.display());
            }
        }
        Commands::Tail { root } => {
            let log = open(&root, config)?;
            match log.tail()? {
                Some(id) => writeln!(out, "{id}")?,
                None => writeln!(out, "empty")?,
            }
        }
    }

    out.flush()?;
    Ok(())
}

fn load_config(args: &ConfigArgs) -> Result<LogDirConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))?
        }
        None => LogDirConfig::default(),
    };
    if let Some(subdirs) = args.subdirs {
        config.subdirs = subdirs;
    }
    if let Some(max) = args.max_segment_bytes {
        config.max_segment_bytes = max;
    }
    if let Some(codec) = args.codec {
        config.codec = codec;
    }
    if let Some(level) = args.compression_level {
        config.compression_level = level;
    }
    Ok(config)
}

fn open(root: &Path, config: LogDirConfig) -> Result<LogDir> {
    LogDir::open(root, config).with_context(|| format!("open log {}", root.display()))
}

fn direction(reverse: bool) -> Direction {
    if reverse {
        Direction::Reverse
    } else {
        Direction::Forward
    }
}
