//! gzindex CLI
//!
//! Command-line interface for gzindex operations:
//! - Build an index over a gzip/zlib-compressed text file
//! - Fetch lines by number
//! - Look up lines by key in a named index
//! - Inspect index metadata

use clap::{Parser, Subcommand};
use gzindex::{
    BuildConfig, Config, ExternalIndexer, FieldIndexer, IndexBuilder, IndexReader, IndexResult,
    LineSink, RegexIndexer,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gzindex")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Random-access line index for gzip-compressed text files")]
#[command(
    long_about = "gzindex builds a one-file index over a gzip- or zlib-compressed text file,\nthen serves arbitrary lines and key lookups without decompressing from the start."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Index file path (default: <FILE>.gzidx)
    #[arg(long, global = true)]
    index_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index over a compressed file
    Build {
        /// The gzip- or zlib-compressed input file
        file: PathBuf,
        /// TOML config file with build tunables
        #[arg(long)]
        config: Option<PathBuf>,
        /// Uncompressed bytes between access points
        #[arg(long)]
        index_every: Option<u64>,
        /// Leading lines to exclude from key extraction (header rows)
        #[arg(long)]
        skip_first: Option<u64>,
        /// Name of the created key index
        #[arg(long, default_value = "default")]
        name: String,
        /// Index the Nth field of each line (1-based)
        #[arg(long)]
        field: Option<usize>,
        /// Field separator for --field and --command responses
        #[arg(long, default_value = "\t")]
        separator: String,
        /// Index every match of a regex (capture group 1 if present)
        #[arg(long)]
        regex: Option<String>,
        /// Ask an external command for each line's keys
        #[arg(long)]
        command: Option<String>,
        /// Parse keys as signed integers
        #[arg(long)]
        numeric: bool,
        /// Reject duplicate keys
        #[arg(long)]
        unique: bool,
    },

    /// Print lines by number
    Line {
        /// The compressed file the index was built over
        file: PathBuf,
        /// Line numbers (1-based)
        #[arg(required = true)]
        lines: Vec<u64>,
        /// Ignore compressed-file size/mtime drift
        #[arg(long)]
        force: bool,
    },

    /// Print the lines matching keys in a named index
    Query {
        /// The compressed file the index was built over
        file: PathBuf,
        /// Index name
        index: String,
        /// Keys to look up
        #[arg(required = true)]
        keys: Vec<String>,
        /// Ignore compressed-file size/mtime drift
        #[arg(long)]
        force: bool,
    },

    /// Show index metadata and per-index sizes
    Info {
        /// The compressed file the index was built over
        file: PathBuf,
        /// Ignore compressed-file size/mtime drift
        #[arg(long)]
        force: bool,
    },
}

/// Writes each fetched line to stdout.
struct PrintSink {
    out: std::io::Stdout,
}

impl LineSink for PrintSink {
    fn on_line(&mut self, _line: u64, _offset: u64, bytes: &[u8]) -> IndexResult<()> {
        let mut out = self.out.lock();
        out.write_all(bytes)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gzindex=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("gzindex: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Build {
            file,
            config,
            index_every,
            skip_first,
            name,
            field,
            separator,
            regex,
            command,
            numeric,
            unique,
        } => {
            let mut build_config = match config {
                Some(path) => Config::load(&path)?.build,
                None => BuildConfig::default(),
            };
            if let Some(bytes) = index_every {
                build_config.index_every = bytes;
            }
            if let Some(lines) = skip_first {
                build_config.skip_first = lines;
            }

            let index_path = index_path_for(&file, &cli.index_file);
            let mut builder = IndexBuilder::new(&file, &index_path, build_config)?;

            let chosen = [field.is_some(), regex.is_some(), command.is_some()]
                .iter()
                .filter(|&&set| set)
                .count();
            if chosen > 1 {
                return Err("choose at most one of --field, --regex, --command".into());
            }

            if let Some(n) = field {
                let sep = parse_separator(&separator)?;
                builder.add_indexer(
                    &name,
                    &format!("field {} separated by '{}'", n, separator),
                    numeric,
                    unique,
                    Box::new(FieldIndexer::new(sep, n)),
                )?;
            } else if let Some(pattern) = regex {
                builder.add_indexer(
                    &name,
                    &format!("regex '{}'", pattern),
                    numeric,
                    unique,
                    Box::new(RegexIndexer::new(&pattern)?),
                )?;
            } else if let Some(cmd) = command {
                let sep = parse_separator(&separator)?;
                builder.add_indexer(
                    &name,
                    &format!("command '{}'", cmd),
                    numeric,
                    unique,
                    Box::new(ExternalIndexer::new(&cmd, sep)?),
                )?;
            }

            builder.build()?;
            println!("Indexed {:?} -> {:?}", file, index_path);
        }

        Commands::Line { file, lines, force } => {
            let index_path = index_path_for(&file, &cli.index_file);
            let mut reader = IndexReader::open(&file, &index_path, force)?;
            let mut sink = PrintSink {
                out: std::io::stdout(),
            };
            reader.get_lines(&lines, &mut sink)?;
        }

        Commands::Query {
            file,
            index,
            keys,
            force,
        } => {
            let index_path = index_path_for(&file, &cli.index_file);
            let mut reader = IndexReader::open(&file, &index_path, force)?;
            let mut sink = PrintSink {
                out: std::io::stdout(),
            };
            for key in keys {
                let lines = reader.query_index(&index, &key)?;
                reader.get_lines(&lines, &mut sink)?;
            }
        }

        Commands::Info { file, force } => {
            let index_path = index_path_for(&file, &cli.index_file);
            let reader = IndexReader::open(&file, &index_path, force)?;

            println!("Index: {:?}", index_path);
            let meta = reader.metadata();
            let mut keys: Vec<&String> = meta.keys().collect();
            keys.sort();
            for key in keys {
                println!("  {} = {}", key, meta[key]);
            }
            if let Some(dt) = meta
                .get("compressedModTime")
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            {
                println!("  source modified {}", dt.format("%Y-%m-%d %H:%M:%S UTC"));
            }

            let indexes = reader.indexes()?;
            if indexes.is_empty() {
                println!("No key indexes.");
            } else {
                println!("{:<16} {:<8} {:<10} {}", "Name", "Kind", "Rows", "Created as");
                println!("{}", "-".repeat(60));
                for info in indexes {
                    let kind = if info.numeric { "numeric" } else { "alpha" };
                    println!(
                        "{:<16} {:<8} {:<10} {}",
                        info.name,
                        kind,
                        reader.index_size(&info.name)?,
                        info.creation
                    );
                }
            }
        }
    }

    Ok(())
}

fn index_path_for(file: &Path, explicit: &Option<PathBuf>) -> PathBuf {
    match explicit {
        Some(path) => path.clone(),
        None => {
            let mut name = file.as_os_str().to_os_string();
            name.push(".gzidx");
            PathBuf::from(name)
        }
    }
}

fn parse_separator(s: &str) -> Result<u8, Box<dyn std::error::Error>> {
    match s.as_bytes() {
        [b] => Ok(*b),
        _ => Err(format!("separator must be a single byte, got '{}'", s).into()),
    }
}
