//! Kalandra CLI - Command-line tool for game asset archives.
//!
//! This is the main entry point for the Kalandra command-line application.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use glob::{MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use kalandra::prelude::*;

/// Kalandra - game asset archive tool
#[derive(Parser)]
#[command(name = "kalandra")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ArchiveArgs {
    /// Directory holding the index and bundle files
    #[arg(short, long, env = "KALANDRA_ROOT")]
    root: PathBuf,

    /// Chunk codec used by the bundles
    #[arg(long, value_enum, default_value_t = Codec::Zstd)]
    codec: Codec,
}

#[derive(Clone, Copy, ValueEnum)]
enum Codec {
    Zstd,
    Deflate,
}

#[derive(Subcommand)]
enum Commands {
    /// List files in an archive
    List {
        #[command(flatten)]
        archive: ArchiveArgs,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show bundle, offset and size
        #[arg(short, long)]
        detailed: bool,
    },

    /// Extract files from an archive
    Extract {
        #[command(flatten)]
        archive: ArchiveArgs,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Print every path in the index catalog
    Catalog {
        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Decode a dat file to JSON
    Dat {
        #[command(flatten)]
        archive: ArchiveArgs,

        /// Schema JSON file
        #[arg(short, long, env = "KALANDRA_SCHEMA")]
        schema: PathBuf,

        /// Archive path of the dat file
        #[arg(long)]
        file: String,

        /// Output JSON file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::List {
            archive,
            filter,
            detailed,
        } => {
            cmd_list(&archive, filter.as_deref(), detailed)?;
        }
        Commands::Extract {
            archive,
            output,
            filter,
        } => {
            cmd_extract(&archive, &output, filter.as_deref())?;
        }
        Commands::Catalog { archive } => {
            cmd_catalog(&archive)?;
        }
        Commands::Dat {
            archive,
            schema,
            file,
            output,
        } => {
            cmd_dat(&archive, &schema, &file, output.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_archive(args: &ArchiveArgs) -> Result<Archive> {
    let decompressor: Arc<dyn Decompressor> = match args.codec {
        Codec::Zstd => Arc::new(ZstdDecompressor),
        Codec::Deflate => Arc::new(DeflateDecompressor),
    };

    let start = Instant::now();
    let archive = Archive::open(&args.root, decompressor)
        .with_context(|| format!("Failed to open archive at {}", args.root.display()))?;

    tracing::info!(
        files = archive.file_count(),
        bundles = archive.containers().len(),
        elapsed = ?start.elapsed(),
        "archive loaded"
    );
    Ok(archive)
}

fn filter_pattern(filter: Option<&str>) -> Result<Option<Pattern>> {
    filter
        .map(|p| Pattern::new(p).with_context(|| format!("Invalid filter pattern '{}'", p)))
        .transpose()
}

fn matches(pattern: Option<&Pattern>, path: &str) -> bool {
    const OPTIONS: MatchOptions = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    pattern.map_or(true, |p| p.matches_with(path, OPTIONS))
}

fn cmd_list(args: &ArchiveArgs, filter: Option<&str>, detailed: bool) -> Result<()> {
    let archive = open_archive(args)?;
    let pattern = filter_pattern(filter)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let mut count = 0;
    for handle in archive.files().filter(|h| matches(pattern.as_ref(), h.path())) {
        if detailed {
            let bundle = archive.container(handle)?.name();
            writeln!(
                out,
                "{:>12} {:>12} {:<32} {}",
                handle.size(),
                handle.offset(),
                bundle,
                handle.path()
            )?;
        } else {
            writeln!(out, "{}", handle.path())?;
        }
        count += 1;
    }
    out.flush()?;

    eprintln!("{} of {} files", count, archive.file_count());
    Ok(())
}

fn cmd_extract(args: &ArchiveArgs, output: &Path, filter: Option<&str>) -> Result<()> {
    let archive = open_archive(args)?;
    let pattern = filter_pattern(filter)?;

    let handles: Vec<&FileHandle> = archive
        .files()
        .filter(|h| matches(pattern.as_ref(), h.path()))
        .collect();

    println!("Extracting {} files...", handles.len());

    let pb = ProgressBar::new(handles.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    fs::create_dir_all(output)?;

    let start = Instant::now();
    handles.par_iter().try_for_each(|handle| -> Result<()> {
        let output_path = output.join(handle.path());
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = archive
            .read(handle)
            .with_context(|| format!("Failed to read {}", handle.path()))?;
        fs::write(&output_path, data)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;

        pb.inc(1);
        Ok(())
    })?;

    pb.finish_with_message("Done");
    println!("Extraction completed in {:?}", start.elapsed());

    Ok(())
}

fn cmd_catalog(args: &ArchiveArgs) -> Result<()> {
    let archive = open_archive(args)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for path in archive.index().catalog() {
        writeln!(out, "{}", path)?;
    }
    out.flush()?;

    Ok(())
}

fn cmd_dat(args: &ArchiveArgs, schema_path: &Path, file: &str, output: Option<&Path>) -> Result<()> {
    let archive = open_archive(args)?;

    let decoder = RecordDecoder::new();
    let json = fs::read_to_string(schema_path)
        .with_context(|| format!("Failed to read schema {}", schema_path.display()))?;
    let schemas =
        SchemaSet::from_json(&json, decoder.registry()).context("Failed to load schema")?;

    let handle = archive
        .find(file)
        .with_context(|| format!("File not found in archive: {}", file))?;

    let start = Instant::now();
    let dat = kalandra::decode_dat(&archive, handle, &schemas, &decoder)
        .with_context(|| format!("Failed to decode {}", handle.path()))?;

    eprintln!(
        "Decoded {} rows (stride {}) in {:?}",
        dat.row_count,
        dat.stride,
        start.elapsed()
    );

    match output {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &dat.records)?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut out, &dat.records)?;
            writeln!(out)?;
        }
    }

    Ok(())
}
