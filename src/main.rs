//! Main entry point for the zipread CLI application.
//!
//! This binary provides a command-line interface for listing and
//! extracting local ZIP files.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;

use zipread::{Cli, ExtractOptions, ZipArchive};

/// Application entry point.
///
/// Parses command-line arguments, sets up logging, indexes the archive and
/// dispatches to listing, piping or extraction.
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so piped entry data stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut archive = ZipArchive::open(&cli.file);
    archive
        .build_index()
        .with_context(|| format!("cannot index {}", cli.file))?;

    if cli.list || cli.verbose {
        list_files(&archive, cli.verbose);
        return Ok(());
    }

    if cli.pipe {
        return pipe_entries(&archive, &cli.entries);
    }

    extract_all(&archive, &cli)
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Table with sizes, compression ratio, method
///   and recorded permissions
fn list_files(archive: &ZipArchive, verbose: bool) {
    if !verbose {
        for entry in archive.entries() {
            println!("{}", entry.name());
        }
        return;
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:<8}  {:>4}  Name",
        "Length", "Size", "Cmpr", "Method", "Mode"
    );
    println!("{}", "-".repeat(60));

    // Track totals for summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in archive.entries() {
        let mode = match entry.unix_mode() {
            0 => "-".to_string(),
            m => format!("{m:o}"),
        };
        println!(
            "{:>10}  {:>10}  {}  {:<8}  {:>4}  {}",
            entry.uncompressed_size(),
            entry.compressed_size(),
            ratio(entry.compressed_size(), entry.uncompressed_size()),
            entry.compression_method().to_string(),
            mode,
            entry.name()
        );

        // Accumulate totals (excluding directories)
        if !entry.is_dir() {
            total_uncompressed += entry.uncompressed_size();
            total_compressed += entry.compressed_size();
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(60));
    println!(
        "{:>10}  {:>10}  {}  {:>14}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );
}

/// Compression ratio as percentage saved.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Write the named entries (or every file entry) to stdout.
fn pipe_entries(archive: &ZipArchive, names: &[String]) -> Result<()> {
    let selected: Vec<usize> = archive
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_dir())
        .filter(|(_, e)| names.is_empty() || names.iter().any(|n| n.as_bytes() == e.name_bytes()))
        .map(|(i, _)| i)
        .collect();

    if selected.is_empty() && !names.is_empty() {
        bail!("no matching entries in {}", archive.path().display());
    }

    let mut stdout = std::io::stdout().lock();
    for index in selected {
        let data = archive.extract_to_memory(index).with_context(|| {
            let name = archive.entry(index).map(|e| e.name().into_owned());
            format!("cannot extract {}", name.unwrap_or_default())
        })?;
        stdout.write_all(&data)?;
    }
    stdout.flush()?;

    Ok(())
}

/// Extract the whole archive below the `-d` directory.
fn extract_all(archive: &ZipArchive, cli: &Cli) -> Result<()> {
    let quiet = cli.is_quiet();
    let options = ExtractOptions::new()
        .continue_on_error(cli.keep_going)
        .on_entry(|_, entry| {
            // Display extraction progress
            if !quiet {
                let action = if entry.is_dir() { "creating" } else { "extracting" };
                println!("  {action}: {}", entry.name());
            }
            true
        });

    archive
        .extract_all_with(Path::new(&cli.extract_dir), &options)
        .with_context(|| format!("extraction into {} failed", cli.extract_dir))?;

    Ok(())
}
