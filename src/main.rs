//! Main entry point for the razip CLI application.
//!
//! Lists, tests and extracts ZIP archives from the local filesystem or from
//! HTTP URLs, reading only the byte ranges each operation needs.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use razip::{Archive, ArchiveOptions, Cli, Entry, HttpRangeReader, LocalFile, Storage};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.is_http_url() {
        let reader = Arc::new(HttpRangeReader::new(cli.file.clone())?);
        let archive = Archive::open(Arc::clone(&reader), ArchiveOptions::default())?;
        process_zip(&archive, &cli)?;
        archive.dispose()?;

        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {}",
                format_size(reader.transferred_bytes())
            );
        }
    } else {
        let archive = Archive::open_path(&cli.file, ArchiveOptions::default())
            .with_context(|| format!("cannot open {}", cli.file))?;
        process_zip(&archive, &cli)?;
        archive.dispose()?;
    }

    Ok(())
}

/// Dispatch to listing, testing or extraction.
fn process_zip<S: Storage>(archive: &Archive<S>, cli: &Cli) -> Result<()> {
    let mut entries = Vec::new();
    for entry in archive.entries()? {
        if cli.selects(entry.full_name()?) {
            entries.push(entry);
        }
    }

    if cli.list || cli.verbose {
        return list_entries(&entries, cli.verbose);
    }
    if cli.test {
        return test_entries(&entries, cli);
    }

    for entry in &entries {
        if !entry.is_directory()? {
            extract_entry(entry, cli)?;
        }
    }
    Ok(())
}

fn list_entries<S: Storage>(entries: &[Entry<S>], verbose: bool) -> Result<()> {
    if !verbose {
        for entry in entries {
            println!("{}", entry.full_name()?);
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>16}  {:>3}  Name",
        "Length", "Size", "Cmpr", "Modified", "Enc"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        let length = entry.length()?;
        let compressed = entry.compressed_length()?;
        println!(
            "{:>10}  {:>10}  {}  {}  {:>3}  {}",
            length,
            compressed,
            ratio(compressed, length),
            entry.last_modified()?.format("%Y-%m-%d %H:%M"),
            if entry.is_encrypted()? { "*" } else { "" },
            entry.full_name()?
        );

        if !entry.is_directory()? {
            total_uncompressed += length;
            total_compressed += compressed;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );
    Ok(())
}

/// Decode every entry, letting the stream verify CRC-32.
fn test_entries<S: Storage>(entries: &[Entry<S>], cli: &Cli) -> Result<()> {
    let mut failures = 0usize;
    for entry in entries {
        if entry.is_directory()? {
            continue;
        }
        let name = entry.full_name()?;
        let outcome = entry
            .open()
            .map_err(anyhow::Error::from)
            .and_then(|mut stream| Ok(io::copy(&mut stream, &mut io::sink())?));
        match outcome {
            Ok(_) if !cli.is_quiet() => println!("    testing: {:<40} OK", name),
            Ok(_) => {}
            Err(e) => {
                failures += 1;
                eprintln!("    testing: {:<40} FAILED ({})", name, e);
            }
        }
    }

    if failures > 0 {
        bail!("{} entries failed the integrity test", failures);
    }
    if !cli.is_quiet() {
        println!("No errors detected in {}.", cli.file);
    }
    Ok(())
}

fn extract_entry<S: Storage>(entry: &Entry<S>, cli: &Cli) -> Result<()> {
    if cli.pipe {
        let mut stream = entry.open()?;
        io::copy(&mut stream, &mut io::stdout().lock())?;
        return Ok(());
    }

    let name = entry.full_name()?;
    let output_path = output_path(entry, cli)?;
    if output_path.exists() {
        if let Some(reason) = cli.skip_existing() {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} ({})", name, reason);
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", name);
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut content = Vec::new();
    entry
        .open()?
        .read_to_end(&mut content)
        .with_context(|| format!("failed to read {}", name))?;
    fs::write(&output_path, content)?;
    Ok(())
}

/// Destination on disk, refusing names that would escape the target.
fn output_path<S: Storage>(entry: &Entry<S>, cli: &Cli) -> Result<PathBuf> {
    let relative: PathBuf = if cli.junk_paths {
        PathBuf::from(entry.name()?)
    } else {
        Path::new(entry.full_name()?)
            .components()
            .filter(|c| matches!(c, std::path::Component::Normal(_)))
            .collect()
    };

    Ok(match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(relative),
        None => relative,
    })
}

fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed == 0 || compressed >= uncompressed {
        return "  0%".to_string();
    }
    format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
