//! Command-line front end for the package reader.
//!
//! Lists, tests and extracts entries of a document package. Damaged packages
//! can be read through the recovery scan with `-r` or `--fallback-recovery`.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use docpack::zip::crc32;
use docpack::{Cli, LocalFileReader, ReadAt, ReaderOptions, ZipEntry, ZipFile, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_filter());

    let reader = Arc::new(
        LocalFileReader::new(Path::new(&cli.file))
            .with_context(|| format!("cannot open {}", cli.file))?,
    );
    let options = ReaderOptions {
        force_recovery: cli.force_recovery,
        ..ReaderOptions::default()
    };
    let zip = if cli.fallback_recovery {
        ZipFile::open_or_recover(reader, options).await?
    } else {
        ZipFile::open(reader, options).await?
    };
    if zip.is_recovery_mode() && !cli.is_quiet() {
        eprintln!("{}: entry table rebuilt by recovery scan", cli.file);
    }

    process_zip(&zip, &cli).await
}

/// Dispatch to listing, testing or extraction.
async fn process_zip<R: ReadAt + 'static>(zip: &ZipFile<R>, cli: &Cli) -> Result<()> {
    if cli.list || cli.verbose {
        list_entries(zip, cli.verbose);
        return Ok(());
    }

    let selected: Vec<ZipEntry> = zip
        .entries()
        .into_iter()
        .filter(|e| !e.is_directory() && is_selected(e, cli))
        .collect();

    if cli.test {
        return test_entries(zip, &selected, cli).await;
    }

    let multiple = cli.pipe && selected.len() > 1;
    for entry in &selected {
        extract_entry(zip, entry, cli, multiple).await?;
    }
    Ok(())
}

/// Positional names pick entries, `-x` patterns drop them.
fn is_selected(entry: &ZipEntry, cli: &Cli) -> bool {
    if !cli.files.is_empty() {
        let matches = cli.files.iter().any(|f| {
            if has_glob_chars(f) {
                glob_match(f, &entry.path)
            } else {
                entry.path == *f || base_name(&entry.path) == *f
            }
        });
        if !matches {
            return false;
        }
    }
    !cli
        .exclude
        .iter()
        .any(|x| entry.path.contains(x.as_str()) || glob_match(x, &entry.path))
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

fn list_entries<R: ReadAt + 'static>(zip: &ZipFile<R>, verbose: bool) {
    let entries = zip.entries();

    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  {:>8}  Name",
            "Length", "Size", "Cmpr", "Date", "Time", "CRC-32"
        );
        println!("{}", "-".repeat(80));
    }

    let mut total_size = 0u64;
    let mut total_compressed = 0u64;
    let mut count = 0usize;

    for entry in &entries {
        if !verbose {
            println!("{}", entry.path);
            continue;
        }
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {:08x}  {}",
            entry.size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.size),
            year,
            month,
            day,
            hour,
            minute,
            entry.crc,
            entry.path
        );
        if !entry.is_directory() {
            total_size += entry.size;
            total_compressed += entry.compressed_size;
            count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(80));
        println!(
            "{:>10}  {:>10}  {}  {:>31}  {} files",
            total_size,
            total_compressed,
            ratio(total_compressed, total_size),
            "",
            count
        );
    }
}

/// Space saved as a percentage column.
fn ratio(compressed: u64, size: u64) -> String {
    if size > 0 && compressed <= size {
        format!("{:>4}%", 100 - (compressed * 100 / size))
    } else {
        "  0%".to_string()
    }
}

/// Decode every selected entry and compare its CRC with the stored one.
async fn test_entries<R: ReadAt + 'static>(
    zip: &ZipFile<R>,
    entries: &[ZipEntry],
    cli: &Cli,
) -> Result<()> {
    let mut failed = 0usize;
    for entry in entries {
        let verdict = match read_entry(zip, entry).await {
            Ok(data) if crc32(&data) == entry.crc => "OK".to_string(),
            Ok(data) => {
                warn!(path = %entry.path, expected = entry.crc, actual = crc32(&data), "crc mismatch");
                format!("bad CRC {:08x} (should be {:08x})", crc32(&data), entry.crc)
            }
            Err(e) => format!("error: {e}"),
        };
        if verdict != "OK" {
            failed += 1;
        }
        if !cli.is_quiet() || verdict != "OK" {
            println!("    testing: {:<40} {}", entry.path, verdict);
        }
    }

    if failed > 0 {
        bail!("{} of {} entries failed in {}", failed, entries.len(), cli.file);
    }
    if !cli.is_very_quiet() {
        println!("No errors detected in {} ({} entries)", cli.file, entries.len());
    }
    Ok(())
}

async fn read_entry<R: ReadAt + 'static>(zip: &ZipFile<R>, entry: &ZipEntry) -> Result<Vec<u8>> {
    let mut stream = zip.get_input_stream(&entry.path, None, false).await?;
    Ok(stream.read_to_end().await?)
}

/// Extract one entry to stdout or below the output directory.
async fn extract_entry<R: ReadAt + 'static>(
    zip: &ZipFile<R>,
    entry: &ZipEntry,
    cli: &Cli,
    show_name: bool,
) -> Result<()> {
    if cli.pipe {
        let data = read_entry(zip, entry).await?;
        let mut stdout = tokio::io::stdout();
        if show_name {
            stdout
                .write_all(format!("--- {} ---\n", entry.path).as_bytes())
                .await?;
        }
        stdout.write_all(&data).await?;
        stdout.flush().await?;
        return Ok(());
    }

    let file_name = if cli.junk_paths {
        base_name(&entry.path)
    } else {
        entry.path.clone()
    };
    let output_path = match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(&file_name),
        None => PathBuf::from(&file_name),
    };

    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.path);
            }
            return Ok(());
        }
        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.path);
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.path);
    }

    let data = read_entry(zip, entry).await?;
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&output_path, &data)
        .await
        .with_context(|| format!("cannot write {}", output_path.display()))?;
    info!(path = %entry.path, bytes = data.len(), "extracted");
    Ok(())
}

fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// `*` matches any run, `?` one character.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if p == t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    do_match(&pattern, &text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.xml", "content.xml"));
        assert!(glob_match("Pictures/*.png", "Pictures/a.png"));
        assert!(glob_match("file?.dat", "file1.dat"));
        assert!(!glob_match("*.xml", "mimetype"));
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(25, 100), "  75%");
        assert_eq!(ratio(0, 0), "  0%");
        assert_eq!(ratio(120, 100), "  0%");
    }
}
