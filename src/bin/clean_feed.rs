use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use itertools::Itertools;
use log::info;

/// Scrub a feed directory in place: drop CSV columns whose every value is
/// blank (empty after trimming, or a literal `nan`).
#[derive(Parser)]
struct CleanArgs {
    /// Directory of CSV tables to scrub.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

fn is_blank(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan")
}

fn clean_table(path: &Path) -> Result<(), anyhow::Error> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let records: Vec<StringRecord> = reader.records().collect::<Result<_, _>>()?;

    let kept: Vec<usize> = (0..headers.len())
        .filter(|&column| {
            records
                .iter()
                .any(|record| !is_blank(record.get(column).unwrap_or("")))
        })
        .collect();
    if kept.len() == headers.len() {
        return Ok(());
    }
    let dropped = (0..headers.len())
        .filter(|column| !kept.contains(column))
        .map(|column| headers.get(column).unwrap_or(""))
        .join(", ");

    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(kept.iter().map(|&column| headers.get(column).unwrap_or("")))?;
    for record in &records {
        writer.write_record(kept.iter().map(|&column| record.get(column).unwrap_or("")))?;
    }
    writer.flush()?;
    info!("{}: dropped columns: {}", path.display(), dropped);
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let args = CleanArgs::parse();

    for entry in fs::read_dir(&args.data_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|extension| extension.to_str()) == Some("csv") {
            clean_table(&path)?;
        }
    }
    Ok(())
}
