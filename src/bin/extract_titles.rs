//! Print the `job_title` values of a raw scrape dump as a JSON array.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use nurse_tracker::storage::extract_titles;

#[derive(Debug, Parser)]
#[command(name = "extract_titles", about = "Extract job_title fields from raw_scraped.json")]
struct Cli {
    #[arg(default_value = "output/raw_scraped.json")]
    input: PathBuf,

    /// Write the array here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let content = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read {:?}", cli.input))?;
    let data: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON in {:?}", cli.input))?;

    let titles = extract_titles(&data).with_context(|| format!("Unexpected content in {:?}", cli.input))?;
    let json = serde_json::to_string_pretty(&titles)?;

    match cli.out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, format!("{}\n", json)).with_context(|| format!("Failed to write {:?}", path))?;
        }
        None => println!("{}", json),
    }
    Ok(())
}
