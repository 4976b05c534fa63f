//! Config Validation Binary
//!
//! Loads a config file the same way a run does and reports problems
//! before any site is contacted:
//! - Errors: anything that would abort a run
//! - Warnings: settings that are valid but probably not intended

use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;

use nurse_tracker::config::{load_config, AppConfig};
use nurse_tracker::types::PlatformType;

#[derive(Debug, Parser)]
#[command(name = "validate_config", about = "Validate a nurse_tracker config file")]
struct Cli {
    #[arg(default_value = "config.yaml")]
    config: PathBuf,
}

fn collect_warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut names = HashSet::new();

    if config.role.title_groups.is_empty() {
        warnings.push("role has no title groups; every title will match".to_string());
    }

    for source in &config.hospitals {
        if !names.insert(source.hospital.to_lowercase()) {
            warnings.push(format!("Hospital '{}' is listed more than once", source.hospital));
        }
        if !source.url.starts_with("http://") && !source.url.starts_with("https://") {
            warnings.push(format!(
                "Hospital '{}' has URL without http/https scheme: {}",
                source.hospital, source.url
            ));
        }
        if source.platform == PlatformType::Njoyn && !source.url.to_lowercase().contains("page=joblisting") {
            warnings.push(format!(
                "Hospital '{}' is njoyn but its URL is not a job listing page",
                source.hospital
            ));
        }
    }

    if config.scrape.use_browser && config.scrape.webdriver_url.trim().is_empty() {
        warnings.push("use_browser is on but webdriver_url is empty".to_string());
    }

    warnings
}

fn main() {
    let cli = Cli::parse();
    println!("=== Config Validator ===");

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            println!("\nERRORS (must fix):");
            println!("  - {:#}", e);
            std::process::exit(1);
        }
    };

    let warnings = collect_warnings(&config);
    if warnings.is_empty() {
        println!("All {} hospitals are valid", config.hospitals.len());
        return;
    }

    println!("\nWARNINGS:");
    for warning in &warnings {
        println!("  - {}", warning);
    }
}
