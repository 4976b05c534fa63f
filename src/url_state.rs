//! URL State Module
//!
//! Flat-file "seen URL" set plus in-run deduplication:
//! - Dedup postings by trimmed URL (first occurrence wins, order kept)
//! - Read/write the persisted seen set as a sorted JSON array
//! - Split a run's postings into new vs previously notified

use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use crate::types::JobPosting;

/// Remove duplicate URLs, keeping the first occurrence of each.
pub fn dedupe_by_url(postings: Vec<JobPosting>) -> Vec<JobPosting> {
    let mut seen: HashSet<String> = HashSet::new();
    postings
        .into_iter()
        .filter(|p| seen.insert(p.url_key().to_string()))
        .collect()
}

/// Load the seen set. A missing or malformed file reads as empty.
pub fn read_seen_urls(path: &Path) -> HashSet<String> {
    let Ok(content) = fs::read_to_string(path) else {
        return HashSet::new();
    };

    match serde_json::from_str::<Vec<serde_json::Value>>(&content) {
        Ok(values) => values
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
        Err(e) => {
            log::warn!("Ignoring unreadable seen-URL file {:?}: {}", path, e);
            HashSet::new()
        }
    }
}

/// Persist the seen set as a sorted, de-duplicated JSON array.
pub fn write_seen_urls<'a, I>(path: &Path, urls: I) -> Result<()>
where
    I: IntoIterator<Item = &'a String>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create state directory {:?}", parent))?;
    }

    let sorted: BTreeSet<&str> = urls
        .into_iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .collect();

    let json = serde_json::to_string_pretty(&sorted)?;
    fs::write(path, json).with_context(|| format!("Failed to write seen URLs to {:?}", path))?;
    Ok(())
}

/// Postings whose URL is not in the seen set, in input order.
pub fn partition_new(postings: &[JobPosting], seen: &HashSet<String>) -> Vec<JobPosting> {
    postings
        .iter()
        .filter(|p| !seen.contains(p.url_key()))
        .cloned()
        .collect()
}

/// The seen set after committing this run's matches.
pub fn merge_seen(seen: &HashSet<String>, postings: &[JobPosting]) -> HashSet<String> {
    let mut merged = seen.clone();
    merged.extend(postings.iter().map(|p| p.url_key().to_string()));
    merged
}
