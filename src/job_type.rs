//! Employment-type inference from posting titles.
//!
//! Many boards put the employment basis in the title ("Part Time", "PTT",
//! "Temporary") while the structured fields are missing or hard-coded, so
//! the title wins whenever it carries a signal.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PTT: Regex = Regex::new(r"\bptt\b").unwrap();
    static ref FTT: Regex = Regex::new(r"\bftt\b").unwrap();
    static ref PT: Regex = Regex::new(r"\bpt\b").unwrap();
    static ref TEMP: Regex = Regex::new(r"\btemp\b").unwrap();
}

/// Derive a normalized employment label from `job_title`, falling back to
/// `current_job_type` (or "Unknown") when the title carries no signal.
pub fn infer_job_type(job_title: &str, current_job_type: &str) -> String {
    let title = job_title.trim();
    let current = match current_job_type.trim() {
        "" => "Unknown",
        c => c,
    };

    if title.is_empty() {
        return current.to_string();
    }

    let lower = title.to_lowercase();
    let parts: Vec<&str> = [time_basis(&lower), status(&lower)].into_iter().flatten().collect();

    if parts.is_empty() {
        current.to_string()
    } else {
        parts.join(" ")
    }
}

fn time_basis(lower: &str) -> Option<&'static str> {
    if PTT.is_match(lower) {
        Some("Part-Time")
    } else if FTT.is_match(lower) {
        Some("Full-Time")
    } else if PT.is_match(lower) && lower.contains("part time") {
        Some("Part-Time")
    } else if lower.contains("part time") || lower.contains("part-time") {
        Some("Part-Time")
    } else if lower.contains("full time") || lower.contains("full-time") {
        Some("Full-Time")
    } else {
        None
    }
}

fn status(lower: &str) -> Option<&'static str> {
    if lower.contains("casual") {
        Some("Casual")
    } else if lower.contains("contract") {
        Some("Contract")
    } else if lower.contains("temporary") || TEMP.is_match(lower) {
        Some("Temporary")
    } else if lower.contains("permanent") {
        Some("Permanent")
    } else {
        None
    }
}
