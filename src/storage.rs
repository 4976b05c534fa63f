use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::types::{JobPosting, RunReport};

const CSV_HEADER: [&str; 6] = ["hospital", "job_title", "location", "url", "date_posted", "job_type"];

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }
    Ok(())
}

/// Stable output order: hospital, then title (case-insensitive), then url.
pub fn sort_postings(postings: &mut [JobPosting]) {
    postings.sort_by(|a, b| {
        a.hospital
            .to_lowercase()
            .cmp(&b.hospital.to_lowercase())
            .then_with(|| a.job_title.to_lowercase().cmp(&b.job_title.to_lowercase()))
            .then_with(|| a.url.cmp(&b.url))
    });
}

pub fn write_postings_json(path: &Path, postings: &[JobPosting]) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(postings)?;
    fs::write(path, json).with_context(|| format!("Failed to write postings to {:?}", path))?;
    Ok(())
}

/// Read a postings file. A missing file reads as empty.
pub fn read_postings_json(path: &Path) -> Result<Vec<JobPosting>> {
    if !path.exists() {
        return Ok(vec![]);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read postings from {:?}", path))?;

    let postings: Vec<JobPosting> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse postings JSON in {:?}", path))?;

    Ok(postings)
}

pub fn write_postings_csv(path: &Path, postings: &[JobPosting]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open CSV output {:?}", path))?;

    writer.write_record(CSV_HEADER)?;
    for p in postings {
        let date = p.date_posted.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        writer.write_record([
            p.hospital.as_str(),
            p.job_title.as_str(),
            p.location.as_deref().unwrap_or(""),
            p.url.as_str(),
            date.as_str(),
            p.job_type.as_str(),
        ])?;
    }

    writer.flush().with_context(|| format!("Failed to write CSV to {:?}", path))?;
    Ok(())
}

pub fn write_run_report(path: &Path, report: &RunReport) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("Failed to write run report to {:?}", path))?;
    Ok(())
}

/// Non-empty `job_title` strings of a postings array, trimmed, in order.
pub fn extract_titles(data: &serde_json::Value) -> Result<Vec<String>> {
    let Some(items) = data.as_array() else {
        bail!("Expected a JSON array");
    };
    Ok(items
        .iter()
        .filter_map(|item| item.get("job_title")?.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn posting(hospital: &str, title: &str, url: &str) -> JobPosting {
        JobPosting {
            hospital: hospital.to_string(),
            job_title: title.to_string(),
            location: None,
            url: url.to_string(),
            date_posted: None,
            job_type: "Full-Time Permanent".to_string(),
        }
    }

    #[test]
    fn test_sort_postings() {
        let mut postings = vec![
            posting("b", "RN", "u3"),
            posting("A", "rn", "u2"),
            posting("a", "Clerk", "u9"),
            posting("a", "RN", "u1"),
        ];
        sort_postings(&mut postings);
        let urls: Vec<&str> = postings.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["u9", "u1", "u2", "u3"]);
    }

    #[test]
    fn test_json_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("jobs.json");
        assert!(read_postings_json(&path).unwrap().is_empty());

        let mut p = posting("H", "RN", "u1");
        p.date_posted = NaiveDate::from_ymd_opt(2025, 12, 23);
        write_postings_json(&path, &[p.clone()]).unwrap();
        assert_eq!(read_postings_json(&path).unwrap(), vec![p]);

        fs::write(&path, "not json").unwrap();
        assert!(read_postings_json(&path).is_err());
    }

    #[test]
    fn test_csv_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.csv");
        let mut p = posting("Lakeridge Health", "RN, Operating Room", "https://x/1");
        p.location = Some("Ajax".to_string());
        p.date_posted = NaiveDate::from_ymd_opt(2025, 12, 23);
        write_postings_csv(&path, &[p, posting("H", "RPN", "https://x/2")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "hospital,job_title,location,url,date_posted,job_type");
        assert_eq!(lines[1], "Lakeridge Health,\"RN, Operating Room\",Ajax,https://x/1,2025-12-23,Full-Time Permanent");
        assert_eq!(lines[2], "H,RPN,,https://x/2,,Full-Time Permanent");
    }

    #[test]
    fn test_extract_titles() {
        let data = serde_json::json!([
            {"job_title": " RN - OR "},
            {"job_title": ""},
            {"hospital": "no title"},
            {"job_title": 7},
            "junk",
            {"job_title": "RPN"}
        ]);
        assert_eq!(extract_titles(&data).unwrap(), vec!["RN - OR", "RPN"]);
        assert!(extract_titles(&serde_json::json!({"job_title": "x"})).is_err());
    }
}
