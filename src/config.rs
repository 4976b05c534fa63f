//! Configuration loading and validation.
//!
//! The YAML file is parsed into permissive `Raw*` structs first, then checked
//! and converted. Any problem here aborts the run before a single fetch.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::scrapers::{parse_workday_site, LinkHeuristics};
use crate::types::{PlatformType, TitleGroupsMode};

/// One configured career site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub hospital: String,
    pub platform: PlatformType,
    pub url: String,
    pub location_include_any_of: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleFilterConfig {
    pub title_groups: Vec<Vec<String>>,
    pub title_groups_mode: TitleGroupsMode,
    pub title_exclude: Vec<String>,
    pub employment_include: Vec<String>,
    pub employment_exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub json: String,
    pub csv: String,
    pub last_json: String,
    pub seen_urls: String,
    pub run_report: String,
    pub raw_json: String,
}

impl OutputConfig {
    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}

/// Extra entries for the hard-coded link heuristics. These extend the
/// built-in lists, they never replace them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    pub generic_link_texts: Vec<String>,
    pub navigation_titles: Vec<String>,
    pub navigation_path_patterns: Vec<String>,
    pub job_link_tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfig {
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub fetch_attempts: u32,
    pub user_agent: String,
    pub max_pages: u32,
    pub workday_page_size: u32,
    pub workday_search_text: String,
    pub use_browser: bool,
    pub webdriver_url: String,
    pub playwright_expand_rows: bool,
    pub browser_max_iterations: u32,
    pub enrich_detail_titles: bool,
    pub enrich_detail_max_requests: u32,
    pub heuristics: HeuristicsConfig,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 2,
            fetch_attempts: 2,
            user_agent: "nurseTracker/1.0".to_string(),
            max_pages: 50,
            workday_page_size: 50,
            workday_search_text: String::new(),
            use_browser: false,
            webdriver_url: "http://localhost:9515".to_string(),
            playwright_expand_rows: true,
            browser_max_iterations: 20,
            enrich_detail_titles: true,
            enrich_detail_max_requests: 25,
            heuristics: HeuristicsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub include_all_results: bool,
    pub subject_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub role: RoleFilterConfig,
    pub output: OutputConfig,
    pub scrape: ScrapeConfig,
    pub email: EmailConfig,
    pub hospitals: Vec<SourceConfig>,
}

// ============================================
// Raw YAML schema
// ============================================

#[derive(Debug, Deserialize)]
struct RawConfig {
    role: Option<RawRole>,
    output: Option<RawOutput>,
    scrape: Option<RawScrape>,
    #[serde(default)]
    email: RawEmail,
    #[serde(default)]
    hospitals: Vec<RawHospital>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRole {
    title_groups_all: Option<Vec<Vec<String>>>,
    title_groups_mode: Option<String>,
    // legacy schema
    title_all_of: Vec<String>,
    title_any_of: Vec<String>,
    title_exclude_any_of: Vec<String>,
    employment_any_of: Vec<String>,
    employment_exclude_any_of: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOutput {
    dir: Option<String>,
    json: Option<String>,
    csv: Option<String>,
    last_json: Option<String>,
    seen_urls: Option<String>,
    run_report: Option<String>,
    raw_json: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScrape {
    timeout_seconds: Option<u64>,
    retry_attempts: Option<u32>,
    fetch_attempts: Option<u32>,
    user_agent: Option<String>,
    max_pages: Option<u32>,
    workday_page_size: Option<u32>,
    workday_search_text: Option<String>,
    use_browser: Option<bool>,
    webdriver_url: Option<String>,
    playwright_expand_rows: Option<bool>,
    browser_max_iterations: Option<u32>,
    enrich_detail_titles: Option<bool>,
    enrich_detail_max_requests: Option<u32>,
    heuristics: HeuristicsConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEmail {
    include_all_results: Option<bool>,
    subject_title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHospital {
    #[serde(default)]
    hospital: String,
    #[serde(rename = "type", default)]
    platform: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    location_include_any_of: Vec<String>,
}

/// Load and validate the config file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;
    parse_config(&content).with_context(|| format!("Invalid config {:?}", path))
}

/// Parse and validate config YAML.
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let raw: RawConfig = serde_yaml::from_str(content)
        .with_context(|| "Failed to parse config YAML")?;

    let Some(role_raw) = raw.role else {
        bail!("Expected mapping at role");
    };
    let Some(output_raw) = raw.output else {
        bail!("Expected mapping at output");
    };
    let scrape_raw = raw.scrape.unwrap_or_default();

    let role = build_role(role_raw)?;
    let output = OutputConfig {
        dir: PathBuf::from(output_raw.dir.unwrap_or_else(|| "output".to_string())),
        json: output_raw.json.unwrap_or_else(|| "jobs.json".to_string()),
        csv: output_raw.csv.unwrap_or_else(|| "jobs.csv".to_string()),
        last_json: output_raw.last_json.unwrap_or_else(|| "last_jobs.json".to_string()),
        seen_urls: output_raw.seen_urls.unwrap_or_else(|| "seen_urls.json".to_string()),
        run_report: output_raw.run_report.unwrap_or_else(|| "run_report.json".to_string()),
        raw_json: output_raw.raw_json.unwrap_or_else(|| "raw_scraped.json".to_string()),
    };
    let scrape = build_scrape(scrape_raw)?;
    LinkHeuristics::from_config(&scrape.heuristics).context("Invalid scrape.heuristics")?;
    let email = EmailConfig {
        include_all_results: env_bool("EMAIL_INCLUDE_ALL_RESULTS")
            .unwrap_or(raw.email.include_all_results.unwrap_or(false)),
        subject_title: raw
            .email
            .subject_title
            .unwrap_or_else(|| "RN Operating Room - daily scrape".to_string()),
    };

    if raw.hospitals.is_empty() {
        bail!("Expected non-empty hospitals list");
    }

    let mut hospitals = Vec::with_capacity(raw.hospitals.len());
    for (i, h) in raw.hospitals.into_iter().enumerate() {
        let Some(platform) = PlatformType::parse(&h.platform) else {
            bail!("Unsupported hospital type at hospitals[{}].type: {}", i, h.platform);
        };
        if h.hospital.trim().is_empty() {
            bail!("Missing hospitals[{}].hospital", i);
        }
        if h.url.trim().is_empty() {
            bail!("Missing hospitals[{}].url", i);
        }
        if platform == PlatformType::Workday {
            parse_workday_site(&h.url).with_context(|| format!("Invalid hospitals[{}].url", i))?;
        }
        hospitals.push(SourceConfig {
            hospital: h.hospital.trim().to_string(),
            platform,
            url: h.url.trim().to_string(),
            location_include_any_of: non_blank(h.location_include_any_of),
        });
    }

    Ok(AppConfig { role, output, scrape, email, hospitals })
}

fn build_role(raw: RawRole) -> Result<RoleFilterConfig> {
    let groups = match raw.title_groups_all {
        Some(groups) => groups,
        None => {
            // Legacy schema: title_all_of and title_any_of become two groups.
            let mut groups = Vec::new();
            if !raw.title_all_of.is_empty() {
                groups.push(raw.title_all_of);
            }
            if !raw.title_any_of.is_empty() {
                groups.push(raw.title_any_of);
            }
            groups
        }
    };

    let mode_str = raw.title_groups_mode.unwrap_or_else(|| "all".to_string());
    let Some(title_groups_mode) = TitleGroupsMode::parse(&mode_str) else {
        bail!("Expected role.title_groups_mode to be one of: all, any (got {:?})", mode_str);
    };

    Ok(RoleFilterConfig {
        title_groups: groups
            .into_iter()
            .map(non_blank)
            .filter(|g| !g.is_empty())
            .collect(),
        title_groups_mode,
        title_exclude: non_blank(raw.title_exclude_any_of),
        employment_include: non_blank(raw.employment_any_of),
        employment_exclude: non_blank(raw.employment_exclude_any_of),
    })
}

fn build_scrape(raw: RawScrape) -> Result<ScrapeConfig> {
    let defaults = ScrapeConfig::default();
    let scrape = ScrapeConfig {
        timeout_seconds: raw.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        retry_attempts: raw.retry_attempts.unwrap_or(defaults.retry_attempts),
        fetch_attempts: raw.fetch_attempts.unwrap_or(defaults.fetch_attempts),
        user_agent: raw.user_agent.unwrap_or(defaults.user_agent),
        max_pages: raw.max_pages.unwrap_or(defaults.max_pages),
        workday_page_size: raw.workday_page_size.unwrap_or(defaults.workday_page_size),
        workday_search_text: raw.workday_search_text.unwrap_or_default().trim().to_string(),
        use_browser: env_bool("USE_BROWSER").unwrap_or(raw.use_browser.unwrap_or(defaults.use_browser)),
        webdriver_url: raw.webdriver_url.unwrap_or(defaults.webdriver_url),
        playwright_expand_rows: raw.playwright_expand_rows.unwrap_or(defaults.playwright_expand_rows),
        browser_max_iterations: raw.browser_max_iterations.unwrap_or(defaults.browser_max_iterations),
        enrich_detail_titles: raw.enrich_detail_titles.unwrap_or(defaults.enrich_detail_titles),
        enrich_detail_max_requests: raw
            .enrich_detail_max_requests
            .unwrap_or(defaults.enrich_detail_max_requests),
        heuristics: raw.heuristics,
    };

    for (name, value) in [
        ("retry_attempts", scrape.retry_attempts),
        ("fetch_attempts", scrape.fetch_attempts),
        ("max_pages", scrape.max_pages),
        ("workday_page_size", scrape.workday_page_size),
    ] {
        if value == 0 {
            bail!("scrape.{} must be at least 1", name);
        }
    }
    if scrape.timeout_seconds == 0 {
        bail!("scrape.timeout_seconds must be at least 1");
    }

    Ok(scrape)
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Read a boolean override from the environment.
pub fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
role:
  title_groups_all:
    - ["Registered Nurse", "RN"]
    - ["Operating Room", "Perioperative"]
  employment_any_of: ["Full-Time", "Permanent"]
  employment_exclude_any_of: ["Part-Time", "Casual", "  "]
output:
  dir: output
  json: jobs.json
  csv: jobs.csv
  last_json: last_jobs.json
  seen_urls: seen_urls.json
  run_report: run_report.json
scrape:
  timeout_seconds: 10
  retry_attempts: 2
  user_agent: "test-agent"
  max_pages: 50
  workday_page_size: 50
  playwright_expand_rows: true
  enrich_detail_titles: true
  enrich_detail_max_requests: 10
  heuristics:
    generic_link_texts: ["see posting"]
email:
  include_all_results: false
hospitals:
  - hospital: Test Hospital
    type: workday
    url: https://example.wd10.myworkdayjobs.com/en-US/Site
    location_include_any_of: ["Oshawa"]
"#;

    #[test]
    fn test_parses_expected_schema() {
        let app = parse_config(FULL).unwrap();
        assert_eq!(app.role.title_groups[0], vec!["Registered Nurse", "RN"]);
        assert_eq!(app.role.title_groups[1], vec!["Operating Room", "Perioperative"]);
        assert_eq!(app.role.title_groups_mode, TitleGroupsMode::All);
        assert_eq!(app.role.employment_include, vec!["Full-Time", "Permanent"]);
        assert_eq!(app.role.employment_exclude, vec!["Part-Time", "Casual"]);
        assert_eq!(app.output.seen_urls, "seen_urls.json");
        assert_eq!(app.output.raw_json, "raw_scraped.json");
        assert_eq!(app.hospitals.len(), 1);
        assert_eq!(app.hospitals[0].platform, PlatformType::Workday);
        assert_eq!(app.hospitals[0].location_include_any_of, vec!["Oshawa"]);
        assert!(app.scrape.enrich_detail_titles);
        assert_eq!(app.scrape.enrich_detail_max_requests, 10);
        assert_eq!(app.scrape.fetch_attempts, 2);
        assert_eq!(app.scrape.heuristics.generic_link_texts, vec!["see posting"]);
    }

    #[test]
    fn test_rejects_unknown_hospital_type() {
        let yaml = r#"
role: {}
output: {dir: output}
hospitals:
  - hospital: Test Hospital
    type: nope
    url: https://example.com
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("Unsupported hospital type at hospitals[0].type: nope"));
    }

    #[test]
    fn test_rejects_empty_hospitals() {
        let yaml = "role: {}\noutput: {}\nhospitals: []\n";
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn test_rejects_bad_mode() {
        let yaml = r#"
role: {title_groups_mode: most}
output: {}
hospitals: [{hospital: H, type: njoyn, url: "https://x"}]
"#;
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn test_legacy_title_schema() {
        let yaml = r#"
role:
  title_all_of: ["Registered Nurse"]
  title_any_of: ["Operating Room", "OR"]
  title_groups_mode: ANY
output: {}
hospitals: [{hospital: H, type: erecruit, url: "https://x"}]
"#;
        let app = parse_config(yaml).unwrap();
        assert_eq!(app.role.title_groups, vec![
            vec!["Registered Nurse".to_string()],
            vec!["Operating Room".to_string(), "OR".to_string()],
        ]);
        assert_eq!(app.role.title_groups_mode, TitleGroupsMode::Any);
        assert_eq!(app.scrape.max_pages, 50);
        assert_eq!(app.scrape.workday_page_size, 50);
        assert_eq!(app.scrape.retry_attempts, 2);
    }

    #[test]
    fn test_blank_title_groups_dropped() {
        let yaml = r#"
role:
  title_groups_all: [["Registered Nurse"], ["  "], []]
output: {}
hospitals: [{hospital: H, type: erecruit, url: "https://x"}]
"#;
        let app = parse_config(yaml).unwrap();
        assert_eq!(app.role.title_groups, vec![vec!["Registered Nurse".to_string()]]);
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let yaml = r#"
role: {}
output: {}
scrape: {workday_page_size: 0}
hospitals: [{hospital: H, type: workday, url: "https://x"}]
"#;
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn test_rejects_workday_url_without_site() {
        let yaml = r#"
role: {}
output: {}
hospitals: [{hospital: H, type: workday, url: "https://h.wd10.myworkdayjobs.com/"}]
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("hospitals[0].url"));
    }

    #[test]
    fn test_rejects_bad_navigation_pattern() {
        let yaml = r#"
role: {}
output: {}
scrape: {heuristics: {navigation_path_patterns: ["(unclosed"]}}
hospitals: [{hospital: H, type: njoyn, url: "https://x"}]
"#;
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool(" Yes "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("off"));
    }
}
