use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label given to a posting before the title has been inspected.
pub const DEFAULT_JOB_TYPE: &str = "Full-Time Permanent";

/// One normalized job record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobPosting {
    pub hospital: String,
    pub job_title: String,
    pub location: Option<String>,
    pub url: String,
    pub date_posted: Option<NaiveDate>,
    pub job_type: String,
}

impl JobPosting {
    /// Dedup identity.
    pub fn url_key(&self) -> &str {
        self.url.trim()
    }
}

/// Recruiting platform family behind a career site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Workday,
    Njoyn,
    Erecruit,
}

impl PlatformType {
    pub const ALL: [PlatformType; 3] = [PlatformType::Workday, PlatformType::Njoyn, PlatformType::Erecruit];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Workday => "workday",
            PlatformType::Njoyn => "njoyn",
            PlatformType::Erecruit => "erecruit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s.trim().to_lowercase())
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleGroupsMode {
    /// Every group must match.
    #[default]
    All,
    /// At least one group must match.
    Any,
}

impl TitleGroupsMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Some(TitleGroupsMode::All),
            "any" => Some(TitleGroupsMode::Any),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Failed,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Ok => write!(f, "ok"),
            SourceStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of scraping one configured source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceReport {
    pub hospital: String,
    pub platform: PlatformType,
    pub status: SourceStatus,
    pub attempts: u32,
    pub scraped: usize,
    /// Postings left after the location pass.
    pub kept: usize,
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// A source that produced no postings because every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Failure {
    pub hospital: String,
    pub error: String,
}

/// Summary of one run, written to `run_report.json`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub sources: Vec<SourceReport>,
    pub total_scraped: usize,
    pub matched: usize,
    pub new: usize,
    pub email_sent: bool,
    pub state_updated: bool,
}

impl RunReport {
    pub fn failures(&self) -> Vec<Failure> {
        self.sources
            .iter()
            .filter(|s| s.status == SourceStatus::Failed)
            .map(|s| Failure {
                hospital: s.hospital.clone(),
                error: s.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            })
            .collect()
    }
}
