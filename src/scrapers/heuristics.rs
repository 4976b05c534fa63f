//! Link heuristics shared by the table-scraping extractors.
//!
//! The deny/allow lists below were tuned against the career sites seen so
//! far. Config can add entries; it cannot remove the built-in ones.

use anyhow::{Context, Result};
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::collections::HashSet;

use crate::config::HeuristicsConfig;
use crate::normalize::clean_text;

/// Anchor text that says nothing about the job itself.
const GENERIC_LINK_TEXTS: &[&str] = &[
    "details", "detail", "view", "view details", "view job details", "job details",
    "apply", "apply now", "learn more", "more", "read more", "more info", "view job",
    "see details", "click here", "here",
];

/// Site chrome that shows up in page-wide anchor scans.
const NAVIGATION_TITLES: &[&str] = &[
    "home", "login", "log in", "logout", "log out", "sign in", "sign out", "register",
    "create account", "contact", "contact us", "help", "faq", "privacy", "privacy policy",
    "terms of use", "accessibility", "search jobs", "job search", "search", "my profile",
    "my applications", "forgot password", "back", "english", "français", "francais",
];

const NAVIGATION_PATH_PATTERNS: &[&str] = &[
    r"(?i)/(default|home|index|login|logon|logout|signin|sign-in|signout|register|registration|createaccount|contact|contactus|contact-us|help|faq|privacy|terms|forgotpassword|myprofile|myapplications|accessibility)(\.aspx|\.html?|\.php|\.asp)?([?#/]|$)",
];

/// Substrings of an href/onclick that point at a job rather than site chrome.
const JOB_LINK_TOKENS: &[&str] = &[
    "vacancy", "posting", "requisition", "jobdetail", "job_detail", "job-detail",
];

/// Titles shorter than this are usually codes or labels.
pub const MIN_TITLE_CHARS: usize = 6;

#[derive(Debug, Clone)]
pub struct LinkHeuristics {
    generic_link_texts: HashSet<String>,
    navigation_titles: HashSet<String>,
    navigation_paths: Vec<Regex>,
    job_link_tokens: Vec<String>,
}

impl Default for LinkHeuristics {
    fn default() -> Self {
        Self::from_config(&HeuristicsConfig::default())
            .unwrap_or_else(|_| unreachable!("built-in navigation patterns are valid"))
    }
}

impl LinkHeuristics {
    /// Built-in lists extended with the configured extras.
    pub fn from_config(extra: &HeuristicsConfig) -> Result<Self> {
        let lower_set = |builtin: &[&str], extra: &[String]| -> HashSet<String> {
            builtin
                .iter()
                .map(|s| s.to_string())
                .chain(extra.iter().map(|s| s.trim().to_lowercase()))
                .filter(|s| !s.is_empty())
                .collect()
        };

        let mut navigation_paths = Vec::new();
        for pattern in NAVIGATION_PATH_PATTERNS
            .iter()
            .map(|s| s.to_string())
            .chain(extra.navigation_path_patterns.iter().cloned())
        {
            let re = Regex::new(&pattern)
                .with_context(|| format!("Invalid navigation path pattern {:?}", pattern))?;
            navigation_paths.push(re);
        }

        Ok(Self {
            generic_link_texts: lower_set(GENERIC_LINK_TEXTS, &extra.generic_link_texts),
            navigation_titles: lower_set(NAVIGATION_TITLES, &extra.navigation_titles),
            navigation_paths,
            job_link_tokens: JOB_LINK_TOKENS
                .iter()
                .map(|s| s.to_string())
                .chain(extra.job_link_tokens.iter().map(|s| s.trim().to_lowercase()))
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    pub fn is_generic(&self, text: &str) -> bool {
        self.generic_link_texts.contains(&clean_text(text).to_lowercase())
    }

    pub fn is_navigation_title(&self, text: &str) -> bool {
        self.navigation_titles.contains(&clean_text(text).to_lowercase())
    }

    pub fn is_navigation_url(&self, url: &str) -> bool {
        self.navigation_paths.iter().any(|re| re.is_match(url))
    }

    pub fn has_job_token(&self, value: &str) -> bool {
        let lower = value.to_lowercase();
        self.job_link_tokens.iter().any(|t| lower.contains(t.as_str()))
    }
}

/// Visible text of an element with whitespace collapsed.
pub fn element_text(el: &ElementRef) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Pick a title for a job link.
///
/// The anchor's own text wins when it is long enough and not generic.
/// Otherwise the longest meaningful cell in the anchor's table row is used,
/// since that is usually the full title rather than a code or label.
pub fn row_title(anchor: &ElementRef, heuristics: &LinkHeuristics) -> String {
    let own = element_text(anchor);
    if own.chars().count() >= MIN_TITLE_CHARS && !heuristics.is_generic(&own) {
        return own;
    }

    let row = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "tr");

    let Some(row) = row else {
        return if heuristics.is_generic(&own) { String::new() } else { own };
    };

    let Ok(cell_sel) = Selector::parse("td, th") else {
        return String::new();
    };

    let mut best = String::new();
    for cell in row.select(&cell_sel) {
        let text = element_text(&cell);
        if text.chars().count() < MIN_TITLE_CHARS || heuristics.is_generic(&text) {
            continue;
        }
        if text.chars().count() > best.chars().count() {
            best = text;
        }
    }
    best
}
