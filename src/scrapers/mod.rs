mod browser;
mod erecruit;
mod heuristics;
mod njoyn;
mod workday;

pub use browser::WebDriverRenderer;
pub use erecruit::{parse_erecruit_page, ERecruitScraper};
pub use heuristics::{row_title, LinkHeuristics};
pub use njoyn::{
    extract_detail_title, find_next_page_url, parse_listing_page, sanitize_detail_url, ListingLink,
    NjoynScraper,
};
pub use workday::{parse_posted_on, parse_workday_page, parse_workday_site, WorkdayScraper, WorkdaySite};

use anyhow::Result;
use std::fmt::Display;

use crate::config::{ScrapeConfig, SourceConfig};
use crate::fetch::{Fetcher, Renderer};
use crate::types::{JobPosting, PlatformType};

/// Everything an extractor may touch while scraping one source.
pub struct ScrapeContext<'a> {
    pub fetcher: &'a dyn Fetcher,
    /// Present only when browser rendering is enabled.
    pub renderer: Option<&'a dyn Renderer>,
    pub settings: &'a ScrapeConfig,
    pub heuristics: &'a LinkHeuristics,
}

/// Hospital-scoped logger handed to each extractor call. Warnings are kept
/// so they can be attached to the source's run report.
#[derive(Debug)]
pub struct ScrapeLog {
    hospital: String,
    warnings: Vec<String>,
}

impl ScrapeLog {
    pub fn new(hospital: &str) -> Self {
        Self {
            hospital: hospital.to_string(),
            warnings: Vec::new(),
        }
    }

    pub fn info(&self, message: impl Display) {
        log::info!("{}: {}", self.hospital, message);
    }

    pub fn debug(&self, message: impl Display) {
        log::debug!("{}: {}", self.hospital, message);
    }

    pub fn warn(&mut self, message: impl Display) {
        let message = message.to_string();
        log::warn!("{}: {}", self.hospital, message);
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}

/// One recruiting-platform integration.
pub trait Scraper {
    fn source(&self) -> &SourceConfig;

    fn scrape(&self, ctx: &ScrapeContext<'_>, log: &mut ScrapeLog) -> Result<Vec<JobPosting>>;
}

/// Pick the extractor for a configured source.
pub fn build_scraper(source: &SourceConfig) -> Result<Box<dyn Scraper>> {
    let scraper: Box<dyn Scraper> = match source.platform {
        PlatformType::Workday => Box::new(WorkdayScraper::new(source.clone())?),
        PlatformType::Njoyn => Box::new(NjoynScraper::new(source.clone())),
        PlatformType::Erecruit => Box::new(ERecruitScraper::new(source.clone())),
    };
    Ok(scraper)
}
