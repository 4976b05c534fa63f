//! eRecruit table-grid extractor.
//!
//! The listing is a server-rendered ASP.NET grid whose control ids carry a
//! page-specific prefix, so everything is matched by id suffix.

use anyhow::Result;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::heuristics::{element_text, row_title, LinkHeuristics};
use super::{ScrapeContext, ScrapeLog, Scraper};
use crate::config::SourceConfig;
use crate::job_type::infer_job_type;
use crate::normalize::{clean_text, is_javascript_href, resolve_url};
use crate::types::{JobPosting, DEFAULT_JOB_TYPE};

lazy_static! {
    static ref GRID: Selector = Selector::parse("table[id$='gvwSearchResults']").unwrap();
    static ref ROW: Selector = Selector::parse("tr").unwrap();
    static ref LINK: Selector = Selector::parse("a[href]").unwrap();
    static ref ANY_ANCHOR: Selector = Selector::parse("a").unwrap();
    static ref LOCATION_SPAN: Selector = Selector::parse("span[id$='hlnkVacancyLocation']").unwrap();
    static ref DATE_SPAN: Selector = Selector::parse("span[id$='lblFldPublishDate']").unwrap();

    static ref VACANCY_HREF: Regex = Regex::new(r"(?i)VacancyDetail\.aspx\?VacancyUID=").unwrap();
    static ref LOCATION_PREFIX: Regex = Regex::new(r"(?i)^\s*job\s+location\s*:\s*").unwrap();
    static ref US_DATE: Regex = Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})$").unwrap();

    static ref LOCATION_REDIRECT: Regex =
        Regex::new(r#"(?i)(?:window\.|document\.)?location(?:\.href)?\s*=\s*['"]([^'"]+)['"]"#).unwrap();
    static ref QUOTED_URL: Regex =
        Regex::new(r#"(?i)['"]((?:https?://|/)?[^'"\s]*?\.(?:aspx|asp|html?|php)(?:\?[^'"\s]*)?)['"]"#).unwrap();
}

/// Strict `MM/DD/YYYY`. Two-digit years are taken as 20YY.
pub fn parse_us_date(value: &str) -> Option<NaiveDate> {
    let caps = US_DATE.captures(value.trim())?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let mut year: i32 = caps[3].parse().ok()?;
    if caps[3].len() == 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn strip_location_label(text: &str) -> Option<String> {
    let cleaned = clean_text(&LOCATION_PREFIX.replace(text, ""));
    (!cleaned.is_empty()).then_some(cleaned)
}

fn posting(hospital: &str, title: String, url: String) -> JobPosting {
    JobPosting {
        hospital: hospital.to_string(),
        job_type: infer_job_type(&title, DEFAULT_JOB_TYPE),
        job_title: title,
        location: None,
        url,
        date_posted: None,
    }
}

// ============================================
// Tier 1: results grid
// ============================================

fn parse_grid_row(row: ElementRef, page_url: &str, hospital: &str) -> Option<JobPosting> {
    let anchor = row.select(&LINK).find(|a| {
        a.value()
            .attr("href")
            .is_some_and(|href| VACANCY_HREF.is_match(href))
    })?;

    let title = element_text(&anchor);
    if title.is_empty() {
        return None;
    }
    let url = resolve_url(page_url, anchor.value().attr("href")?)?;

    let mut job = posting(hospital, title, url);
    job.location = row
        .select(&LOCATION_SPAN)
        .next()
        .and_then(|span| strip_location_label(&element_text(&span)));
    job.date_posted = row
        .select(&DATE_SPAN)
        .next()
        .and_then(|span| parse_us_date(&element_text(&span)));
    Some(job)
}

/// Rows of the results grid that carry a vacancy link.
pub fn parse_results_grid(doc: &Html, page_url: &str, hospital: &str) -> Vec<JobPosting> {
    let Some(grid) = doc.select(&GRID).next() else {
        return Vec::new();
    };
    grid.select(&ROW)
        .filter_map(|row| parse_grid_row(row, page_url, hospital))
        .collect()
}

// ============================================
// Tier 2: page-wide anchor scan
// ============================================

/// Destination of an onclick handler, if one can be found.
fn onclick_target(onclick: &str, page_url: &str) -> Option<String> {
    let raw = LOCATION_REDIRECT
        .captures(onclick)
        .or_else(|| QUOTED_URL.captures(onclick))
        .map(|caps| caps[1].to_string())?;
    resolve_url(page_url, &raw)
}

fn parse_fallback_anchor(
    anchor: ElementRef,
    page_url: &str,
    hospital: &str,
    heuristics: &LinkHeuristics,
) -> Option<JobPosting> {
    let href = anchor.value().attr("href").unwrap_or_default().trim();
    let onclick = anchor.value().attr("onclick").unwrap_or_default();

    if is_javascript_href(href) {
        return None;
    }

    let job_like = heuristics.has_job_token(href)
        || heuristics.has_job_token(onclick)
        || LOCATION_REDIRECT.is_match(onclick);
    if !job_like {
        return None;
    }

    let url = if href.is_empty() {
        onclick_target(onclick, page_url).unwrap_or_else(|| page_url.to_string())
    } else {
        resolve_url(page_url, href)?
    };
    if heuristics.is_navigation_url(&url) {
        return None;
    }

    let title = row_title(&anchor, heuristics);
    if title.is_empty() || heuristics.is_generic(&title) || heuristics.is_navigation_title(&title) {
        return None;
    }

    Some(posting(hospital, title, url))
}

/// Job-looking anchors anywhere on the page.
pub fn parse_anchor_fallback(
    doc: &Html,
    page_url: &str,
    hospital: &str,
    heuristics: &LinkHeuristics,
) -> Vec<JobPosting> {
    doc.select(&ANY_ANCHOR)
        .filter_map(|a| parse_fallback_anchor(a, page_url, hospital, heuristics))
        .collect()
}

/// Both tiers on one document: the grid when it yields anything, the
/// anchor scan otherwise.
pub fn parse_erecruit_page(
    html: &str,
    page_url: &str,
    hospital: &str,
    heuristics: &LinkHeuristics,
) -> Vec<JobPosting> {
    let doc = Html::parse_document(html);
    let grid = parse_results_grid(&doc, page_url, hospital);
    if !grid.is_empty() {
        return grid;
    }
    parse_anchor_fallback(&doc, page_url, hospital, heuristics)
}

// ============================================
// Scraper
// ============================================

pub struct ERecruitScraper {
    source: SourceConfig,
}

impl ERecruitScraper {
    pub fn new(source: SourceConfig) -> Self {
        Self { source }
    }

    /// Rendered DOM when browser mode is on and works, static HTML otherwise.
    fn load_listing(&self, ctx: &ScrapeContext<'_>, log: &mut ScrapeLog) -> Result<String> {
        if ctx.settings.use_browser {
            match ctx.renderer {
                Some(renderer) => match renderer.render_page(&self.source.url, ctx.settings.playwright_expand_rows) {
                    Ok(html) => return Ok(html),
                    Err(e) => log.warn(format!("Rendering failed, using static page: {}", e)),
                },
                None => log.warn("Browser rendering enabled but no renderer is available"),
            }
        }
        Ok(ctx.fetcher.fetch_text(&self.source.url)?)
    }
}

impl Scraper for ERecruitScraper {
    fn source(&self) -> &SourceConfig {
        &self.source
    }

    fn scrape(&self, ctx: &ScrapeContext<'_>, log: &mut ScrapeLog) -> Result<Vec<JobPosting>> {
        log.info(format!("eRecruit scrape start ({})", self.source.url));
        let html = self.load_listing(ctx, log)?;
        let doc = Html::parse_document(&html);

        let grid = parse_results_grid(&doc, &self.source.url, &self.source.hospital);
        if !grid.is_empty() {
            log.info(format!("Results grid: {} postings", grid.len()));
            return Ok(grid);
        }

        let fallback = parse_anchor_fallback(&doc, &self.source.url, &self.source.hospital, ctx.heuristics);
        log.info(format!("No results grid rows, anchor scan found {} postings", fallback.len()));
        Ok(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://careers.lakeridgehealth.on.ca/eRecruit/";

    #[test]
    fn test_grid_row() {
        let html = r#"
        <table id="ctl00_x_y_gvwSearchResults">
          <tr><th>Header</th></tr>
          <tr>
            <td>
              <a class="hyperlink" href="VacancyDetail.aspx?VacancyUID=000000051498">
                2500003625 - Registered MRI Technologist
              </a>
              <span id="abc_hlnkVacancyLocation">Job Location: Ajax-Pickering</span>
              <span id="abc_lblFldPublishDate">12/23/2025</span>
            </td>
          </tr>
        </table>"#;
        let jobs = parse_erecruit_page(html, BASE, "Lakeridge Health", &LinkHeuristics::default());
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.job_title, "2500003625 - Registered MRI Technologist");
        assert_eq!(job.location.as_deref(), Some("Ajax-Pickering"));
        assert_eq!(job.date_posted, NaiveDate::from_ymd_opt(2025, 12, 23));
        assert_eq!(
            job.url,
            "https://careers.lakeridgehealth.on.ca/eRecruit/VacancyDetail.aspx?VacancyUID=000000051498"
        );
        assert_eq!(job.job_type, DEFAULT_JOB_TYPE);
    }

    #[test]
    fn test_grid_wins_over_fallback() {
        let html = r#"
        <a href="PostingDetail.aspx?id=9">Registered Nurse Float Pool</a>
        <table id="gvwSearchResults">
          <tr><td><a href="VacancyDetail.aspx?VacancyUID=1">RN - Operating Room</a></td></tr>
          <tr><td><a href="Other.aspx">No vacancy link here</a></td></tr>
        </table>"#;
        let jobs = parse_erecruit_page(html, BASE, "L", &LinkHeuristics::default());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_title, "RN - Operating Room");
    }

    #[test]
    fn test_fallback_filters_navigation_and_generic() {
        let html = r#"
        <a href="javascript:void(0)" onclick="openVacancy(1)">Registered Nurse ICU</a>
        <a href="Login.aspx?vacancy=1">Registered Nurse Sign-in</a>
        <a href="VacancyDetail.aspx?id=2">Apply</a>
        <a href="Search.aspx">Search jobs</a>
        <a href="PostingDetail.aspx?id=3">Registered Nurse - Operating Room</a>
        <a onclick="window.location.href='VacancyDetail.aspx?id=4'">Perioperative Nurse</a>
        <a onclick="location = 'nowhere'">RPN - Emergency</a>
        <table><tr><td>Registered Practical Nurse - Surgery</td><td><a href="requisition.aspx?r=5">View</a></td></tr></table>"#;
        let jobs = parse_erecruit_page(html, BASE, "L", &LinkHeuristics::default());
        let got: Vec<(&str, &str)> = jobs.iter().map(|j| (j.job_title.as_str(), j.url.as_str())).collect();
        assert_eq!(
            got,
            vec![
                ("Registered Nurse - Operating Room", "https://careers.lakeridgehealth.on.ca/eRecruit/PostingDetail.aspx?id=3"),
                ("Perioperative Nurse", "https://careers.lakeridgehealth.on.ca/eRecruit/VacancyDetail.aspx?id=4"),
                ("RPN - Emergency", "https://careers.lakeridgehealth.on.ca/eRecruit/nowhere"),
                ("Registered Practical Nurse - Surgery", "https://careers.lakeridgehealth.on.ca/eRecruit/requisition.aspx?r=5"),
            ]
        );
    }

    #[test]
    fn test_onclick_without_target_uses_page_url() {
        assert_eq!(onclick_target("doPostBack('grid', 'Select$1')", BASE), None);
        let html = r#"<a onclick="__doPostBack('vacancyGrid','Select$1')">Registered Nurse - Cardiology</a>"#;
        let jobs = parse_erecruit_page(html, BASE, "L", &LinkHeuristics::default());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url, BASE);
    }

    #[test]
    fn test_parse_us_date() {
        assert_eq!(parse_us_date("12/23/2025"), NaiveDate::from_ymd_opt(2025, 12, 23));
        assert_eq!(parse_us_date(" 1/5/26 "), NaiveDate::from_ymd_opt(2026, 1, 5));
        assert_eq!(parse_us_date("23/12/2025"), None);
        assert_eq!(parse_us_date("2025-12-23"), None);
        assert_eq!(parse_us_date("12/23/2025 10:00"), None);
    }
}
