//! Njoyn query-paginated extractor.
//!
//! Listing pages link to `page=jobdetails` URLs and page through
//! `page=joblisting&pg=N`. Titles on the listing are sometimes only a job
//! id or a "Details" label, in which case the detail page is fetched.

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

use super::heuristics::{element_text, row_title, LinkHeuristics};
use super::{ScrapeContext, ScrapeLog, Scraper};
use crate::config::SourceConfig;
use crate::job_type::infer_job_type;
use crate::normalize::{clean_text, is_javascript_href, resolve_url};
use crate::types::{JobPosting, DEFAULT_JOB_TYPE};

lazy_static! {
    static ref LINK: Selector = Selector::parse("a[href]").unwrap();
    static ref TABLE_ROW: Selector = Selector::parse("tr").unwrap();
    static ref CELL: Selector = Selector::parse("th, td").unwrap();
    static ref OG_TITLE: Selector = Selector::parse(r#"meta[property="og:title"]"#).unwrap();
    static ref DOC_TITLE: Selector = Selector::parse("title").unwrap();
    static ref HEADING_SELECTORS: Vec<Selector> = ["h1", "h2", "td.title", ".title"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect();

    static ref JOB_ID_ONLY: Regex = Regex::new(r"(?i)^j\d{4}-\d{4}$").unwrap();
    static ref PAGE_PARAM: Regex = Regex::new(r"(pg|page|pagenum|pagenumber)=\d+").unwrap();
}

/// Marker in an href that identifies a job detail link.
const DETAIL_MARKER: &str = "jobdetail";

/// Query keys that identify a detail page. Everything else (session
/// tokens such as `tbtoken` or `chk`) is dropped before refetching.
const DETAIL_QUERY_KEYS: &[&str] = &["clid", "page", "jobid", "brid", "lang"];

/// Page-number query aliases, in lookup order.
const PAGE_KEYS: &[&str] = &["pg", "page", "pagenum", "pagenumber"];

const DETAIL_LABELS: &[&str] = &["job title", "position title", "title"];

/// A job link found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLink {
    pub title: String,
    pub url: String,
}

fn needs_detail_title(title: &str, heuristics: &LinkHeuristics) -> bool {
    title.is_empty() || heuristics.is_generic(title) || JOB_ID_ONLY.is_match(title)
}

/// Job detail links on one listing page, one per URL.
///
/// When a job is linked more than once (title link plus a "Details" link)
/// the first usable title wins.
pub fn parse_listing_page(doc: &Html, page_url: &str, heuristics: &LinkHeuristics) -> Vec<ListingLink> {
    let mut links: Vec<ListingLink> = Vec::new();

    for anchor in doc.select(&LINK) {
        let href = anchor.value().attr("href").unwrap_or_default().trim();
        if href.is_empty() || is_javascript_href(href) {
            continue;
        }
        if !href.to_lowercase().contains(DETAIL_MARKER) {
            continue;
        }
        let Some(url) = resolve_url(page_url, href) else {
            continue;
        };
        let title = row_title(&anchor, heuristics);

        match links.iter_mut().find(|l| l.url == url) {
            Some(existing) => {
                if needs_detail_title(&existing.title, heuristics) && !needs_detail_title(&title, heuristics) {
                    existing.title = title;
                }
            }
            None => links.push(ListingLink { title, url }),
        }
    }

    links
}

/// Keep only the identifying query keys (case-insensitive), preserving
/// their original spelling and order.
pub fn sanitize_detail_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, v)| !v.is_empty() && DETAIL_QUERY_KEYS.contains(&k.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    parsed.set_query(None);
    if !kept.is_empty() {
        parsed.query_pairs_mut().extend_pairs(kept);
    }
    parsed.to_string()
}

fn usable_detail_text(text: &str, heuristics: &LinkHeuristics) -> Option<String> {
    let text = clean_text(text);
    (!text.is_empty() && !heuristics.is_generic(&text)).then_some(text)
}

fn labelled_row_title(row: ElementRef, heuristics: &LinkHeuristics) -> Option<String> {
    let cells: Vec<ElementRef> = row.select(&CELL).collect();
    if cells.len() < 2 {
        return None;
    }
    let label = element_text(&cells[0]).to_lowercase();
    if !DETAIL_LABELS.contains(&label.as_str()) && !label.contains("job title") {
        return None;
    }
    usable_detail_text(&element_text(&cells[1]), heuristics).filter(|t| !JOB_ID_ONLY.is_match(t))
}

/// Best title on a job detail page.
pub fn extract_detail_title(html: &str, heuristics: &LinkHeuristics) -> Option<String> {
    let doc = Html::parse_document(html);

    for sel in HEADING_SELECTORS.iter() {
        if let Some(el) = doc.select(sel).next() {
            if let Some(title) = usable_detail_text(&element_text(&el), heuristics) {
                return Some(title);
            }
        }
    }

    if let Some(content) = doc.select(&OG_TITLE).next().and_then(|m| m.value().attr("content")) {
        if let Some(title) = usable_detail_text(content, heuristics) {
            return Some(title);
        }
    }

    if let Some(title) = doc.select(&TABLE_ROW).find_map(|row| labelled_row_title(row, heuristics)) {
        return Some(title);
    }

    doc.select(&DOC_TITLE)
        .next()
        .and_then(|t| usable_detail_text(&element_text(&t), heuristics))
}

/// Numeric page parameter of a listing URL. Aliases holding a non-number
/// (`page=joblisting`) are skipped.
fn page_number(url: &str) -> Option<u32> {
    let parsed = Url::parse(url).ok()?;
    PAGE_KEYS.iter().find_map(|key| {
        parsed
            .query_pairs()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .find_map(|(_, v)| v.trim().parse::<u32>().ok())
    })
}

fn is_next_label(text: &str) -> bool {
    text.contains("next") || text == ">" || text == ">>" || text.contains("suivant")
}

/// Next listing page, or `None` when pagination is exhausted.
///
/// An explicit "next" link wins. Otherwise the smallest page number above
/// the current one is taken from the numbered paging links.
pub fn find_next_page_url(current_url: &str, doc: &Html, visited: &HashSet<String>) -> Option<String> {
    let current_page = page_number(current_url);
    let mut numbered: Vec<(u32, String)> = Vec::new();

    for anchor in doc.select(&LINK) {
        let href = anchor.value().attr("href").unwrap_or_default().trim();
        if href.is_empty() || is_javascript_href(href) {
            continue;
        }
        let Some(absolute) = resolve_url(current_url, href) else {
            continue;
        };
        if absolute == current_url || visited.contains(&absolute) {
            continue;
        }

        let text = element_text(&anchor).to_lowercase();
        if is_next_label(&text) {
            return Some(absolute);
        }

        let lower = absolute.to_lowercase();
        if lower.contains("page=joblisting") && PAGE_PARAM.is_match(&lower) {
            if let Some(n) = page_number(&absolute) {
                numbered.push((n, absolute));
            }
        }
    }

    numbered
        .into_iter()
        .filter(|(n, _)| current_page.map_or(true, |current| *n > current))
        .min_by_key(|(n, _)| *n)
        .map(|(_, url)| url)
}

// ============================================
// Scraper
// ============================================

pub struct NjoynScraper {
    source: SourceConfig,
}

impl NjoynScraper {
    pub fn new(source: SourceConfig) -> Self {
        Self { source }
    }

    fn fetch_detail_title(&self, ctx: &ScrapeContext<'_>, log: &ScrapeLog, url: &str) -> Option<String> {
        let detail_url = sanitize_detail_url(url);
        match ctx.fetcher.fetch_text(&detail_url) {
            Ok(html) => extract_detail_title(&html, ctx.heuristics),
            Err(e) => {
                log.debug(format!("detail title lookup failed for {}: {}", detail_url, e));
                None
            }
        }
    }
}

impl Scraper for NjoynScraper {
    fn source(&self) -> &SourceConfig {
        &self.source
    }

    fn scrape(&self, ctx: &ScrapeContext<'_>, log: &mut ScrapeLog) -> Result<Vec<JobPosting>> {
        log.info(format!("Njoyn scrape start ({})", self.source.url));

        let settings = ctx.settings;
        let mut visited: HashSet<String> = HashSet::new();
        let mut next_url = Some(self.source.url.clone());
        let mut pages: u32 = 0;
        let mut budget = settings.enrich_detail_max_requests;
        let mut budget_logged = false;
        let mut postings = Vec::new();

        while let Some(url) = next_url.take() {
            if pages >= settings.max_pages {
                log.warn(format!("Njoyn pagination stopped after {} pages", settings.max_pages));
                break;
            }
            if !visited.insert(url.clone()) {
                break;
            }
            pages += 1;

            let html = ctx.fetcher.fetch_text(&url)?;
            let doc = Html::parse_document(&html);
            let links = parse_listing_page(&doc, &url, ctx.heuristics);
            log.debug(format!("page {}: {} job links", pages, links.len()));

            for link in links {
                let mut title = link.title;

                if settings.enrich_detail_titles && needs_detail_title(&title, ctx.heuristics) {
                    if budget > 0 {
                        budget -= 1;
                        if let Some(found) = self.fetch_detail_title(ctx, log, &link.url) {
                            title = found;
                        }
                    } else if !budget_logged {
                        log.info("detail enrichment budget exhausted");
                        budget_logged = true;
                    }
                }

                if title.is_empty() || ctx.heuristics.is_generic(&title) {
                    continue;
                }

                postings.push(JobPosting {
                    hospital: self.source.hospital.clone(),
                    job_type: infer_job_type(&title, DEFAULT_JOB_TYPE),
                    job_title: title,
                    location: None,
                    url: link.url,
                    date_posted: None,
                });
            }

            next_url = find_next_page_url(&url, &doc, &visited);
        }

        Ok(postings)
    }
}
