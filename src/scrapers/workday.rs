//! Workday-family extractor.
//!
//! Workday career sites expose a JSON search endpoint at
//! `{host}/wday/cxs/{tenant}/{site}/jobs`, paged with `limit`/`offset`.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde_json::{json, Value};
use url::Url;

use super::{ScrapeContext, ScrapeLog, Scraper};
use crate::config::SourceConfig;
use crate::job_type::infer_job_type;
use crate::normalize::{clean_text, resolve_url};
use crate::types::{JobPosting, DEFAULT_JOB_TYPE};

/// Where a Workday site lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkdaySite {
    /// `scheme://netloc`
    pub host: String,
    pub tenant: String,
    pub site: String,
}

impl WorkdaySite {
    pub fn endpoint(&self) -> String {
        format!("{}/wday/cxs/{}/{}/jobs", self.host, self.tenant, self.site)
    }

    /// Public detail page for an `externalPath` from the search API.
    pub fn details_url(&self, external_path: &str) -> String {
        let path = external_path.trim();
        let site_segment = format!("/{}/", self.site);
        if path.contains("/details/") || path.contains(&site_segment) {
            return resolve_url(&self.host, path).unwrap_or_else(|| format!("{}{}", self.host, path));
        }

        let slug = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        format!("{}/en-US/{}/details/{}", self.host, self.site, slug)
    }
}

/// Locale path segments look like `en-US` or `fr-CA`.
fn is_locale_segment(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 5
        && bytes[2] == b'-'
        && bytes[..2].iter().all(u8::is_ascii_lowercase)
        && bytes[3..].iter().all(u8::is_ascii_uppercase)
}

/// Split a Workday listing URL into host, tenant and site.
pub fn parse_workday_site(url: &str) -> Result<WorkdaySite> {
    let parsed = Url::parse(url.trim()).map_err(|e| anyhow!("Invalid Workday URL {:?}: {}", url, e))?;
    let netloc = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Workday URL has no host: {}", url))?;

    let host = match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), netloc, port),
        None => format!("{}://{}", parsed.scheme(), netloc),
    };

    let parts: Vec<&str> = parsed
        .path_segments()
        .map(|segs| segs.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let site = match parts.as_slice() {
        [first, second, ..] if is_locale_segment(first) => *second,
        [first, ..] if !is_locale_segment(first) => *first,
        _ => return Err(anyhow!("Cannot infer Workday site from URL: {}", url)),
    };

    let tenant = netloc.split('.').next().unwrap_or(netloc);

    Ok(WorkdaySite {
        host,
        tenant: tenant.to_string(),
        site: site.to_string(),
    })
}

/// Accept only ISO-like `YYYY-MM-DD...` values. Relative phrases such as
/// "Posted 3 Days Ago" yield no date.
pub fn parse_posted_on(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    let bytes = s.as_bytes();
    if bytes.len() < 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

/// One decoded search page.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkdayPage {
    pub postings: Vec<JobPosting>,
    /// Raw item count, including items that were dropped.
    pub item_count: usize,
    pub total: Option<i64>,
}

/// Decode a search response. `None` means there is nothing more to read.
pub fn parse_workday_page(site: &WorkdaySite, hospital: &str, data: &Value) -> Option<WorkdayPage> {
    let items = data.get("jobPostings")?.as_array()?;
    if items.is_empty() {
        return None;
    }

    let postings = items
        .iter()
        .filter_map(|item| {
            let title = clean_text(item.get("title")?.as_str()?);
            let external_path = item.get("externalPath")?.as_str()?.trim();
            if title.is_empty() || external_path.is_empty() {
                return None;
            }
            let location = item
                .get("locationsText")
                .and_then(Value::as_str)
                .map(clean_text)
                .filter(|s| !s.is_empty());

            Some(JobPosting {
                hospital: hospital.to_string(),
                job_type: infer_job_type(&title, DEFAULT_JOB_TYPE),
                job_title: title,
                location,
                url: site.details_url(external_path),
                date_posted: item.get("postedOn").and_then(parse_posted_on),
            })
        })
        .collect();

    Some(WorkdayPage {
        postings,
        item_count: items.len(),
        total: data.get("total").and_then(Value::as_i64),
    })
}

pub struct WorkdayScraper {
    source: SourceConfig,
    site: WorkdaySite,
}

impl WorkdayScraper {
    pub fn new(source: SourceConfig) -> Result<Self> {
        let site = parse_workday_site(&source.url)?;
        Ok(Self { source, site })
    }

    fn scrape_api(&self, ctx: &ScrapeContext<'_>, log: &mut ScrapeLog) -> Result<Vec<JobPosting>> {
        let endpoint = self.site.endpoint();
        let limit = ctx.settings.workday_page_size.max(1);
        let max_pages = ctx.settings.max_pages;
        let headers = [("Accept", "application/json")];

        log.info(format!("Workday scrape start ({})", endpoint));

        let mut results = Vec::new();
        let mut offset: u64 = 0;
        let mut pages: u32 = 0;
        let mut known_total: Option<u64> = None;

        loop {
            pages += 1;
            if pages > max_pages {
                log.warn(format!("Workday pagination stopped after {} pages", max_pages));
                break;
            }

            let payload = json!({
                "appliedFacets": {},
                "limit": limit,
                "offset": offset,
                "searchText": ctx.settings.workday_search_text,
            });
            let data = ctx.fetcher.fetch_json(&endpoint, &payload, &headers)?;

            let Some(page) = parse_workday_page(&self.site, &self.source.hospital, &data) else {
                break;
            };
            log.debug(format!(
                "offset {}: {} items, {} usable, total {:?}",
                offset,
                page.item_count,
                page.postings.len(),
                page.total
            ));
            results.extend(page.postings);

            offset += u64::from(limit);

            // Some tenants report total=0 on later pages.
            let page_total = page.total.filter(|t| *t > 0).map(|t| t as u64);
            if let Some(total) = page_total {
                known_total = Some(total);
            }

            if let Some(total) = known_total {
                if offset >= total {
                    break;
                }
            }
            if page_total.is_none() && page.item_count < limit as usize {
                break;
            }
        }

        Ok(results)
    }

    fn scrape_rendered(&self, ctx: &ScrapeContext<'_>, log: &mut ScrapeLog) -> Result<Option<Vec<JobPosting>>> {
        let Some(renderer) = ctx.renderer.filter(|_| ctx.settings.use_browser) else {
            return Ok(None);
        };

        let links = renderer.render_and_collect_links(&self.source.url, ctx.settings.browser_max_iterations)?;
        log.info(format!("Browser fallback collected {} links", links.len()));

        let postings = links
            .into_iter()
            .filter_map(|(title, href)| {
                let title = clean_text(&title);
                if title.is_empty() {
                    return None;
                }
                let url = resolve_url(&self.source.url, &href)?;
                Some(JobPosting {
                    hospital: self.source.hospital.clone(),
                    job_type: infer_job_type(&title, DEFAULT_JOB_TYPE),
                    job_title: title,
                    location: None,
                    url,
                    date_posted: None,
                })
            })
            .collect();

        Ok(Some(postings))
    }
}

impl Scraper for WorkdayScraper {
    fn source(&self) -> &SourceConfig {
        &self.source
    }

    fn scrape(&self, ctx: &ScrapeContext<'_>, log: &mut ScrapeLog) -> Result<Vec<JobPosting>> {
        match self.scrape_api(ctx, log) {
            Ok(postings) => Ok(postings),
            Err(api_err) => {
                log.warn(format!("Workday API failed: {}", api_err));
                match self.scrape_rendered(ctx, log)? {
                    Some(postings) => Ok(postings),
                    None => Err(api_err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shn() -> WorkdaySite {
        parse_workday_site("https://shn.wd10.myworkdayjobs.com/SHN_External_Career_Site").unwrap()
    }

    #[test]
    fn test_parse_site_with_locale() {
        let site = parse_workday_site("https://oakvalleyhealth.wd10.myworkdayjobs.com/en-US/OakValleyHealth").unwrap();
        assert_eq!(site.host, "https://oakvalleyhealth.wd10.myworkdayjobs.com");
        assert_eq!(site.tenant, "oakvalleyhealth");
        assert_eq!(site.site, "OakValleyHealth");
        assert_eq!(
            site.endpoint(),
            "https://oakvalleyhealth.wd10.myworkdayjobs.com/wday/cxs/oakvalleyhealth/OakValleyHealth/jobs"
        );
    }

    #[test]
    fn test_parse_site_without_locale() {
        let site = shn();
        assert_eq!(site.host, "https://shn.wd10.myworkdayjobs.com");
        assert_eq!(site.tenant, "shn");
        assert_eq!(site.site, "SHN_External_Career_Site");
    }

    #[test]
    fn test_parse_site_requires_path() {
        assert!(parse_workday_site("https://shn.wd10.myworkdayjobs.com/").is_err());
        assert!(parse_workday_site("https://shn.wd10.myworkdayjobs.com/fr-CA").is_err());
        assert!(parse_workday_site("not a url").is_err());
    }

    #[test]
    fn test_details_url_from_job_path() {
        assert_eq!(
            shn().details_url("/job/Centenary-Hospital/Registered-Nurse---9W-Medicine--CEN-_JR104721"),
            "https://shn.wd10.myworkdayjobs.com/en-US/SHN_External_Career_Site/details/Registered-Nurse---9W-Medicine--CEN-_JR104721"
        );
    }

    #[test]
    fn test_details_url_kept_when_canonical() {
        assert_eq!(
            shn().details_url("/en-US/SHN_External_Career_Site/details/RN_JR1"),
            "https://shn.wd10.myworkdayjobs.com/en-US/SHN_External_Career_Site/details/RN_JR1"
        );
        assert_eq!(
            shn().details_url("/SHN_External_Career_Site/job/Scarborough/RN_JR2"),
            "https://shn.wd10.myworkdayjobs.com/SHN_External_Career_Site/job/Scarborough/RN_JR2"
        );
    }

    #[test]
    fn test_parse_posted_on() {
        assert_eq!(parse_posted_on(&json!("2025-12-20")), NaiveDate::from_ymd_opt(2025, 12, 20));
        assert_eq!(parse_posted_on(&json!("2025-12-20T10:00:00Z")), NaiveDate::from_ymd_opt(2025, 12, 20));
        assert_eq!(parse_posted_on(&json!("Posted 3 Days Ago")), None);
        assert_eq!(parse_posted_on(&json!("2025-13-40")), None);
        assert_eq!(parse_posted_on(&json!(20251220)), None);
        assert_eq!(parse_posted_on(&Value::Null), None);
    }

    #[test]
    fn test_parse_page_drops_incomplete_items() {
        let data = json!({
            "total": 3,
            "jobPostings": [
                {"title": "Registered Nurse - OR - PTT(J1)", "externalPath": "/job/A/RN_JR1", "locationsText": " Scarborough ", "postedOn": "2025-12-01"},
                {"title": "", "externalPath": "/job/A/X_JR2"},
                {"title": "Clerk", "externalPath": "  "},
                "garbage"
            ]
        });
        let page = parse_workday_page(&shn(), "SHN", &data).unwrap();
        assert_eq!(page.item_count, 4);
        assert_eq!(page.total, Some(3));
        assert_eq!(page.postings.len(), 1);
        let p = &page.postings[0];
        assert_eq!(p.location.as_deref(), Some("Scarborough"));
        assert_eq!(p.job_type, "Part-Time");
        assert_eq!(p.date_posted, NaiveDate::from_ymd_opt(2025, 12, 1));
    }

    #[test]
    fn test_parse_page_end_markers() {
        assert!(parse_workday_page(&shn(), "SHN", &json!({"jobPostings": []})).is_none());
        assert!(parse_workday_page(&shn(), "SHN", &json!({"jobPostings": {}})).is_none());
        assert!(parse_workday_page(&shn(), "SHN", &json!({"total": 5})).is_none());
    }
}
