//! One full run: scrape every source, filter, diff against the seen set,
//! write outputs, optionally email, then commit state.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{load_config, AppConfig};
use crate::digest::render_jobs_email;
use crate::fetch::{Fetcher, HttpClient, Renderer};
use crate::filter::{filter_by_location, filter_postings};
use crate::notify::{send_html_email, SmtpSettings};
use crate::scrapers::{build_scraper, LinkHeuristics, ScrapeContext, ScrapeLog, Scraper, WebDriverRenderer};
use crate::storage::{sort_postings, write_postings_csv, write_postings_json, write_run_report};
use crate::types::{JobPosting, RunReport, SourceReport, SourceStatus};
use crate::url_state::{dedupe_by_url, merge_seen, partition_new, read_seen_urls, write_seen_urls};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_EMAIL_FAILED: i32 = 2;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub send_email: bool,
    pub email_preview_path: Option<PathBuf>,
    pub update_last_state: bool,
    pub dump_raw: bool,
}

// ============================================
// Source scraping
// ============================================

/// Scrape one source, retrying the whole scrape on failure.
///
/// Never fails: after the last attempt the source is reported as failed
/// and the run carries on with the others.
pub fn scrape_source_with_retry(
    scraper: &dyn Scraper,
    ctx: &ScrapeContext<'_>,
    attempts: u32,
) -> (Vec<JobPosting>, SourceReport) {
    let source = scraper.source();
    let mut log = ScrapeLog::new(&source.hospital);
    let mut last_error: Option<String> = None;
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        match scraper.scrape(ctx, &mut log) {
            Ok(postings) => {
                log.info(format!("scraped {} postings", postings.len()));
                let report = SourceReport {
                    hospital: source.hospital.clone(),
                    platform: source.platform,
                    status: SourceStatus::Ok,
                    attempts: attempt,
                    scraped: postings.len(),
                    kept: postings.len(),
                    error: None,
                    warnings: log.into_warnings(),
                };
                return (postings, report);
            }
            Err(e) => {
                let message = format!("attempt {}: {:#}", attempt, e);
                log::error!("{}: scrape failed ({})", source.hospital, message);
                last_error = Some(message);
            }
        }
    }

    let report = SourceReport {
        hospital: source.hospital.clone(),
        platform: source.platform,
        status: SourceStatus::Failed,
        attempts,
        scraped: 0,
        kept: 0,
        error: last_error,
        warnings: log.into_warnings(),
    };
    (Vec::new(), report)
}

/// Everything scraped in one run.
#[derive(Debug, Default)]
pub struct ScrapeOutcome {
    /// All postings exactly as extracted.
    pub raw: Vec<JobPosting>,
    /// Postings left after each source's location pass.
    pub kept: Vec<JobPosting>,
    pub reports: Vec<SourceReport>,
}

/// Scrape every configured source in order.
pub fn scrape_all(
    config: &AppConfig,
    fetcher: &dyn Fetcher,
    renderer: Option<&dyn Renderer>,
) -> Result<ScrapeOutcome> {
    let heuristics = LinkHeuristics::from_config(&config.scrape.heuristics)?;
    let ctx = ScrapeContext {
        fetcher,
        renderer,
        settings: &config.scrape,
        heuristics: &heuristics,
    };

    let mut outcome = ScrapeOutcome::default();
    for source in &config.hospitals {
        let scraper = build_scraper(source)
            .with_context(|| format!("Cannot build scraper for {}", source.hospital))?;
        let (postings, mut report) = scrape_source_with_retry(scraper.as_ref(), &ctx, config.scrape.retry_attempts);

        outcome.raw.extend(postings.iter().cloned());
        let kept = filter_by_location(postings, source);
        if kept.len() != report.scraped {
            log::info!("{}: {} of {} postings kept by location", source.hospital, kept.len(), report.scraped);
        }
        report.kept = kept.len();
        outcome.kept.extend(kept);
        outcome.reports.push(report);
    }
    Ok(outcome)
}

/// Role filter, then dedup by URL, then the stable output order.
pub fn select_matches(postings: &[JobPosting], config: &AppConfig) -> Vec<JobPosting> {
    let mut matched = dedupe_by_url(filter_postings(postings, &config.role));
    sort_postings(&mut matched);
    matched
}

// ============================================
// Run
// ============================================

fn commit_state(config: &AppConfig, matched: &[JobPosting]) -> Result<()> {
    let seen_path = config.output.path(&config.output.seen_urls);
    let seen = read_seen_urls(&seen_path);
    write_postings_json(&config.output.path(&config.output.last_json), matched)?;
    write_seen_urls(&seen_path, &merge_seen(&seen, matched))?;
    Ok(())
}

fn write_preview(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    fs::write(path, html).with_context(|| format!("Failed to write email preview to {:?}", path))?;
    log::info!("Wrote email preview to {:?}", path);
    Ok(())
}

/// Load the config, build the HTTP client and renderer, and run once.
pub fn run(config_path: &Path, options: &RunOptions) -> Result<i32> {
    let config = load_config(config_path)?;
    let http = HttpClient::new(&config.scrape).context("Failed to build HTTP client")?;

    let renderer = if config.scrape.use_browser {
        match WebDriverRenderer::new(&config.scrape) {
            Ok(r) => Some(r),
            Err(e) => {
                log::warn!("Browser rendering disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    run_with(&config, options, &http, renderer.as_ref().map(|r| r as &dyn Renderer))
}

/// One run against the given fetch layer. Returns the process exit code.
pub fn run_with(
    config: &AppConfig,
    options: &RunOptions,
    fetcher: &dyn Fetcher,
    renderer: Option<&dyn Renderer>,
) -> Result<i32> {
    let started = Local::now();
    let mut report = RunReport {
        started_at: started.to_rfc3339(),
        ..Default::default()
    };

    fs::create_dir_all(&config.output.dir)
        .with_context(|| format!("Failed to create output directory {:?}", config.output.dir))?;

    let outcome = scrape_all(config, fetcher, renderer)?;
    report.sources = outcome.reports;
    report.total_scraped = outcome.raw.len();

    if options.dump_raw {
        let raw_path = config.output.path(&config.output.raw_json);
        write_postings_json(&raw_path, &outcome.raw)?;
        log::info!("Wrote {} raw postings to {:?}", outcome.raw.len(), raw_path);
    }

    let matched = select_matches(&outcome.kept, config);
    write_postings_json(&config.output.path(&config.output.json), &matched)?;
    write_postings_csv(&config.output.path(&config.output.csv), &matched)?;

    let seen = read_seen_urls(&config.output.path(&config.output.seen_urls));
    let new_jobs = partition_new(&matched, &seen);
    report.matched = matched.len();
    report.new = new_jobs.len();

    let failures = report.failures();
    let (subject, html) = render_jobs_email(
        &config.email.subject_title,
        started.naive_local(),
        &new_jobs,
        config.email.include_all_results.then_some(matched.as_slice()),
        Some(failures.as_slice()),
    );

    if let Some(path) = &options.email_preview_path {
        write_preview(path, &html)?;
    }

    let mut exit_code = EXIT_OK;
    if options.send_email {
        let sent = SmtpSettings::from_env().and_then(|smtp| send_html_email(&smtp, &subject, &html));
        match sent {
            Ok(()) => {
                report.email_sent = true;
                commit_state(config, &matched)?;
                report.state_updated = true;
            }
            Err(e) => {
                log::error!("Email send failed: {:#}", e);
                exit_code = EXIT_EMAIL_FAILED;
            }
        }
    } else if options.update_last_state {
        commit_state(config, &matched)?;
        report.state_updated = true;
        log::info!("Updated seen state without sending email");
    } else {
        log::info!("Email skipped (use --send-email). Seen state not updated.");
    }

    report.finished_at = Some(Local::now().to_rfc3339());
    write_run_report(&config.output.path(&config.output.run_report), &report)?;

    log::info!(
        "Done. Scraped={} Matched={} New={} Failures={}",
        report.total_scraped,
        report.matched,
        report.new,
        failures.len()
    );
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::fetch::{FetchError, FetchResult};
    use crate::types::PlatformType;
    use serde_json::Value;
    use std::cell::Cell;

    struct FlakyScraper {
        source: SourceConfig,
        failures_left: Cell<u32>,
    }

    impl Scraper for FlakyScraper {
        fn source(&self) -> &SourceConfig {
            &self.source
        }

        fn scrape(&self, _ctx: &ScrapeContext<'_>, log: &mut ScrapeLog) -> Result<Vec<JobPosting>> {
            let left = self.failures_left.get();
            if left > 0 {
                self.failures_left.set(left - 1);
                log.warn("flaky");
                anyhow::bail!("boom");
            }
            Ok(vec![JobPosting {
                hospital: self.source.hospital.clone(),
                job_title: "RN".to_string(),
                location: None,
                url: "u".to_string(),
                date_posted: None,
                job_type: "Full-Time Permanent".to_string(),
            }])
        }
    }

    struct NoFetch;

    impl Fetcher for NoFetch {
        fn fetch_text(&self, url: &str) -> FetchResult<String> {
            Err(FetchError::Decode { url: url.to_string(), message: "offline".to_string() })
        }

        fn fetch_json(&self, url: &str, _payload: &Value, _headers: &[(&str, &str)]) -> FetchResult<Value> {
            Err(FetchError::Decode { url: url.to_string(), message: "offline".to_string() })
        }
    }

    fn flaky(failures: u32) -> FlakyScraper {
        FlakyScraper {
            source: SourceConfig {
                hospital: "H".to_string(),
                platform: PlatformType::Njoyn,
                url: "https://x".to_string(),
                location_include_any_of: vec![],
            },
            failures_left: Cell::new(failures),
        }
    }

    fn with_ctx<T>(f: impl FnOnce(&ScrapeContext<'_>) -> T) -> T {
        let settings = crate::config::ScrapeConfig::default();
        let heuristics = LinkHeuristics::default();
        let ctx = ScrapeContext {
            fetcher: &NoFetch,
            renderer: None,
            settings: &settings,
            heuristics: &heuristics,
        };
        f(&ctx)
    }

    #[test]
    fn test_retry_recovers() {
        let scraper = flaky(1);
        let (postings, report) = with_ctx(|ctx| scrape_source_with_retry(&scraper, ctx, 2));
        assert_eq!(postings.len(), 1);
        assert_eq!(report.status, SourceStatus::Ok);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.warnings, vec!["flaky"]);
    }

    #[test]
    fn test_retry_exhausted_records_failure() {
        let scraper = flaky(5);
        let (postings, report) = with_ctx(|ctx| scrape_source_with_retry(&scraper, ctx, 2));
        assert!(postings.is_empty());
        assert_eq!(report.status, SourceStatus::Failed);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.error.as_deref(), Some("attempt 2: boom"));
    }
}
