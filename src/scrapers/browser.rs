//! Browser rendering through a WebDriver endpoint (chromedriver).
//!
//! thirtyfour is async; the rest of the crate is blocking, so every call
//! runs on a private current-thread runtime.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use thirtyfour::prelude::*;
use tokio::runtime::{Builder, Runtime};

use super::heuristics::element_text;
use crate::config::ScrapeConfig;
use crate::fetch::{FetchError, FetchResult, Renderer};

const SELECT_SETTLE: Duration = Duration::from_millis(500);
const CLICK_SETTLE: Duration = Duration::from_millis(700);
const JS_RENDER_WAIT: Duration = Duration::from_secs(2);

const MORE_PATTERNS: &[&str] = &["view more rows", "more rows", "show more", "load more", "view more"];

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

lazy_static! {
    static ref JOB_TITLE_LINK: Selector = Selector::parse("a[data-automation-id='jobTitle']").unwrap();
    static ref FIRST_NUMBER: Regex = Regex::new(r"(\d+)").unwrap();
}

fn lower_text_contains(expr: &str, needle: &str) -> String {
    format!("contains(translate({}, '{}', '{}'), '{}')", expr, UPPER, LOWER, needle)
}

fn button_xpath(pattern: &str) -> String {
    let cond = lower_text_contains("normalize-space(.)", pattern);
    format!("//button[{c}] | //*[@role='button'][{c}] | //input[@type='button' or @type='submit'][{v}]",
        c = cond,
        v = lower_text_contains("@value", pattern))
}

fn any_text_xpath(pattern: &str) -> String {
    format!(
        "//*[self::a or self::span or self::div or self::li or self::td][{}][not(*[{}])]",
        lower_text_contains("normalize-space(.)", pattern),
        lower_text_contains("normalize-space(.)", pattern)
    )
}

fn search_submit_xpath() -> String {
    format!(
        "//input[@type='submit'][{}] | //button[@type='submit'][{}]",
        lower_text_contains("@value", "search"),
        lower_text_contains("normalize-space(.)", "search")
    )
}

pub struct WebDriverRenderer {
    webdriver_url: String,
    page_load_timeout: Duration,
    /// Upper bound on "show more" clicks when expanding rows.
    expand_rounds: u32,
    runtime: Runtime,
}

impl WebDriverRenderer {
    pub fn new(config: &ScrapeConfig) -> FetchResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| FetchError::RendererUnavailable(format!("cannot start runtime: {}", e)))?;

        Ok(Self {
            webdriver_url: config.webdriver_url.clone(),
            page_load_timeout: Duration::from_millis(config.timeout_seconds * 1000),
            expand_rounds: config.browser_max_iterations.max(1),
            runtime,
        })
    }

    async fn connect(&self) -> FetchResult<WebDriver> {
        let mut caps = DesiredCapabilities::chrome();
        caps.add_chrome_option(
            "args",
            vec![
                "--headless=new",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--window-size=1920,1080",
            ],
        )
        .map_err(|e| FetchError::RendererUnavailable(e.to_string()))?;

        let driver = WebDriver::new(&self.webdriver_url, caps)
            .await
            .map_err(|e| FetchError::RendererUnavailable(format!("{} ({})", e, self.webdriver_url)))?;

        if let Err(e) = driver.set_page_load_timeout(self.page_load_timeout).await {
            log::debug!("Could not set page load timeout: {}", e);
        }
        Ok(driver)
    }

    /// Open a session, run `work`, and always close the session.
    async fn with_session<T, F, Fut>(&self, url: &str, work: F) -> FetchResult<T>
    where
        F: FnOnce(WebDriver) -> Fut,
        Fut: std::future::Future<Output = WebDriverResult<T>>,
    {
        let driver = self.connect().await?;
        let handle = driver.clone();

        let result = async {
            driver.goto(url).await?;
            driver.query(By::Tag("body")).first().await?;
            tokio::time::sleep(JS_RENDER_WAIT).await;
            work(driver).await
        }
        .await;

        if let Err(e) = handle.quit().await {
            log::warn!("Failed to quit browser session: {}", e);
        }

        result.map_err(|e| FetchError::Render {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl Renderer for WebDriverRenderer {
    fn render_page(&self, url: &str, expand_rows: bool) -> FetchResult<String> {
        let rounds = self.expand_rounds;
        self.runtime.block_on(self.with_session(url, |driver| async move {
            if expand_rows {
                expand_listing(&driver, rounds).await;
            }
            driver.source().await
        }))
    }

    fn render_and_collect_links(&self, url: &str, max_iterations: u32) -> FetchResult<Vec<(String, String)>> {
        self.runtime.block_on(self.with_session(url, |driver| async move {
            let mut seen: HashSet<String> = HashSet::new();
            let mut links: Vec<(String, String)> = Vec::new();

            for round in 0..max_iterations.max(1) {
                let source = driver.source().await?;
                let added = collect_job_links(&source, &mut seen, &mut links);

                scroll_to_bottom(&driver).await;
                let clicked = click_more_once(&driver).await;
                log::debug!("render round {}: {} new links, clicked more: {}", round + 1, added, clicked);

                if added == 0 && !clicked && round > 0 {
                    break;
                }
            }

            let source = driver.source().await?;
            collect_job_links(&source, &mut seen, &mut links);
            Ok(links)
        }))
    }
}

/// Append unseen `(title, href)` job-title links from `html`. Returns how
/// many were added.
fn collect_job_links(html: &str, seen: &mut HashSet<String>, links: &mut Vec<(String, String)>) -> usize {
    let doc = Html::parse_document(html);
    let before = links.len();
    for anchor in doc.select(&JOB_TITLE_LINK) {
        let Some(href) = anchor.value().attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
            continue;
        };
        let title = element_text(&anchor);
        if title.is_empty() || !seen.insert(href.to_string()) {
            continue;
        }
        links.push((title, href.to_string()));
    }
    links.len() - before
}

// ============================================
// Best-effort expansion steps
// ============================================

async fn expand_listing(driver: &WebDriver, max_rounds: u32) {
    select_largest_page_size(driver).await;
    if click_search_submit(driver).await {
        tokio::time::sleep(CLICK_SETTLE).await;
    }
    for _ in 0..max_rounds {
        if !click_more_once(driver).await {
            break;
        }
    }
}

/// Pick the largest numeric option in every `<select>` (rows per page).
async fn select_largest_page_size(driver: &WebDriver) -> bool {
    let Ok(selects) = driver.find_all(By::Tag("select")).await else {
        return false;
    };

    let mut changed = false;
    for select in selects {
        let Ok(options) = select.find_all(By::Tag("option")).await else {
            continue;
        };

        let mut best: Option<(u64, WebElement)> = None;
        for option in options {
            let Ok(text) = option.text().await else {
                continue;
            };
            let Some(n) = FIRST_NUMBER.captures(&text).and_then(|c| c[1].parse::<u64>().ok()) else {
                continue;
            };
            if best.as_ref().map_or(true, |(b, _)| n > *b) {
                best = Some((n, option));
            }
        }

        if let Some((_, option)) = best {
            if option.click().await.is_ok() {
                changed = true;
                tokio::time::sleep(SELECT_SETTLE).await;
            }
        }
    }
    changed
}

async fn click_search_submit(driver: &WebDriver) -> bool {
    click_first_visible(driver, &search_submit_xpath()).await
}

/// One round over the "more" patterns: buttons first, then any text.
async fn click_more_once(driver: &WebDriver) -> bool {
    for pattern in MORE_PATTERNS {
        if click_first_visible(driver, &button_xpath(pattern)).await
            || click_first_visible(driver, &any_text_xpath(pattern)).await
        {
            tokio::time::sleep(CLICK_SETTLE).await;
            return true;
        }
    }
    false
}

async fn click_first_visible(driver: &WebDriver, xpath: &str) -> bool {
    let Ok(elements) = driver.find_all(By::XPath(xpath)).await else {
        return false;
    };
    for element in elements {
        if !element.is_displayed().await.unwrap_or(false) {
            continue;
        }
        if element.click().await.is_ok() {
            return true;
        }
    }
    false
}

async fn scroll_to_bottom(driver: &WebDriver) {
    if let Err(e) = driver
        .execute("window.scrollTo(0, document.body.scrollHeight);", Vec::new())
        .await
    {
        log::debug!("scroll failed: {}", e);
    }
}
