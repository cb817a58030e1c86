use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::{StreamExt, future};
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, ORIGIN, REFERER};
use serde::Serialize;

use crate::parser::{ParseError, parse_organization, parse_report, parse_search_page};
use crate::pipeline::DedupPipeline;
use crate::sink::{RecordSink, SinkError};
use crate::types::{Organization, Report, SearchResult};
use crate::utils::CrawlStats;

pub const DEFAULT_MAX_PAGE: u32 = 5;
const PAGE_LENGTH: u32 = 10;
const CSRF_COOKIE: &str = "csrftoken";

// The search endpoint rejects non-browser requests; these values must stay in
// step with what the site serves to a real browser.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/74.0.3729.169 Safari/537.36";
const ACCEPT_LANGUAGE_VALUE: &str = "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7,de-DE;q=0.6,de;q=0.5";

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Failed to encode search body: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("No csrftoken cookie set after session bootstrap")]
    MissingCsrfToken,
}

/// Search filters carried in every POST body. All empty by default, which is
/// the unfiltered search the site's own page issues.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchFilters {
    pub q: String,
    pub sizes: Vec<String>,
    pub sectors: Vec<String>,
    pub countries: Vec<String>,
    pub regions: Vec<String>,
    pub years: Vec<String>,
    pub types: Vec<String>,
}

#[derive(Serialize)]
struct SearchBody<'a> {
    filters: &'a SearchFilters,
    dt: DataTableRequest,
}

#[derive(Serialize)]
struct DataTableRequest {
    draw: u32,
    columns: Vec<Column>,
    order: Vec<Order>,
    start: u32,
    length: u32,
    search: SearchTerm,
}

#[derive(Serialize)]
struct Column {
    data: u32,
    name: String,
    searchable: bool,
    orderable: bool,
    search: SearchTerm,
}

#[derive(Serialize)]
struct Order {
    column: u32,
    dir: String,
}

#[derive(Serialize, Default)]
struct SearchTerm {
    value: String,
    regex: bool,
}

/// POST body for one search page: the draw counter equals the page number and
/// the row offset advances in steps of [`PAGE_LENGTH`]. Column 5 (the report
/// list) is the only non-orderable column.
fn search_body(filters: &SearchFilters, page: u32) -> SearchBody<'_> {
    SearchBody {
        filters,
        dt: DataTableRequest {
            draw: page,
            columns: (0..6)
                .map(|i| Column {
                    data: i,
                    name: String::new(),
                    searchable: false,
                    orderable: i != 5,
                    search: SearchTerm::default(),
                })
                .collect(),
            order: vec![Order {
                column: 0,
                dir: "asc".to_string(),
            }],
            start: PAGE_LENGTH * (page - 1),
            length: PAGE_LENGTH,
            search: SearchTerm::default(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
    base_url: String,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_base_url(crate::BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Primes the session with a GET against the search landing page and
    /// returns the anti-forgery token the server sets as a cookie. Every
    /// subsequent POST must carry the token as both cookie and header.
    pub async fn bootstrap(&self) -> Result<String, ScraperError> {
        let url = format!("{}/search", self.base_url);
        log::info!("Priming session against {}...", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?;

        response
            .cookies()
            .find(|cookie| cookie.name() == CSRF_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or(ScraperError::MissingCsrfToken)
    }

    pub async fn fetch_search_page(
        &self,
        csrf: &str,
        filters: &SearchFilters,
        page: u32,
    ) -> Result<Vec<SearchResult>, ScraperError> {
        let url = format!("{}/search/ajax/", self.base_url);
        let body = serde_json::to_string(&search_body(filters, page))?;
        log::info!("Fetching search page {}...", page);

        let text = self
            .client
            .post(&url)
            .header(ORIGIN, self.base_url.as_str())
            // the endpoint expects this content type even though the body is JSON
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded; charset=UTF-8")
            .header(ACCEPT, "*/*")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("X-CSRFToken", csrf)
            .header(REFERER, format!("{}/search/", self.base_url))
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .header(COOKIE, format!("{}={}", CSRF_COOKIE, csrf))
            .body(body)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;

        Ok(parse_search_page(&text)?)
    }

    async fn get_html(&self, url: &str) -> Result<String, ScraperError> {
        Ok(self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }

    pub async fn fetch_organization(&self, org_id: &str) -> Result<Organization, ScraperError> {
        let url = format!("{}/organizations/{}/", self.base_url, org_id);
        log::info!("Fetching organization {}...", org_id);
        let html = self.get_html(&url).await?;
        Ok(parse_organization(&html, org_id)?)
    }

    pub async fn fetch_report(&self, report_id: &str) -> Result<Report, ScraperError> {
        let url = format!("{}/reports/{}/", self.base_url, report_id);
        log::info!("Fetching report {}...", report_id);
        let html = self.get_html(&url).await?;
        Ok(parse_report(&html, report_id)?)
    }

    /// Runs the full crawl: bootstrap once, then fetch search pages 1..=
    /// `max_page` strictly in order. Each page's organization and report
    /// detail fetches run concurrently with each other; a failed detail fetch
    /// loses that item only. Records pass through the dedup pipeline before
    /// reaching the sink.
    pub async fn crawl(
        &self,
        max_page: u32,
        filters: &SearchFilters,
        pipeline: &mut DedupPipeline,
        sink: &mut dyn RecordSink,
    ) -> Result<CrawlStats, ScraperError> {
        let csrf = self.bootstrap().await?;
        let mut stats = CrawlStats::default();

        // flush even when a page fails mid-run, so partial crawls persist
        let result = self
            .crawl_pages(&csrf, max_page, filters, pipeline, sink, &mut stats)
            .await;
        sink.flush()?;
        result.map(|()| stats)
    }

    async fn crawl_pages(
        &self,
        csrf: &str,
        max_page: u32,
        filters: &SearchFilters,
        pipeline: &mut DedupPipeline,
        sink: &mut dyn RecordSink,
        stats: &mut CrawlStats,
    ) -> Result<(), ScraperError> {
        for page in 1..=max_page {
            let rows = self.fetch_search_page(csrf, filters, page).await?;
            stats.pages += 1;

            let mut org_futs: FuturesUnordered<_> = rows
                .iter()
                .map(|row| self.fetch_organization(&row.org_id))
                .collect();
            let mut report_futs: FuturesUnordered<_> = rows
                .iter()
                .flat_map(|row| row.reports.iter())
                .map(|report_id| self.fetch_report(report_id))
                .collect();

            let (organizations, reports) = future::join(
                async {
                    let mut all = Vec::new();
                    while let Some(result) = org_futs.next().await {
                        match result {
                            Ok(org) => all.push(org),
                            Err(e) => log::warn!("Organization fetch failed: {}", e),
                        }
                    }
                    all
                },
                async {
                    let mut all = Vec::new();
                    while let Some(result) = report_futs.next().await {
                        match result {
                            Ok(report) => all.push(report),
                            Err(e) => log::warn!("Report fetch failed: {}", e),
                        }
                    }
                    all
                },
            )
            .await;

            for row in &rows {
                sink.write_search(row)?;
                stats.search_results += 1;
            }
            for org in organizations {
                match pipeline.process_organization(org) {
                    Ok(org) => {
                        sink.write_organization(&org)?;
                        stats.organizations += 1;
                    }
                    Err(dup) => {
                        log::info!("{}", dup);
                        stats.duplicates += 1;
                    }
                }
            }
            for report in reports {
                match pipeline.process_report(report) {
                    Ok(report) => {
                        sink.write_report(&report)?;
                        stats.reports += 1;
                    }
                    Err(dup) => {
                        log::info!("{}", dup);
                        stats.duplicates += 1;
                    }
                }
            }
        }

        Ok(())
    }
}
