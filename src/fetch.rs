use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, RANGE, UPGRADE_INSECURE_REQUESTS,
    USER_AGENT,
};
use url::Url;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Bytes requested by a probe GET.
pub const PROBE_RANGE_BYTES: usize = 1024;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub page_timeout: Duration,
    pub markdown_timeout: Duration,
    pub probe_timeout: Duration,
    pub max_attempts: u32,
    /// Attempt `n` waits `n * retry_base_delay` before the next one.
    pub retry_base_delay: Duration,
    pub max_redirects: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(30),
            markdown_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            max_redirects: 10,
        }
    }
}

/// A response body together with the headers the crawler cares about.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: Url,
    pub content_type: Option<String>,
    pub body: String,
}

/// Headers of a probe response. `body` is `None` for HEAD.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    options: FetchOptions,
}

impl Fetcher {
    pub fn new(options: FetchOptions) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(browser_headers())
            .timeout(options.page_timeout)
            .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
            .build()
            .context("build http client")?;

        Ok(Self { client, options })
    }

    /// GETs a page, retrying transient failures with linear backoff.
    pub async fn fetch_page(&self, url: &Url) -> anyhow::Result<Fetched> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 0_u32;

        loop {
            attempt += 1;
            match self.get_once(url, self.options.page_timeout).await {
                Ok(fetched) => return Ok(fetched),
                Err(err) if attempt < max_attempts => {
                    let backoff = self.options.retry_base_delay * attempt;
                    tracing::warn!(
                        %url,
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        err = %format!("{err:#}"),
                        "fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("fetch {url} failed after {attempt} attempts"));
                }
            }
        }
    }

    /// Single GET with the longer markdown timeout. Not retried.
    pub async fn fetch_markdown(&self, url: &Url) -> anyhow::Result<Fetched> {
        self.get_once(url, self.options.markdown_timeout).await
    }

    pub async fn head(&self, url: &Url) -> anyhow::Result<ProbeResponse> {
        let response = self
            .client
            .head(url.clone())
            .timeout(self.options.probe_timeout)
            .send()
            .await
            .with_context(|| format!("HEAD {url}"))?;

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            content_type: content_type(response.headers()),
            body: None,
        })
    }

    /// GET asking for the first [`PROBE_RANGE_BYTES`] only. Servers that
    /// ignore `Range` are truncated locally.
    pub async fn get_range(&self, url: &Url) -> anyhow::Result<ProbeResponse> {
        let response = self
            .client
            .get(url.clone())
            .header(RANGE, format!("bytes=0-{}", PROBE_RANGE_BYTES - 1))
            .timeout(self.options.probe_timeout)
            .send()
            .await
            .with_context(|| format!("GET {url} (range)"))?;

        let status = response.status().as_u16();
        let content_type = content_type(response.headers());
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("read body: {url}"))?;
        let head = &bytes[..bytes.len().min(PROBE_RANGE_BYTES)];

        Ok(ProbeResponse {
            status,
            content_type,
            body: Some(String::from_utf8_lossy(head).into_owned()),
        })
    }

    async fn get_once(&self, url: &Url, timeout: Duration) -> anyhow::Result<Fetched> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            anyhow::bail!("GET {url} returned status {status}");
        }

        let final_url = response.url().clone();
        let content_type = content_type(response.headers());
        let body = response
            .text()
            .await
            .with_context(|| format!("read body: {url}"))?;

        Ok(Fetched {
            url: final_url,
            content_type,
            body,
        })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,text/markdown;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
}

/// `true` when the content type names an HTML document.
pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
}

/// `true` when a body starts like an HTML document.
pub fn looks_like_html_document(body: &str) -> bool {
    let head = body.trim_start();
    let head = head.get(..head.len().min(16)).unwrap_or(head).to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}
