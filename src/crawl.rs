use std::collections::{HashSet, VecDeque};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context as _;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::cli::{BulkArgs, CrawlArgs, DownloadArgs};
use crate::config::{SiteConfig, SiteConfigs};
use crate::fetch::{FetchOptions, Fetcher, is_html_content_type, looks_like_html_document};
use crate::formats::{CrawlStats, SiteReport};
use crate::page_store::{self, WriteOutcome};
use crate::probe::MarkdownProbe;

/// Pause before every page fetch.
pub const POLITENESS_DELAY: Duration = Duration::from_millis(500);

/// URLs never worth crawling, matched against the full URL.
const DEFAULT_SKIP_PATTERNS: &[&str] = &[
    r"(?i)\.(?:png|jpe?g|gif|svg|ico|webp|avif|bmp|css|js|mjs|map|json|xml|rss|pdf|zip|tar|gz|tgz|rar|7z|dmg|exe|mp3|mp4|webm|mov|avi|woff2?|ttf|otf|eot)(?:[?#]|$)",
    r"(?i)/(?:login|logout|signin|sign-in|signup|sign-up|register)(?:[/?#]|$)",
    r"(?i)/search(?:[/?#]|$)",
    r"/cdn-cgi/",
];

static DEFAULT_SKIP: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DEFAULT_SKIP_PATTERNS
        .iter()
        .map(|pattern| Regex::new(pattern).expect("default skip pattern must compile"))
        .collect()
});

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector must parse"));

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub out_root: PathBuf,
    pub max_depth: u32,
    pub force: bool,
    pub include_metadata: bool,
    pub delay: Duration,
}

impl CrawlOptions {
    pub fn new(out_root: impl Into<PathBuf>, max_depth: u32) -> Self {
        Self {
            out_root: out_root.into(),
            max_depth,
            force: false,
            include_metadata: false,
            delay: POLITENESS_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: u32,
}

/// Default skip list followed by the site's own patterns, in order.
#[derive(Debug, Clone)]
pub struct SkipPatterns {
    site: Vec<Regex>,
}

impl SkipPatterns {
    pub fn new(site_patterns: &[String]) -> Self {
        let site = site_patterns
            .iter()
            .filter_map(|pattern| {
                Regex::new(pattern)
                    .or_else(|_| Regex::new(&regex::escape(pattern)))
                    .map_err(|err| {
                        tracing::warn!(pattern = pattern.as_str(), ?err, "ignoring skip pattern")
                    })
                    .ok()
            })
            .collect();
        Self { site }
    }

    pub fn is_skipped(&self, url: &Url) -> bool {
        let url = url.as_str();
        DEFAULT_SKIP
            .iter()
            .chain(self.site.iter())
            .any(|pattern| pattern.is_match(url))
    }
}

/// State owned by one `download` call.
struct SiteRun {
    host: String,
    site_dir: PathBuf,
    site: SiteConfig,
    max_depth: u32,
    skip: SkipPatterns,
    frontier: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    stats: CrawlStats,
}

impl SiteRun {
    fn new(start_url: &Url, configs: &SiteConfigs, options: &CrawlOptions) -> anyhow::Result<Self> {
        let host = start_url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("start url must have host: {start_url}"))?
            .to_owned();
        let site = configs.get(&host);
        let max_depth = site.max_depth.unwrap_or(options.max_depth);
        let skip = SkipPatterns::new(&site.skip_patterns);
        let site_dir = page_store::ensure_site_dir(&options.out_root, &host)
            .context("prepare site output directory")?;

        let mut frontier = VecDeque::new();
        frontier.push_back(FrontierEntry {
            url: normalize_url(start_url),
            depth: 0,
        });

        Ok(Self {
            host,
            site_dir,
            site,
            max_depth,
            skip,
            frontier,
            visited: HashSet::new(),
            stats: CrawlStats::default(),
        })
    }
}

pub struct Crawler {
    fetcher: Fetcher,
    probe: MarkdownProbe,
    configs: SiteConfigs,
    options: CrawlOptions,
}

impl Crawler {
    pub fn new(fetcher: Fetcher, configs: SiteConfigs, options: CrawlOptions) -> Self {
        let probe = MarkdownProbe::new(fetcher.clone());
        Self {
            fetcher,
            probe,
            configs,
            options,
        }
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    /// Crawls one site breadth-first. Only output directory setup is fatal;
    /// page-level failures are logged and counted.
    pub async fn download(&self, start_url: &Url) -> anyhow::Result<CrawlStats> {
        let mut run = SiteRun::new(start_url, &self.configs, &self.options)?;
        tracing::info!(
            url = %start_url,
            site_dir = %run.site_dir.display(),
            max_depth = run.max_depth,
            "starting crawl"
        );

        while let Some(entry) = run.frontier.pop_front() {
            if run.visited.contains(entry.url.as_str()) || entry.depth > run.max_depth {
                continue;
            }
            run.visited.insert(entry.url.to_string());
            self.process_page(&mut run, &entry).await;
        }

        let stats = run.stats;
        tracing::info!(
            url = %start_url,
            processed = stats.pages_processed,
            written = stats.pages_written,
            native_markdown = stats.pages_from_native_markdown,
            skipped_existing = stats.pages_skipped_existing,
            skipped_no_content = stats.pages_skipped_no_content,
            failed = stats.pages_failed,
            "crawl finished"
        );
        Ok(stats)
    }

    /// Crawls sites one after another; a failed site does not stop the rest.
    pub async fn download_all(&self, start_urls: &[Url]) -> Vec<anyhow::Result<CrawlStats>> {
        let mut results = Vec::with_capacity(start_urls.len());
        for start_url in start_urls {
            let result = self.download(start_url).await;
            if let Err(err) = &result {
                tracing::error!(url = %start_url, err = %format!("{err:#}"), "site crawl failed");
            }
            results.push(result);
        }
        results
    }

    async fn process_page(&self, run: &mut SiteRun, entry: &FrontierEntry) {
        let url = &entry.url;
        run.stats.pages_processed += 1;
        tracing::info!(%url, depth = entry.depth, "processing page");

        tokio::time::sleep(self.options.delay).await;

        let page = match self.fetcher.fetch_page(url).await {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(%url, err = %format!("{err:#}"), "giving up on page");
                run.stats.pages_failed += 1;
                return;
            }
        };

        if entry.depth < run.max_depth {
            let links = discover_links(&page.body, &page.url, &run.host, &run.skip);
            let mut enqueued = 0_usize;
            for link in links {
                if run.visited.contains(link.as_str()) {
                    continue;
                }
                run.frontier.push_back(FrontierEntry {
                    url: link,
                    depth: entry.depth + 1,
                });
                enqueued += 1;
            }
            run.stats.links_enqueued += enqueued;
            tracing::debug!(%url, enqueued, "discovered links");
        }

        let path = page_store::page_path(&run.site_dir, url);
        if !self.options.force && path.exists() {
            tracing::info!(%url, path = %path.display(), "already downloaded; skipping");
            run.stats.pages_skipped_existing += 1;
            return;
        }

        match self.probe.probe(url).await {
            Some(markdown_url) => {
                self.save_native_markdown(run, url, &markdown_url, &page.body, &path)
                    .await;
            }
            None if run.site.prefer_markdown => {
                tracing::info!(%url, "no native markdown and site prefers markdown; skipping");
                run.stats.pages_skipped_no_content += 1;
            }
            None => {
                let markdown = html_page_to_markdown(&page.body, url, &run.site);
                self.persist(run, &path, url, &markdown);
            }
        }
    }

    async fn save_native_markdown(
        &self,
        run: &mut SiteRun,
        page_url: &Url,
        markdown_url: &Url,
        page_html: &str,
        path: &Path,
    ) {
        let fetched = match self.fetcher.fetch_markdown(markdown_url).await {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::warn!(
                    url = %page_url,
                    markdown = %markdown_url,
                    err = %format!("{err:#}"),
                    "failed to fetch native markdown"
                );
                run.stats.pages_failed += 1;
                return;
            }
        };

        if looks_like_html_document(&fetched.body)
            || is_html_content_type(fetched.content_type.as_deref())
        {
            tracing::info!(
                url = %page_url,
                markdown = %markdown_url,
                "markdown url served html; converting page html instead"
            );
            let markdown = html_page_to_markdown(page_html, page_url, &run.site);
            self.persist(run, path, page_url, &markdown);
            return;
        }

        if self.persist(run, path, page_url, &fetched.body) == Some(WriteOutcome::Written) {
            run.stats.pages_from_native_markdown += 1;
        }
    }

    fn persist(
        &self,
        run: &mut SiteRun,
        path: &Path,
        url: &Url,
        markdown: &str,
    ) -> Option<WriteOutcome> {
        if markdown.trim().is_empty() {
            tracing::info!(%url, "no content extracted; skipping");
            run.stats.pages_skipped_no_content += 1;
            return None;
        }

        match page_store::write_page(
            path,
            markdown,
            url,
            self.options.force,
            self.options.include_metadata,
        ) {
            Ok(outcome) => {
                match outcome {
                    WriteOutcome::Written => run.stats.pages_written += 1,
                    WriteOutcome::SkippedExisting => run.stats.pages_skipped_existing += 1,
                }
                Some(outcome)
            }
            Err(err) => {
                tracing::warn!(%url, err = %format!("{err:#}"), "failed to save page");
                run.stats.pages_failed += 1;
                None
            }
        }
    }
}

/// Extracts the content region of a page and converts it to markdown.
pub fn html_page_to_markdown(html: &str, page_url: &Url, site: &SiteConfig) -> String {
    let fragment = crate::extract::extract_content(html, page_url, site);
    if fragment.is_empty() {
        return String::new();
    }
    crate::convert::html_to_markdown(&fragment)
}

/// Same-host, non-skipped links of a page, resolved and deduplicated in
/// document order.
pub fn discover_links(html: &str, page_url: &Url, host: &str, skip: &SkipPatterns) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let resolved = match page_url.join(href) {
            Ok(url) => url,
            Err(err) => {
                tracing::debug!(href, base = %page_url, ?err, "discarding malformed link");
                continue;
            }
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }

        let link = normalize_url(&resolved);
        if link.host_str() != Some(host) || skip.is_skipped(&link) {
            continue;
        }
        if seen.insert(link.to_string()) {
            links.push(link);
        }
    }

    links
}

fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized
}

pub fn parse_start_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("parse url: {raw}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("url must be http/https: {url}");
    }
    if url.host_str().is_none() {
        anyhow::bail!("url must have host: {url}");
    }
    Ok(url)
}

fn crawler_from_args(args: &CrawlArgs) -> anyhow::Result<Crawler> {
    let configs = match args.config.as_deref() {
        Some(path) => SiteConfigs::load(Path::new(path)).context("load --config")?,
        None => SiteConfigs::default(),
    };
    tracing::debug!(sites = configs.len(), "loaded site configs");

    let fetcher = Fetcher::new(FetchOptions {
        retry_base_delay: Duration::from_millis(args.retry_delay_ms),
        ..FetchOptions::default()
    })?;

    let options = CrawlOptions {
        out_root: PathBuf::from(&args.out),
        max_depth: args.max_depth,
        force: args.force,
        include_metadata: args.metadata,
        delay: Duration::from_millis(args.delay_ms),
    };

    Ok(Crawler::new(fetcher, configs, options))
}

fn site_report(crawler: &Crawler, start_url: &str, result: anyhow::Result<CrawlStats>) -> SiteReport {
    let site_dir = Url::parse(start_url)
        .ok()
        .and_then(|url| url.host_str().map(page_store::site_dir_name))
        .map(|name| crawler.options().out_root.join(name).to_string_lossy().to_string());

    match result {
        Ok(stats) => SiteReport {
            start_url: start_url.to_owned(),
            site_dir,
            stats: Some(stats),
            error: None,
        },
        Err(err) => SiteReport {
            start_url: start_url.to_owned(),
            site_dir: None,
            stats: None,
            error: Some(format!("{err:#}")),
        },
    }
}

fn print_report(report: &SiteReport) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, report).context("write site report json")?;
    stdout
        .write_all(b"\n")
        .context("write site report newline")?;
    stdout.flush().context("flush stdout")?;
    Ok(())
}

pub async fn run(args: DownloadArgs) -> anyhow::Result<()> {
    let start_url = parse_start_url(&args.url).context("parse --url")?;
    let crawler = crawler_from_args(&args.crawl)?;

    let stats = crawler.download(&start_url).await?;
    print_report(&site_report(&crawler, start_url.as_str(), Ok(stats)))
}

pub async fn run_bulk(args: BulkArgs) -> anyhow::Result<()> {
    let crawler = crawler_from_args(&args.crawl)?;

    let mut start_urls = Vec::with_capacity(args.urls.len());
    for raw in &args.urls {
        match parse_start_url(raw) {
            Ok(start_url) => start_urls.push(start_url),
            Err(err) => {
                tracing::error!(url = raw.as_str(), err = %format!("{err:#}"), "skipping invalid url");
                print_report(&site_report(&crawler, raw, Err(err)))?;
            }
        }
    }

    let results = crawler.download_all(&start_urls).await;
    for (start_url, result) in start_urls.iter().zip(results) {
        print_report(&site_report(&crawler, start_url.as_str(), result))?;
    }

    Ok(())
}
