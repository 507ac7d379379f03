use serde::{Deserialize, Serialize};

/// Per-site counters accumulated by one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub pages_processed: usize,
    pub pages_written: usize,
    pub pages_from_native_markdown: usize,
    pub pages_skipped_existing: usize,
    pub pages_skipped_no_content: usize,
    pub pages_failed: usize,
    pub links_enqueued: usize,
}

/// One line of the binary's stdout summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteReport {
    pub start_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CrawlStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
