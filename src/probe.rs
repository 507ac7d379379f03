//! Locating a native markdown counterpart for an HTML page.
//!
//! Candidates are generated in a fixed order and checked one at a time; the
//! first one that classifies as markdown wins.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::fetch::{Fetcher, ProbeResponse, is_html_content_type, looks_like_html_document};

/// Line-level markdown signals, checked in order and short-circuited.
static MARKDOWN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?m)^#{1,6}\s+\S",
        r"(?m)^\s*[-*+]\s+\S",
        r"(?m)^\s*\d+\.\s+\S",
        r"\[[^\]\n]+\]\([^)\n]+\)",
        r"(?m)^```",
        r"`[^`\n]+`",
        r"(?m)^>\s",
        r"\*\*[^*\n]+\*\*",
        r"(?:^|\s)\*[^*\s][^*\n]*\*",
        r"(?:^|\s)_[^_\s][^_\n]*_",
        r"(?m)^(?:-{3,}|\*{3,}|_{3,})\s*$",
        r"(?m)^\|.*\|\s*$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("markdown pattern must compile"))
    .collect()
});

#[derive(Debug, Clone)]
pub struct MarkdownProbe {
    fetcher: Fetcher,
}

impl MarkdownProbe {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Returns the first candidate that serves genuine markdown.
    pub async fn probe(&self, page_url: &Url) -> Option<Url> {
        for candidate in candidate_urls(page_url) {
            if self.is_markdown(&candidate).await {
                tracing::info!(page = %page_url, markdown = %candidate, "found native markdown");
                return Some(candidate);
            }
        }

        tracing::debug!(page = %page_url, "no native markdown counterpart");
        None
    }

    async fn is_markdown(&self, candidate: &Url) -> bool {
        match self.fetcher.head(candidate).await {
            Ok(response) if is_ok_status(response.status) => {
                return classify(&response);
            }
            Ok(response) => {
                tracing::debug!(%candidate, status = response.status, "HEAD rejected; trying ranged GET");
            }
            Err(err) => {
                tracing::debug!(%candidate, ?err, "HEAD failed; trying ranged GET");
            }
        }

        match self.fetcher.get_range(candidate).await {
            Ok(response) => classify(&response),
            Err(err) => {
                tracing::debug!(%candidate, ?err, "markdown probe failed");
                false
            }
        }
    }
}

fn is_ok_status(status: u16) -> bool {
    status == 200 || status == 206
}

/// Decides whether a probe response is markdown.
pub fn classify(response: &ProbeResponse) -> bool {
    if !is_ok_status(response.status) {
        return false;
    }

    let content_type = response.content_type.as_deref();
    if is_html_content_type(content_type) {
        return false;
    }

    match response.body.as_deref() {
        Some(body) => !looks_like_html_document(body) && looks_like_markdown(body),
        None => is_markdown_friendly_content_type(content_type),
    }
}

fn is_markdown_friendly_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();

    mime.is_empty()
        || mime == "text/plain"
        || mime.contains("markdown")
        || mime == "application/octet-stream"
}

pub fn looks_like_markdown(text: &str) -> bool {
    MARKDOWN_PATTERNS.iter().any(|pattern| pattern.is_match(text))
}

/// Candidate markdown locations for a page, in probe order, deduplicated.
pub fn candidate_urls(page_url: &Url) -> Vec<Url> {
    let mut base = page_url.clone();
    base.set_fragment(None);
    base.set_query(None);

    let path = base.path().to_owned();
    let trimmed = path.trim_end_matches('/');
    let literal = base.as_str().to_owned();

    let mut raw: Vec<String> = Vec::new();
    let with_path = |p: &str| {
        let mut url = base.clone();
        url.set_path(p);
        url.to_string()
    };

    if !trimmed.is_empty() {
        raw.push(with_path(&format!("{trimmed}.md")));
    }
    raw.push(with_path(&format!("{trimmed}/index.md")));
    raw.push(with_path(&format!("{trimmed}/README.md")));
    raw.push(with_path(&format!("{trimmed}/content.md")));

    let lower = trimmed.to_ascii_lowercase();
    for ext in [".html", ".htm"] {
        if lower.ends_with(ext) {
            let stem = &trimmed[..trimmed.len() - ext.len()];
            raw.push(with_path(&format!("{stem}.md")));
            break;
        }
    }

    raw.push(format!("{literal}.md"));
    raw.push(format!("{literal}/index.md"));

    if let Some(url) = github_raw_url(&base) {
        raw.push(url);
    }
    if let Some(url) = gitlab_raw_url(&base) {
        raw.push(url);
    }
    if let Some(p) = replace_segment(trimmed, "/doc/", "/docs/") {
        raw.push(with_path(&format!("{p}.md")));
    }
    if let Some(p) = replace_segment(trimmed, "/guide/", "/guides/") {
        raw.push(with_path(&format!("{p}.md")));
    }

    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .filter(|candidate| seen.insert(candidate.clone()))
        .filter_map(|candidate| match Url::parse(&candidate) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::debug!(%candidate, ?err, "skipping unparseable markdown candidate");
                None
            }
        })
        .filter(|candidate| candidate != &base)
        .collect()
}

/// `github.com/<owner>/<repo>/blob/<ref>/<path>` → raw.githubusercontent.com.
fn github_raw_url(url: &Url) -> Option<String> {
    if url.host_str() != Some("github.com") {
        return None;
    }
    let segments: Vec<&str> = url.path_segments()?.collect();
    if segments.len() < 5 || segments[2] != "blob" {
        return None;
    }

    let owner = segments[0];
    let repo = segments[1];
    let rest = segments[3..].join("/");
    Some(format!(
        "https://raw.githubusercontent.com/{owner}/{repo}/{rest}"
    ))
}

/// GitLab serves raw files at `/-/raw/` next to `/-/blob/`.
fn gitlab_raw_url(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if !host.contains("gitlab") || !url.path().contains("/-/blob/") {
        return None;
    }

    let mut raw = url.clone();
    raw.set_path(&url.path().replacen("/-/blob/", "/-/raw/", 1));
    Some(raw.to_string())
}

fn replace_segment(path: &str, from: &str, to: &str) -> Option<String> {
    let with_slash = format!("{path}/");
    if !with_slash.contains(from) {
        return None;
    }
    let replaced = with_slash.replacen(from, to, 1);
    Some(replaced.trim_end_matches('/').to_owned())
}
