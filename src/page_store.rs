use std::path::{Path, PathBuf};

use anyhow::Context as _;
use url::Url;

const ILLEGAL_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The file already existed and force mode was off.
    SkippedExisting,
}

/// Directory name for a site: `www.` dropped, dots become underscores.
pub fn site_dir_name(host: &str) -> String {
    host.strip_prefix("www.").unwrap_or(host).replace('.', "_")
}

/// Creates `out_root/<site>` and returns it.
pub fn ensure_site_dir(out_root: &Path, host: &str) -> anyhow::Result<PathBuf> {
    let site_dir = out_root.join(site_dir_name(host));
    std::fs::create_dir_all(&site_dir)
        .with_context(|| format!("create site output dir: {}", site_dir.display()))?;
    Ok(site_dir)
}

/// Relative markdown path for a URL. Identical URLs always map to identical
/// paths; `https://h` and `https://h/` both become `index.md`.
pub fn relative_page_path(url: &Url) -> PathBuf {
    let mut path = url.path().to_owned();
    if path.is_empty() || path == "/" {
        path = "/index".to_owned();
    }
    if path.ends_with('/') {
        path.pop();
    }
    if !path.ends_with(".md") {
        path.push_str(".md");
    }

    let relative = path.strip_prefix('/').unwrap_or(&path);
    let sanitized: String = relative
        .chars()
        .map(|ch| {
            if ILLEGAL_FILENAME_CHARS.contains(&ch) {
                '_'
            } else {
                ch
            }
        })
        .collect();

    PathBuf::from(sanitized)
}

pub fn page_path(site_dir: &Path, url: &Url) -> PathBuf {
    site_dir.join(relative_page_path(url))
}

fn render(content: &str, source_url: &Url, include_metadata: bool) -> String {
    if !include_metadata {
        return content.to_owned();
    }

    let downloaded_at = chrono::Utc::now().to_rfc3339();
    format!("---\nsource_url: {source_url}\ndownloaded_at: {downloaded_at}\n---\n\n{content}")
}

/// Writes a page unless it already exists and `force` is off.
pub fn write_page(
    path: &Path,
    content: &str,
    source_url: &Url,
    force: bool,
    include_metadata: bool,
) -> anyhow::Result<WriteOutcome> {
    if !force && path.exists() {
        tracing::info!(path = %path.display(), url = %source_url, "already downloaded; skipping");
        return Ok(WriteOutcome::SkippedExisting);
    }

    let parent_dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("page path must have parent: {}", path.display()))?;
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("create page parent dir: {}", parent_dir.display()))?;

    std::fs::write(path, render(content, source_url, include_metadata))
        .with_context(|| format!("write page: {}", path.display()))?;

    tracing::info!(path = %path.display(), url = %source_url, "saved page");
    Ok(WriteOutcome::Written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(url: &str) -> String {
        let url = Url::parse(url).expect("valid test url");
        relative_page_path(&url).to_string_lossy().into_owned()
    }

    #[test]
    fn site_dir_name_strips_www_and_dots() {
        assert_eq!(site_dir_name("www.example.com"), "example_com");
        assert_eq!(site_dir_name("docs.example.com"), "docs_example_com");
        assert_eq!(site_dir_name("localhost"), "localhost");
    }

    #[test]
    fn root_paths_map_to_index() {
        assert_eq!(rel("https://h/"), "index.md");
        assert_eq!(rel("https://h"), "index.md");
        assert_eq!(rel("https://h/"), rel("https://h"));
    }

    #[test]
    fn nested_paths_are_mirrored() {
        assert_eq!(rel("https://h/guide"), "guide.md");
        assert_eq!(rel("https://h/guide/"), "guide.md");
        assert_eq!(rel("https://h/docs/api/intro"), "docs/api/intro.md");
        assert_eq!(rel("https://h/readme.md"), "readme.md");
        assert_eq!(rel("https://h/page.html"), "page.html.md");
    }

    #[test]
    fn query_and_fragment_do_not_affect_path() {
        assert_eq!(rel("https://h/guide?x=1#top"), "guide.md");
    }

    #[test]
    fn illegal_characters_are_replaced() {
        assert_eq!(rel("https://h/a:b|c*d"), "a_b_c_d.md");
    }

    #[test]
    fn write_skips_existing_without_force() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let url = Url::parse("https://h/guide")?;
        let path = page_path(temp.path(), &url);

        assert_eq!(
            write_page(&path, "first\n", &url, false, false)?,
            WriteOutcome::Written
        );
        assert_eq!(
            write_page(&path, "second\n", &url, false, false)?,
            WriteOutcome::SkippedExisting
        );
        assert_eq!(std::fs::read_to_string(&path)?, "first\n");

        assert_eq!(
            write_page(&path, "third\n", &url, true, false)?,
            WriteOutcome::Written
        );
        assert_eq!(std::fs::read_to_string(&path)?, "third\n");
        Ok(())
    }

    #[test]
    fn write_prefixes_metadata_block() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let url = Url::parse("https://h/docs/a")?;
        let path = page_path(temp.path(), &url);

        write_page(&path, "# A\n", &url, false, true)?;
        let written = std::fs::read_to_string(&path)?;

        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("---"));
        assert_eq!(lines.next(), Some("source_url: https://h/docs/a"));
        let downloaded_at = lines
            .next()
            .and_then(|line| line.strip_prefix("downloaded_at: "))
            .expect("downloaded_at line");
        assert!(chrono::DateTime::parse_from_rfc3339(downloaded_at).is_ok());
        assert_eq!(lines.next(), Some("---"));
        assert_eq!(lines.next(), Some(""));
        assert_eq!(lines.next(), Some("# A"));
        Ok(())
    }
}
