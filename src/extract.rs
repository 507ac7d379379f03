//! Picking the content region out of a full HTML page.
//!
//! Boilerplate is stripped first, then an ordered list of strategies is tried
//! and the first one that yields a non-trivial fragment wins. The body is the
//! last resort.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::config::SiteConfig;

/// Selector matches whose trimmed inner HTML is not longer than this are
/// treated as empty shells.
pub const MIN_SELECTOR_HTML_CHARS: usize = 100;

/// Minimum visible text for the largest-block fallback.
pub const MIN_BLOCK_TEXT_CHARS: usize = 200;

const BOILERPLATE: &str = "script, style, noscript, nav, footer, header, \
    .sidebar, #sidebar, .navigation, #navigation, .menu, #menu, \
    .navbar, #navbar, .topbar, #topbar, .search, #search, \
    .breadcrumb, #breadcrumb, .breadcrumbs, #breadcrumbs, \
    .table-of-contents, #table-of-contents, .toc, #toc, .banner, #banner";

const DOCS_PLATFORM_SELECTORS: &[&str] = &[
    ".prose",
    "[data-content]",
    ".docs-content",
    ".main-content",
    "#content-area",
];

const STATIC_SITE_SELECTORS: &[&str] = &[
    "main article",
    ".theme-doc-markdown",
    ".vp-doc",
    "[class*=\"docMainContainer\"]",
    "#__next main",
    "#__nuxt main",
    "[data-reactroot] main",
];

const GENERIC_SELECTORS: &[&str] = &[
    "main",
    ".content",
    ".documentation",
    ".docs-content",
    ".markdown-body",
    "article",
    "#content",
    ".main-content",
    "[role=\"main\"]",
    ".prose",
];

fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .map(|s| Selector::parse(s).expect("built-in selector must parse"))
        .collect()
}

static BOILERPLATE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(BOILERPLATE).expect("boilerplate selector must parse"));
static DOCS_PLATFORM: LazyLock<Vec<Selector>> =
    LazyLock::new(|| compile(DOCS_PLATFORM_SELECTORS));
static STATIC_SITE: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(STATIC_SITE_SELECTORS));
static GENERIC: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(GENERIC_SELECTORS));
static TEXT_BLOCKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div, section, article").expect("block selector must parse"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("body selector must parse"));

struct Cleanup {
    script_or_style: Regex,
    verbatim_block: Regex,
    remnants: Vec<Regex>,
    open_tag: Regex,
    data_attr: Regex,
    style_attr: Regex,
    class_attr: Regex,
    whitespace: Regex,
}

static CLEANUP: LazyLock<Cleanup> = LazyLock::new(|| {
    let re = |pattern: &str| Regex::new(pattern).expect("cleanup pattern must compile");
    Cleanup {
        script_or_style: re(r"(?is)<(script|style)\b[^>]*>.*?</(?:script|style)\s*>"),
        verbatim_block: re(r"(?is)<pre\b.*?</pre\s*>|<code\b.*?</code\s*>"),
        remnants: vec![
            re(r"self\.__next_[a-z]+\s*=\s*self\.__next_[a-z]+\s*\|\|\s*\[\]\)?;?"),
            re(r"\(?self\.__next_[a-z]+\s*=\s*self\.__next_[a-z]+\s*\|\|\s*\[\]\)\.push\(\[[^<]*?\]\);?"),
            re(r"self\.__next_[a-z]+\.push\(\[[^<]*?\]\);?"),
            re(r"window\.__(?:NUXT|NEXT_DATA|INITIAL_STATE|APOLLO_STATE)__\s*=\s*[^;<]*;?"),
            re(r"!?\(?function\s*\([^)<]*\)\s*\{[^<]*?\}\)?\([^)<]*\)\)?;?"),
            re(r"--[A-Za-z0-9_-]+\s*:\s*[^;<>{}]+;"),
        ],
        open_tag: re(r#"<[A-Za-z](?:[^<>"]|"[^"]*")*>"#),
        data_attr: re(r#"\s+data-[A-Za-z0-9_:.-]*="[^"]*""#),
        style_attr: re(r#"\s+style="[^"]*""#),
        class_attr: re(r#"\s+class="([^"]*)""#),
        whitespace: re(r"\s+"),
    }
});

/// Inputs shared by every extraction strategy.
struct Page<'a> {
    document: &'a Html,
    host: &'a str,
    url: &'a Url,
    site: &'a SiteConfig,
}

type Strategy = fn(&Page<'_>) -> Option<String>;

/// Tried in order; the first `Some` is the content.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("site content selector", site_content_selector),
    ("docs platform selectors", docs_platform_selectors),
    ("static site selectors", static_site_selectors),
    ("generic selectors", generic_selectors),
    ("largest text block", largest_text_block),
];

pub fn extract_content(html: &str, page_url: &Url, site: &SiteConfig) -> String {
    extract_document(Html::parse_document(html), page_url, site)
}

/// Returns the cleaned content fragment, or an empty string when the site
/// prefers native markdown.
pub fn extract_document(mut document: Html, page_url: &Url, site: &SiteConfig) -> String {
    strip_boilerplate(&mut document);

    if site.prefer_markdown {
        return String::new();
    }

    let page = Page {
        document: &document,
        host: page_url.host_str().unwrap_or_default(),
        url: page_url,
        site,
    };

    for (name, strategy) in STRATEGIES {
        if let Some(fragment) = strategy(&page) {
            tracing::debug!(url = %page_url, strategy = *name, "selected content region");
            return clean_fragment(&fragment);
        }
    }

    tracing::debug!(url = %page_url, "no content region found; using body");
    let body = document
        .select(&BODY)
        .next()
        .map(|body| body.inner_html())
        .unwrap_or_else(|| document.root_element().inner_html());
    clean_fragment(&body)
}

fn strip_boilerplate(document: &mut Html) {
    let ids: Vec<_> = document
        .select(&BOILERPLATE_SELECTOR)
        .map(|element| element.id())
        .collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn substantial_match(document: &Html, selector: &Selector) -> Option<String> {
    let html = document.select(selector).next()?.inner_html();
    (html.trim().chars().count() > MIN_SELECTOR_HTML_CHARS).then_some(html)
}

fn first_substantial(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .find_map(|selector| substantial_match(document, selector))
}

fn site_content_selector(page: &Page<'_>) -> Option<String> {
    let raw = page.site.content_selector.as_deref()?;
    match Selector::parse(raw) {
        Ok(selector) => substantial_match(page.document, &selector),
        Err(err) => {
            tracing::warn!(selector = raw, ?err, "invalid contentSelector; ignoring");
            None
        }
    }
}

fn is_docs_platform(host: &str, path: &str) -> bool {
    host.starts_with("docs.")
        || ["mintlify", "gitbook", "readme.io", "readthedocs"]
            .iter()
            .any(|hint| host.contains(hint))
        || path.starts_with("/docs")
}

fn docs_platform_selectors(page: &Page<'_>) -> Option<String> {
    if !is_docs_platform(page.host, page.url.path()) {
        return None;
    }
    first_substantial(page.document, &DOCS_PLATFORM)
}

fn is_static_site(host: &str) -> bool {
    [".github.io", ".netlify.app", ".vercel.app", ".pages.dev"]
        .iter()
        .any(|suffix| host.ends_with(suffix))
        || ["docusaurus", "vitepress", "nextra"]
            .iter()
            .any(|hint| host.contains(hint))
}

fn static_site_selectors(page: &Page<'_>) -> Option<String> {
    if !is_static_site(page.host) {
        return None;
    }
    first_substantial(page.document, &STATIC_SITE)
}

fn generic_selectors(page: &Page<'_>) -> Option<String> {
    first_substantial(page.document, &GENERIC)
}

fn largest_text_block(page: &Page<'_>) -> Option<String> {
    page.document
        .select(&TEXT_BLOCKS)
        .map(|element| (visible_text_chars(element), element))
        .filter(|(chars, _)| *chars > MIN_BLOCK_TEXT_CHARS)
        .max_by_key(|(chars, _)| *chars)
        .map(|(_, element)| element.inner_html())
}

fn is_chrome(element: ElementRef<'_>) -> bool {
    let value = element.value();
    matches!(value.name(), "nav" | "footer" | "aside")
        || value.classes().any(|class| class.contains("sidebar"))
        || value.id().is_some_and(|id| id.contains("sidebar"))
}

fn visible_text_chars(element: ElementRef<'_>) -> usize {
    let mut text = String::new();
    collect_visible_text(element, &mut text);
    text.trim().chars().count()
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if !is_chrome(child) {
                        collect_visible_text(child, out);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Strips leftovers and presentation attributes, then collapses whitespace
/// outside `<pre>` and `<code>` blocks.
pub fn clean_fragment(html: &str) -> String {
    let cleanup = &*CLEANUP;
    let html = cleanup.script_or_style.replace_all(html, "");

    let html = cleanup
        .open_tag
        .replace_all(&html, |caps: &Captures<'_>| strip_attributes(&caps[0]));

    let cleaned = map_outside_code(&html, |segment| {
        let mut text = segment.to_owned();
        for remnant in &cleanup.remnants {
            text = remnant.replace_all(&text, "").into_owned();
        }
        cleanup.whitespace.replace_all(&text, " ").into_owned()
    });

    cleaned.trim().to_owned()
}

fn strip_attributes(tag: &str) -> String {
    let cleanup = &*CLEANUP;
    let tag = cleanup.data_attr.replace_all(tag, "");
    let tag = cleanup.style_attr.replace_all(&tag, "");
    cleanup
        .class_attr
        .replace_all(&tag, |caps: &Captures<'_>| {
            let languages: Vec<&str> = caps[1]
                .split_whitespace()
                .filter(|class| class.starts_with("language-"))
                .collect();
            if languages.is_empty() {
                String::new()
            } else {
                format!(" class=\"{}\"", languages.join(" "))
            }
        })
        .into_owned()
}

fn map_outside_code(html: &str, transform: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for block in CLEANUP.verbatim_block.find_iter(html) {
        out.push_str(&transform(&html[last..block.start()]));
        out.push_str(block.as_str());
        last = block.end();
    }
    out.push_str(&transform(&html[last..]));
    out
}
