use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static PRE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("pre").expect("pre selector must parse"));
static CODE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("code").expect("code selector must parse"));
static EXTRA_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank line pattern must compile"));

/// A `<pre><code>` block lifted out before the html2md pass.
#[derive(Debug)]
struct CodeBlock {
    outer_html: String,
    language: String,
    code: String,
}

impl CodeBlock {
    fn fenced(&self) -> String {
        let code = self.code.trim_end_matches('\n');
        let fence = if code.contains("```") { "````" } else { "```" };
        format!("{fence}{}\n{code}\n{fence}", self.language)
    }
}

fn placeholder(index: usize) -> String {
    format!("DOCMIRRORCODEBLOCK{index}END")
}

/// Converts an HTML fragment to markdown (ATX headings, fenced code).
///
/// `<pre>` elements that wrap a `<code>` element become fenced blocks tagged
/// with the `language-*` class of the code element; their text is taken
/// verbatim instead of going through inline markdown conversion.
pub fn html_to_markdown(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(html);
    let blocks = collect_code_blocks(&fragment);
    let mut serialized = fragment.root_element().inner_html();

    for (index, block) in blocks.iter().enumerate() {
        serialized = serialized.replacen(
            &block.outer_html,
            &format!("<p>{}</p>", placeholder(index)),
            1,
        );
    }

    let converted = html2md::parse_html(&serialized);
    let mut markdown = EXTRA_BLANK_LINES
        .replace_all(converted.trim(), "\n\n")
        .into_owned();
    for (index, block) in blocks.iter().enumerate() {
        markdown = markdown.replacen(&placeholder(index), &block.fenced(), 1);
    }

    format!("{markdown}\n")
}

fn collect_code_blocks(fragment: &Html) -> Vec<CodeBlock> {
    fragment
        .select(&PRE)
        .filter(|pre| !has_pre_ancestor(*pre))
        .filter_map(|pre| {
            let code = pre.select(&CODE).next()?;
            Some(CodeBlock {
                outer_html: pre.html(),
                language: code_language(code),
                code: code.text().collect(),
            })
        })
        .collect()
}

fn has_pre_ancestor(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == "pre")
}

fn code_language(code: ElementRef<'_>) -> String {
    code.value()
        .classes()
        .find_map(|class| class.strip_prefix("language-"))
        .unwrap_or_default()
        .to_owned()
}
