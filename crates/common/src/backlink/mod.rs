// Wiki-style page links (`[[target]]`, `[[target|label]]`).
//
// Targets are matched against a page's slug or its title (folder prefix
// ignored), case-insensitively.

use crate::{metadata::unfold_title, slug::normalize_slug};

/// A `[[...]]` link found in page markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Target text before any `|label`.
    pub target: String,
    /// Optional display label after `|`.
    pub label: Option<String>,
}

/// Extract every well-formed `[[...]]` link from `markdown`, in order.
pub fn parse_page_links(markdown: &str) -> Vec<PageLink> {
    let mut links = Vec::new();
    let mut rest = markdown;

    while let Some(open) = rest.find("[[") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("]]") else {
            break;
        };

        if let Some(link) = parse_inner(&after_open[..close]) {
            links.push(link);
        }
        rest = &after_open[close + 2..];
    }

    links
}

fn parse_inner(inner: &str) -> Option<PageLink> {
    let (target, label) = match inner.split_once('|') {
        Some((target, label)) => (target.trim(), Some(label.trim())),
        None => (inner.trim(), None),
    };
    if target.is_empty() {
        return None;
    }

    Some(PageLink {
        target: target.to_string(),
        label: label.filter(|value| !value.is_empty()).map(str::to_string),
    })
}

/// True when `markdown` contains a link resolving to the page `slug`/`title`.
pub fn links_to(markdown: &str, slug: &str, title: &str) -> bool {
    let (_, bare_title) = unfold_title(title);
    let title_key = bare_title.to_lowercase();
    let full_title_key = title.trim().to_lowercase();

    parse_page_links(markdown).iter().any(|link| {
        let target = link.target.to_lowercase();
        target == slug
            || target == title_key
            || target == full_title_key
            || normalize_slug(&link.target) == slug
    })
}
