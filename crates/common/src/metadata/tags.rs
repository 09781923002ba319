// Tag header codec: `tags: build, todo` as the first line of a page body.

/// Maximum tag length in characters.
pub const MAX_TAG_CHARS: usize = 32;

const HEADER_PREFIX: &str = "tags:";

/// A page body split into its tag header and the remaining markdown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaggedBody {
    /// Valid, deduplicated tags in first-seen order.
    pub tags: Vec<String>,
    /// Body text after the header, with leading blank lines removed.
    pub body: String,
}

/// Split a page body into its tag header and remainder.
///
/// Only the first line is inspected. When it does not start with `tags:`
/// (case-insensitive, surrounding whitespace ignored) the whole input is the
/// remainder and the tag list is empty.
pub fn decode_tags(input: &str) -> TaggedBody {
    let (first_line, rest) = input.split_once('\n').unwrap_or((input, ""));
    let first_line = first_line.trim();

    let is_header =
        first_line.get(..HEADER_PREFIX.len()).is_some_and(|p| p.eq_ignore_ascii_case(HEADER_PREFIX));
    if !is_header {
        return TaggedBody { tags: Vec::new(), body: input.to_string() };
    }

    TaggedBody {
        tags: parse_tag_list(&first_line[HEADER_PREFIX.len()..]),
        body: strip_leading_blank_lines(rest).to_string(),
    }
}

/// Prefix `body` with a tag header.
///
/// Tags are validated and deduplicated first. An empty tag set returns the
/// body unchanged; an empty body returns just the header line.
pub fn encode_tags<S: AsRef<str>>(tags: &[S], body: &str) -> String {
    let tags = dedupe(tags.iter().filter_map(|tag| normalize_tag(tag.as_ref())));
    if tags.is_empty() {
        return body.to_string();
    }

    let header = format!("tags: {}", tags.join(", "));
    if body.is_empty() {
        header
    } else {
        format!("{header}\n\n{body}")
    }
}

/// Parse a comma-separated tag list, dropping invalid entries.
pub fn parse_tag_list(input: &str) -> Vec<String> {
    dedupe(input.split(',').filter_map(normalize_tag))
}

/// Lowercase, strip a leading `#`, and validate against `[a-z0-9_-]{1,32}`.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().trim_start_matches('#').to_lowercase();
    let valid = !tag.is_empty()
        && tag.chars().count() <= MAX_TAG_CHARS
        && tag.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-');
    valid.then_some(tag)
}

/// Re-encode `body` with `additions` merged into its existing tags.
pub fn add_tags(body: &str, additions: &[String]) -> String {
    let decoded = decode_tags(body);
    let merged = dedupe(decoded.tags.into_iter().chain(additions.iter().cloned()));
    encode_tags(&merged, &decoded.body)
}

/// Re-encode `body` without any of the tags in `removals`.
pub fn remove_tags(body: &str, removals: &[String]) -> String {
    let decoded = decode_tags(body);
    let kept: Vec<String> =
        decoded.tags.into_iter().filter(|tag| !removals.contains(tag)).collect();
    encode_tags(&kept, &decoded.body)
}

fn dedupe(tags: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn strip_leading_blank_lines(text: &str) -> &str {
    let mut rest = text;
    loop {
        match rest.split_once('\n') {
            Some((line, tail)) if line.trim().is_empty() => rest = tail,
            None if rest.trim().is_empty() => return "",
            _ => return rest,
        }
    }
}
