// Page slug normalization and collision candidates.
//
// Slugs: NFKD-folded, lowercase ASCII alphanumerics joined by single hyphens,
// at most 60 characters. Collision candidates: base, base-2, base-3, ...

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Maximum slug length in characters.
pub const MAX_SLUG_CHARS: usize = 60;

/// Slug used when a title contains nothing slug-worthy.
pub const FALLBACK_SLUG: &str = "page";

/// Number of numbered candidates probed before falling back to a random suffix.
pub const MAX_SLUG_PROBES: usize = 50;

/// Convert a free-text title into a URL-safe slug.
///
/// - Trims and lowercases
/// - Folds accented letters to their base letter (`Über` -> `uber`)
/// - Replaces every run of other characters with one hyphen
/// - Strips leading and trailing hyphens
/// - Truncates to [`MAX_SLUG_CHARS`]
///
/// Returns an empty string if the title contains no alphanumeric characters.
pub fn normalize_slug(title: &str) -> String {
    let folded: String =
        title.trim().nfkd().filter(|ch| !is_combining_mark(*ch)).collect::<String>().to_lowercase();

    let raw: String =
        folded.chars().map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' }).collect();
    let joined = raw.split('-').filter(|part| !part.is_empty()).collect::<Vec<_>>().join("-");

    clip(&joined, MAX_SLUG_CHARS)
}

/// Like [`normalize_slug`] but never empty: falls back to [`FALLBACK_SLUG`].
pub fn slug_base(title: &str) -> String {
    let slug = normalize_slug(title);
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// True when `value` already has slug shape: `^[a-z0-9]+(-[a-z0-9]+)*$`.
pub fn looks_like_slug(value: &str) -> bool {
    !value.is_empty()
        && value.split('-').all(|part| {
            !part.is_empty() && part.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit())
        })
}

/// Build the `attempt`-th collision candidate for `base` (1-based).
///
/// Attempt 1 is the base itself; attempt `n` appends `-n`, shortening the
/// base so the result still fits in [`MAX_SLUG_CHARS`].
pub fn slug_candidate(base: &str, attempt: usize) -> String {
    if attempt <= 1 {
        return base.to_string();
    }
    with_suffix(base, &attempt.to_string())
}

/// Append `-suffix` to `base`, shortening the base to stay within the limit.
pub fn with_suffix(base: &str, suffix: &str) -> String {
    let budget = MAX_SLUG_CHARS.saturating_sub(suffix.len() + 1);
    let head = clip(base, budget);
    if head.is_empty() {
        format!("{FALLBACK_SLUG}-{suffix}")
    } else {
        format!("{head}-{suffix}")
    }
}

fn clip(slug: &str, max_chars: usize) -> String {
    let clipped: String = slug.chars().take(max_chars).collect();
    clipped.trim_end_matches('-').to_string()
}
