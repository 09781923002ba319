// Folder prefix codec: `[build/guides] Deploy checklist`.

/// Canonicalize a folder path: trimmed, no surrounding slashes, no brackets.
pub fn normalize_folder(folder: &str) -> String {
    let cleaned: String = folder.chars().filter(|ch| *ch != '[' && *ch != ']').collect();
    cleaned.trim().trim_matches('/').trim().to_string()
}

/// Split a title into `(folder, bare_title)`.
///
/// Titles without a leading `[...]` prefix yield an empty folder.
pub fn unfold_title(title: &str) -> (String, String) {
    let trimmed = title.trim();
    if let Some(inner) = trimmed.strip_prefix('[') {
        if let Some((folder, rest)) = inner.split_once(']') {
            return (normalize_folder(folder), rest.trim().to_string());
        }
    }
    (String::new(), trimmed.to_string())
}

/// Replace any folder prefix on `title` with `folder`.
///
/// An empty folder removes the prefix.
pub fn fold_into_title(title: &str, folder: &str) -> String {
    let (_, bare) = unfold_title(title);
    let folder = normalize_folder(folder);
    if folder.is_empty() {
        bare
    } else {
        format!("[{folder}] {bare}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfold_extracts_folder() {
        assert_eq!(
            unfold_title("[build/guides] Deploy"),
            ("build/guides".to_string(), "Deploy".to_string())
        );
    }

    #[test]
    fn unfold_strips_slashes_and_whitespace() {
        assert_eq!(unfold_title("[ /ops/ ]  Runbook"), ("ops".to_string(), "Runbook".to_string()));
    }

    #[test]
    fn unfold_without_prefix_has_empty_folder() {
        assert_eq!(unfold_title("  Plain title "), (String::new(), "Plain title".to_string()));
        assert_eq!(unfold_title("[unclosed title"), (String::new(), "[unclosed title".to_string()));
    }

    #[test]
    fn fold_replaces_existing_prefix() {
        assert_eq!(fold_into_title("[old] Notes", "new/place"), "[new/place] Notes");
    }

    #[test]
    fn fold_adds_prefix_to_plain_title() {
        assert_eq!(fold_into_title("Notes", "/archive/"), "[archive] Notes");
    }

    #[test]
    fn fold_with_empty_folder_removes_prefix() {
        assert_eq!(fold_into_title("[old] Notes", "  "), "Notes");
    }

    #[test]
    fn fold_then_unfold_recovers_parts() {
        let folded = fold_into_title("Deploy", "build/guides");
        assert_eq!(unfold_title(&folded), ("build/guides".to_string(), "Deploy".to_string()));
    }
}
