// `query` argument resolution: slug first, then exact title.

use folio_common::{
    slug::{looks_like_slug, normalize_slug},
    types::Page,
};

use crate::{error::FolioError, store::Store};

/// Find the page a user means by `query`.
///
/// Input already shaped like a slug is looked up directly; anything else is
/// normalized into a candidate slug. When no slug matches, an exact
/// case-insensitive title match is tried.
pub async fn find_page(store: &Store, workspace_id: &str, query: &str) -> Result<Option<Page>, FolioError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(None);
    }

    let slug = if looks_like_slug(query) { query.to_string() } else { normalize_slug(query) };
    if !slug.is_empty() {
        if let Some(page) = store.page_by_slug(workspace_id, &slug).await? {
            return Ok(Some(page));
        }
    }

    store.page_by_title(workspace_id, query).await
}

/// [`find_page`], failing with `NotFound` when nothing matches.
pub async fn require_page(store: &Store, workspace_id: &str, query: &str) -> Result<Page, FolioError> {
    find_page(store, workspace_id, query).await?.ok_or(FolioError::NotFound("page"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{allocator::SlugAllocator, store::NewPage};

    #[tokio::test]
    async fn resolves_by_slug_then_title() {
        let store = Store::in_memory();
        let allocator = SlugAllocator::new(store.clone());
        let notes = allocator.create_page("w1", "My Notes", "").await.expect("create");

        let by_slug = find_page(&store, "w1", "my-notes").await.expect("lookup");
        assert_eq!(by_slug.map(|p| p.id), Some(notes.id));

        let by_title = find_page(&store, "w1", "MY NOTES").await.expect("lookup");
        assert_eq!(by_title.map(|p| p.id), Some(notes.id));
    }

    #[tokio::test]
    async fn title_match_covers_slugs_that_differ_from_title() {
        let store = Store::in_memory();
        let page = store
            .insert_page(NewPage { workspace_id: "w1", slug: "custom", title: "[docs] Setup Guide", body: "" })
            .await
            .expect("insert");

        let found = require_page(&store, "w1", "[docs] setup guide").await.expect("lookup");
        assert_eq!(found.id, page.id);
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let store = Store::in_memory();
        let error = require_page(&store, "w1", "nothing here").await.expect_err("missing");
        assert!(matches!(error, FolioError::NotFound("page")));
        assert!(find_page(&store, "w1", "   ").await.expect("blank").is_none());
    }

    #[tokio::test]
    async fn lookups_are_tenant_scoped() {
        let store = Store::in_memory();
        SlugAllocator::new(store.clone()).create_page("w1", "Secret", "").await.expect("create");
        assert!(find_page(&store, "w2", "secret").await.expect("lookup").is_none());
    }
}
