// Slug allocation against a workspace's existing pages.
//
// Candidates are probed in order: base, base-2, ..., base-50. When all of
// them are taken a random suffix is used. A uniqueness violation on insert
// (another request took the slug between probe and insert) moves on to the
// next candidate instead of failing the command.

use folio_common::{
    slug::{slug_base, slug_candidate, with_suffix, MAX_SLUG_PROBES},
    types::Page,
};
use rand::{distributions::Alphanumeric, Rng};
use tracing::debug;

use crate::{
    error::FolioError,
    store::{NewPage, Store},
};

const RANDOM_SUFFIX_LEN: usize = 6;
const RANDOM_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct SlugAllocator {
    store: Store,
}

impl SlugAllocator {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// First free slug derived from `title`.
    ///
    /// `keep` names the slug the caller already owns; it counts as free.
    pub async fn allocate(
        &self,
        workspace_id: &str,
        title: &str,
        keep: Option<&str>,
    ) -> Result<String, FolioError> {
        let base = slug_base(title);
        for attempt in 1..=MAX_SLUG_PROBES {
            let candidate = slug_candidate(&base, attempt);
            if keep == Some(candidate.as_str()) {
                return Ok(candidate);
            }
            if !self.store.slug_taken(workspace_id, &candidate).await? {
                return Ok(candidate);
            }
        }
        Ok(random_candidate(&base))
    }

    /// Insert a new page under a freshly allocated slug.
    pub async fn create_page(&self, workspace_id: &str, title: &str, body: &str) -> Result<Page, FolioError> {
        let base = slug_base(title);

        let mut first_free = None;
        for attempt in 1..=MAX_SLUG_PROBES {
            if !self.store.slug_taken(workspace_id, &slug_candidate(&base, attempt)).await? {
                first_free = Some(attempt);
                break;
            }
        }

        if let Some(start) = first_free {
            let numbered = (start..=MAX_SLUG_PROBES).map(|attempt| slug_candidate(&base, attempt));
            if let Some(page) = self.insert_first(workspace_id, numbered, title, body).await? {
                return Ok(page);
            }
        }

        let random = (0..RANDOM_ATTEMPTS).map(|_| random_candidate(&base));
        match self.insert_first(workspace_id, random, title, body).await? {
            Some(page) => Ok(page),
            None => {
                debug!(workspace_id, base = %base, "slug allocation exhausted");
                Err(FolioError::Conflict)
            }
        }
    }

    /// Insert under the first candidate nobody holds at insert time.
    ///
    /// `None` when every candidate hit a uniqueness violation.
    async fn insert_first(
        &self,
        workspace_id: &str,
        candidates: impl IntoIterator<Item = String>,
        title: &str,
        body: &str,
    ) -> Result<Option<Page>, FolioError> {
        for candidate in candidates {
            match self.insert(workspace_id, &candidate, title, body).await {
                Ok(page) => return Ok(Some(page)),
                Err(FolioError::Conflict) => {
                    debug!(workspace_id, slug = %candidate, "slug taken concurrently, trying next");
                }
                Err(error) => return Err(error),
            }
        }
        Ok(None)
    }

    async fn insert(&self, workspace_id: &str, slug: &str, title: &str, body: &str) -> Result<Page, FolioError> {
        self.store.insert_page(NewPage { workspace_id, slug, title, body }).await
    }
}

fn random_candidate(base: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();
    with_suffix(base, &suffix)
}

#[cfg(test)]
mod tests {
    use folio_common::slug::{looks_like_slug, MAX_SLUG_CHARS};

    use super::*;

    fn allocator() -> SlugAllocator {
        SlugAllocator::new(Store::in_memory())
    }

    #[tokio::test]
    async fn same_title_twice_yields_distinct_slugs() {
        let allocator = allocator();
        let first = allocator.create_page("w1", "My Notes", "").await.expect("first");
        let second = allocator.create_page("w1", "My Notes", "").await.expect("second");
        let third = allocator.create_page("w1", "My Notes", "").await.expect("third");

        assert_eq!(first.slug, "my-notes");
        assert_eq!(second.slug, "my-notes-2");
        assert_eq!(third.slug, "my-notes-3");
    }

    #[tokio::test]
    async fn empty_title_falls_back_to_page() {
        let page = allocator().create_page("w1", "!!!", "").await.expect("create");
        assert_eq!(page.slug, "page");
    }

    #[tokio::test]
    async fn workspaces_do_not_share_slugs() {
        let allocator = allocator();
        let a = allocator.create_page("w1", "Roadmap", "").await.expect("w1");
        let b = allocator.create_page("w2", "Roadmap", "").await.expect("w2");
        assert_eq!(a.slug, b.slug);
    }

    #[tokio::test]
    async fn exhausted_probes_use_random_suffix() {
        let allocator = allocator();
        for _ in 0..MAX_SLUG_PROBES {
            allocator.create_page("w1", "Busy", "").await.expect("probe");
        }
        let overflow = allocator.create_page("w1", "Busy", "").await.expect("overflow");

        assert!(overflow.slug.starts_with("busy-"));
        assert!(looks_like_slug(&overflow.slug), "{}", overflow.slug);
        assert_eq!(overflow.slug.len(), "busy-".len() + RANDOM_SUFFIX_LEN);
    }

    #[tokio::test]
    async fn allocate_keeps_owned_slug() {
        let allocator = allocator();
        let page = allocator.create_page("w1", "Roadmap", "").await.expect("create");
        let slug = allocator.allocate("w1", "Roadmap", Some(&page.slug)).await.expect("allocate");
        assert_eq!(slug, "roadmap");

        let other = allocator.allocate("w1", "Roadmap", None).await.expect("allocate");
        assert_eq!(other, "roadmap-2");
    }

    #[tokio::test]
    async fn long_titles_stay_within_limit() {
        let allocator = allocator();
        let title = "word ".repeat(40);
        let first = allocator.create_page("w1", &title, "").await.expect("first");
        let second = allocator.create_page("w1", &title, "").await.expect("second");

        assert!(first.slug.len() <= MAX_SLUG_CHARS);
        assert!(second.slug.len() <= MAX_SLUG_CHARS);
        assert!(second.slug.ends_with("-2"));
        assert!(looks_like_slug(&second.slug));
    }

    #[tokio::test]
    async fn insert_conflict_moves_to_next_candidate() {
        let store = Store::in_memory();
        store
            .insert_page(NewPage { workspace_id: "w1", slug: "race", title: "Race", body: "" })
            .await
            .expect("seed");
        let allocator = SlugAllocator::new(store);

        let page = allocator
            .insert_first("w1", ["race".to_string(), "race-2".to_string()], "Race", "mine")
            .await
            .expect("insert")
            .expect("second candidate is free");
        assert_eq!(page.slug, "race-2");
        assert_eq!(page.body, "mine");

        let none = allocator
            .insert_first("w1", ["race".to_string(), "race-2".to_string()], "Race", "")
            .await
            .expect("insert");
        assert!(none.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_get_distinct_slugs() {
        let allocator = allocator();
        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.create_page("w1", "Race", "").await })
            })
            .collect();

        let mut slugs = std::collections::HashSet::new();
        for task in tasks {
            let page = task.await.expect("task should not panic").expect("create should succeed");
            assert!(page.slug.starts_with("race"), "{}", page.slug);
            slugs.insert(page.slug);
        }
        assert_eq!(slugs.len(), 40);
    }
}
