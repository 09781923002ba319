// Version history: snapshots before every mutation, rollback to any of them.
//
// A snapshot records the page as it was *before* the mutation, under the
// version number the page held at that moment. After a mutation that leaves
// the page at version N, a snapshot with version N-1 exists. Rollback is a
// mutation like any other, so it snapshots first and can itself be undone.

use chrono::Utc;
use folio_common::types::{Page, PageContent, PageVersion};
use tracing::info;

use crate::{error::FolioError, store::Store};

pub const DEFAULT_HISTORY_LIMIT: i64 = 10;
pub const MAX_HISTORY_LIMIT: i64 = 30;

#[derive(Clone)]
pub struct HistoryManager {
    store: Store,
}

impl HistoryManager {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Append a snapshot of `page` as it is now.
    pub async fn snapshot(&self, page: &Page, author_id: Option<&str>) -> Result<(), FolioError> {
        let snapshot = PageVersion {
            page_id: page.id,
            version: page.version,
            title: page.title.clone(),
            slug: page.slug.clone(),
            body: page.body.clone(),
            author_id: author_id.map(str::to_string),
            created_at: Utc::now(),
        };
        self.store.insert_snapshot(&snapshot).await
    }

    /// Increment the version counter by exactly one.
    pub async fn bump(&self, page: &Page) -> Result<i32, FolioError> {
        self.store.bump_version(page.id).await
    }

    /// Snapshot, write `content`, bump. Runs as one storage transaction so
    /// concurrent writers to the same page serialize on the row.
    pub async fn revise(
        &self,
        page: &Page,
        author_id: Option<&str>,
        content: PageContent,
    ) -> Result<Page, FolioError> {
        let revised = self.store.revise_page(page.id, author_id, &content).await?;
        info!(
            workspace_id = %revised.workspace_id,
            slug = %revised.slug,
            version = revised.version,
            "page revised"
        );
        Ok(revised)
    }

    /// Snapshot, then delete.
    pub async fn delete(&self, page: &Page, author_id: Option<&str>) -> Result<(), FolioError> {
        self.store.delete_page(page.id, author_id).await?;
        info!(workspace_id = %page.workspace_id, slug = %page.slug, "page deleted");
        Ok(())
    }

    /// Restore the snapshot numbered `target`, or the newest snapshot.
    pub async fn rollback(
        &self,
        page: &Page,
        target: Option<i32>,
        author_id: Option<&str>,
    ) -> Result<Page, FolioError> {
        let snapshot = self
            .store
            .page_version(page.id, target)
            .await?
            .ok_or(FolioError::NotFound("version"))?;

        let content = PageContent { title: snapshot.title, slug: snapshot.slug, body: snapshot.body };
        self.revise(page, author_id, content).await
    }

    /// Newest snapshots first; `limit` is clamped to `[1, 30]`.
    pub async fn list(&self, page: &Page, limit: Option<i64>) -> Result<Vec<PageVersion>, FolioError> {
        self.store.page_versions(page.id, clamp_limit(limit)).await
    }
}

pub fn clamp_limit(limit: Option<i64>) -> usize {
    limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT) as usize
}
