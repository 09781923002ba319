// Storage handle: PostgreSQL in production, an in-memory map for tests and
// database-less development.
//
// Every call is bounded by the configured storage timeout. Content mutations
// go through `revise_page`, which snapshots the locked pre-mutation row,
// writes the new content and increments the version in one transaction.

mod memory;
mod postgres;

use std::{sync::Arc, time::Duration};

use folio_common::types::{Page, PageContent, PageSummary, PageVersion, PermissionRule};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{error::FolioError, timeout::bounded};

pub use memory::MemoryStore;

#[derive(Clone)]
pub struct Store {
    backend: Backend,
    call_timeout: Duration,
}

#[derive(Clone)]
enum Backend {
    Postgres(PgPool),
    Memory(Arc<RwLock<MemoryStore>>),
}

/// A page about to be inserted at version 1.
#[derive(Debug, Clone)]
pub struct NewPage<'a> {
    pub workspace_id: &'a str,
    pub slug: &'a str,
    pub title: &'a str,
    pub body: &'a str,
}

/// One window of a filtered page listing.
#[derive(Debug, Clone, Default)]
pub struct PageSlice {
    pub items: Vec<PageSummary>,
    /// Matches across all windows.
    pub total: usize,
}

/// Scope of a permission rule: the whole workspace or a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    Workspace,
    Page(Uuid),
}

impl RuleScope {
    pub const fn page_id(self) -> Option<Uuid> {
        match self {
            Self::Workspace => None,
            Self::Page(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRule<'a> {
    pub workspace_id: &'a str,
    pub scope: RuleScope,
    pub role_id: &'a str,
    pub channel_id: Option<&'a str>,
    pub can_read: bool,
    pub can_write: bool,
}

/// Case-insensitive listing filter over title, slug and body.
#[derive(Debug, Clone, Default)]
pub struct PageFilter {
    /// Trimmed search text; `None` matches every page.
    pub text: Option<String>,
    /// Slug-normalized form of `text`, matched against slugs.
    pub slug: Option<String>,
}

impl PageFilter {
    pub fn new(search: &str) -> Self {
        let text = search.trim();
        if text.is_empty() {
            return Self::default();
        }
        let slug = folio_common::slug::normalize_slug(text);
        Self { text: Some(text.to_string()), slug: (!slug.is_empty()).then_some(slug) }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none()
    }

    fn matches(&self, title: &str, slug: &str, body: &str) -> bool {
        let Some(text) = &self.text else {
            return true;
        };
        let needle = text.to_lowercase();
        title.to_lowercase().contains(&needle)
            || self.slug.as_ref().is_some_and(|s| slug.contains(s.as_str()))
            || body.to_lowercase().contains(&needle)
    }
}

impl Store {
    pub fn postgres(pool: PgPool, call_timeout: Duration) -> Self {
        Self { backend: Backend::Postgres(pool), call_timeout }
    }

    pub fn memory(call_timeout: Duration) -> Self {
        Self {
            backend: Backend::Memory(Arc::new(RwLock::new(MemoryStore::default()))),
            call_timeout,
        }
    }

    /// In-memory store with the default storage timeout.
    pub fn in_memory() -> Self {
        Self::memory(crate::timeout::DEFAULT_STORAGE_TIMEOUT)
    }

    pub const fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            Backend::Postgres(_) => "postgres",
            Backend::Memory(_) => "memory",
        }
    }

    /// Round-trip to the backing database, bounded like any other call.
    pub async fn health_check(&self) -> Result<(), FolioError> {
        bounded(self.call_timeout, "health", async {
            match &self.backend {
                Backend::Postgres(pool) => {
                    crate::db::pool::check_pool_health(pool).await.map_err(FolioError::internal)
                }
                Backend::Memory(_) => Ok(()),
            }
        })
        .await
    }

    /// Drain and close database connections.
    pub async fn close(&self) {
        if let Backend::Postgres(pool) = &self.backend {
            pool.close().await;
        }
    }

    // ── Workspaces ────────────────────────────────────────────────────

    pub async fn ensure_workspace(&self, workspace_id: &str) -> Result<(), FolioError> {
        bounded(self.call_timeout, "workspaces.ensure", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::ensure_workspace(pool, workspace_id).await,
                Backend::Memory(store) => {
                    store.write().await.ensure_workspace(workspace_id);
                    Ok(())
                }
            }
        })
        .await
    }

    // ── Pages ─────────────────────────────────────────────────────────

    pub async fn page_by_slug(&self, workspace_id: &str, slug: &str) -> Result<Option<Page>, FolioError> {
        bounded(self.call_timeout, "pages.by_slug", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::page_by_slug(pool, workspace_id, slug).await,
                Backend::Memory(store) => Ok(store.read().await.page_by_slug(workspace_id, slug)),
            }
        })
        .await
    }

    /// Exact, case-insensitive title match. The most recently updated page
    /// wins when several share a title.
    pub async fn page_by_title(&self, workspace_id: &str, title: &str) -> Result<Option<Page>, FolioError> {
        bounded(self.call_timeout, "pages.by_title", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::page_by_title(pool, workspace_id, title).await,
                Backend::Memory(store) => Ok(store.read().await.page_by_title(workspace_id, title)),
            }
        })
        .await
    }

    pub async fn slug_taken(&self, workspace_id: &str, slug: &str) -> Result<bool, FolioError> {
        bounded(self.call_timeout, "pages.slug_taken", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::slug_taken(pool, workspace_id, slug).await,
                Backend::Memory(store) => Ok(store.read().await.slug_taken(workspace_id, slug)),
            }
        })
        .await
    }

    /// Insert a page at version 1. A taken slug fails with
    /// [`FolioError::Conflict`].
    pub async fn insert_page(&self, page: NewPage<'_>) -> Result<Page, FolioError> {
        bounded(self.call_timeout, "pages.insert", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::insert_page(pool, &page).await,
                Backend::Memory(store) => store.write().await.insert_page(&page),
            }
        })
        .await
    }

    /// Filtered listing ordered by most recently updated.
    pub async fn list_pages(
        &self,
        workspace_id: &str,
        filter: &PageFilter,
        offset: usize,
        limit: usize,
    ) -> Result<PageSlice, FolioError> {
        bounded(self.call_timeout, "pages.list", async {
            match &self.backend {
                Backend::Postgres(pool) => {
                    postgres::list_pages(pool, workspace_id, filter, offset, limit).await
                }
                Backend::Memory(store) => {
                    Ok(store.read().await.list_pages(workspace_id, filter, offset, limit))
                }
            }
        })
        .await
    }

    /// Ranked full-text search.
    pub async fn search_pages(
        &self,
        workspace_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<PageSummary>, FolioError> {
        bounded(self.call_timeout, "pages.search", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::search_pages(pool, workspace_id, query, limit).await,
                Backend::Memory(store) => Ok(store.read().await.search_pages(workspace_id, query, limit)),
            }
        })
        .await
    }

    /// Every page whose body contains `needle` (case-insensitive), or every
    /// page when `needle` is `None`.
    pub async fn scan_pages(
        &self,
        workspace_id: &str,
        needle: Option<&str>,
    ) -> Result<Vec<Page>, FolioError> {
        bounded(self.call_timeout, "pages.scan", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::scan_pages(pool, workspace_id, needle).await,
                Backend::Memory(store) => Ok(store.read().await.scan_pages(workspace_id, needle)),
            }
        })
        .await
    }

    /// Snapshot the current row, replace its content and bump the version,
    /// atomically. Returns the page as written.
    pub async fn revise_page(
        &self,
        page_id: Uuid,
        author_id: Option<&str>,
        content: &PageContent,
    ) -> Result<Page, FolioError> {
        bounded(self.call_timeout, "pages.revise", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::revise_page(pool, page_id, author_id, content).await,
                Backend::Memory(store) => store.write().await.revise_page(page_id, author_id, content),
            }
        })
        .await
    }

    /// Snapshot the current row, then delete the page.
    pub async fn delete_page(&self, page_id: Uuid, author_id: Option<&str>) -> Result<(), FolioError> {
        bounded(self.call_timeout, "pages.delete", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::delete_page(pool, page_id, author_id).await,
                Backend::Memory(store) => store.write().await.delete_page(page_id, author_id),
            }
        })
        .await
    }

    /// Atomic `version = version + 1`. Returns the new version.
    pub async fn bump_version(&self, page_id: Uuid) -> Result<i32, FolioError> {
        bounded(self.call_timeout, "pages.bump_version", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::bump_version(pool, page_id).await,
                Backend::Memory(store) => store.write().await.bump_version(page_id),
            }
        })
        .await
    }

    // ── Versions ──────────────────────────────────────────────────────

    /// Append a snapshot. A duplicate `(page, version)` fails with
    /// [`FolioError::Conflict`].
    pub async fn insert_snapshot(&self, snapshot: &PageVersion) -> Result<(), FolioError> {
        bounded(self.call_timeout, "page_versions.insert", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::insert_snapshot(pool, snapshot).await,
                Backend::Memory(store) => store.write().await.insert_snapshot(snapshot.clone()),
            }
        })
        .await
    }

    /// Snapshots newest first.
    pub async fn page_versions(&self, page_id: Uuid, limit: usize) -> Result<Vec<PageVersion>, FolioError> {
        bounded(self.call_timeout, "page_versions.list", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::page_versions(pool, page_id, limit).await,
                Backend::Memory(store) => Ok(store.read().await.page_versions(page_id, limit)),
            }
        })
        .await
    }

    /// The snapshot with `version`, or the newest one when `version` is `None`.
    pub async fn page_version(
        &self,
        page_id: Uuid,
        version: Option<i32>,
    ) -> Result<Option<PageVersion>, FolioError> {
        bounded(self.call_timeout, "page_versions.get", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::page_version(pool, page_id, version).await,
                Backend::Memory(store) => Ok(store.read().await.page_version(page_id, version)),
            }
        })
        .await
    }

    // ── Permission rules ──────────────────────────────────────────────

    /// Rules that apply to `page_id`: its own plus the workspace-wide ones.
    pub async fn applicable_rules(
        &self,
        workspace_id: &str,
        page_id: Option<Uuid>,
    ) -> Result<Vec<PermissionRule>, FolioError> {
        bounded(self.call_timeout, "permission_rules.applicable", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::applicable_rules(pool, workspace_id, page_id).await,
                Backend::Memory(store) => Ok(store.read().await.applicable_rules(workspace_id, page_id)),
            }
        })
        .await
    }

    /// Count of [`Store::applicable_rules`] without fetching them.
    pub async fn count_applicable_rules(
        &self,
        workspace_id: &str,
        page_id: Option<Uuid>,
    ) -> Result<i64, FolioError> {
        bounded(self.call_timeout, "permission_rules.count", async {
            match &self.backend {
                Backend::Postgres(pool) => {
                    postgres::count_applicable_rules(pool, workspace_id, page_id).await
                }
                Backend::Memory(store) => {
                    Ok(store.read().await.applicable_rules(workspace_id, page_id).len() as i64)
                }
            }
        })
        .await
    }

    /// Insert or overwrite the rule for `(scope, role, channel)`.
    pub async fn upsert_rule(&self, rule: NewRule<'_>) -> Result<PermissionRule, FolioError> {
        bounded(self.call_timeout, "permission_rules.upsert", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::upsert_rule(pool, &rule).await,
                Backend::Memory(store) => Ok(store.write().await.upsert_rule(&rule)),
            }
        })
        .await
    }

    /// Rules in exactly `scope`.
    pub async fn list_rules(
        &self,
        workspace_id: &str,
        scope: RuleScope,
    ) -> Result<Vec<PermissionRule>, FolioError> {
        bounded(self.call_timeout, "permission_rules.list", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::list_rules(pool, workspace_id, scope).await,
                Backend::Memory(store) => Ok(store.read().await.list_rules(workspace_id, scope)),
            }
        })
        .await
    }

    /// Delete every rule in exactly `scope`. Returns how many were removed.
    pub async fn clear_rules(&self, workspace_id: &str, scope: RuleScope) -> Result<u64, FolioError> {
        bounded(self.call_timeout, "permission_rules.clear", async {
            match &self.backend {
                Backend::Postgres(pool) => postgres::clear_rules(pool, workspace_id, scope).await,
                Backend::Memory(store) => Ok(store.write().await.clear_rules(workspace_id, scope)),
            }
        })
        .await
    }
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_title_slug_and_body() {
        let filter = PageFilter::new("  My Notes ");
        assert!(filter.matches("All my notes", "x", ""));
        assert!(filter.matches("x", "my-notes-2", ""));
        assert!(filter.matches("x", "y", "these are MY NOTES"));
        assert!(!filter.matches("other", "other", "nothing"));
    }

    #[test]
    fn blank_filter_matches_everything() {
        let filter = PageFilter::new("   ");
        assert!(filter.is_empty());
        assert!(filter.matches("a", "b", "c"));
    }

    #[test]
    fn symbol_only_search_does_not_match_every_slug() {
        let filter = PageFilter::new("!!!");
        assert!(filter.slug.is_none());
        assert!(!filter.matches("title", "slug", "body"));
        assert!(filter.matches("wow!!!", "slug", "body"));
    }

    #[test]
    fn like_escape_quotes_wildcards() {
        assert_eq!(like_escape("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(like_escape("plain"), "plain");
    }

    #[test]
    fn rule_scope_page_id() {
        let id = Uuid::new_v4();
        assert_eq!(RuleScope::Workspace.page_id(), None);
        assert_eq!(RuleScope::Page(id).page_id(), Some(id));
    }
}
