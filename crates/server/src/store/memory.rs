// In-memory backend. Mirrors the PostgreSQL schema constraints that the
// dispatcher relies on: unique slugs per workspace, unique snapshot versions
// per page, and cascading deletes.

use std::{cmp::Reverse, collections::HashMap};

use chrono::{DateTime, Duration, Utc};
use folio_common::types::{Page, PageContent, PageSummary, PageVersion, PermissionRule};
use uuid::Uuid;

use super::{NewPage, NewRule, PageFilter, PageSlice, RuleScope};
use crate::error::FolioError;

#[derive(Default)]
pub struct MemoryStore {
    workspaces: HashMap<String, DateTime<Utc>>,
    pages: HashMap<Uuid, Page>,
    versions: Vec<PageVersion>,
    rules: Vec<PermissionRule>,
    last_tick: Option<DateTime<Utc>>,
}

impl MemoryStore {
    /// Strictly increasing timestamps so `updated_at` ordering is stable.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_tick {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_tick = Some(next);
        next
    }

    pub(super) fn ensure_workspace(&mut self, workspace_id: &str) {
        if !self.workspaces.contains_key(workspace_id) {
            let now = self.tick();
            self.workspaces.insert(workspace_id.to_string(), now);
        }
    }

    pub(super) fn page_by_slug(&self, workspace_id: &str, slug: &str) -> Option<Page> {
        self.pages
            .values()
            .find(|page| page.workspace_id == workspace_id && page.slug == slug)
            .cloned()
    }

    pub(super) fn page_by_title(&self, workspace_id: &str, title: &str) -> Option<Page> {
        let wanted = title.to_lowercase();
        self.pages
            .values()
            .filter(|page| page.workspace_id == workspace_id && page.title.to_lowercase() == wanted)
            .max_by_key(|page| page.updated_at)
            .cloned()
    }

    pub(super) fn slug_taken(&self, workspace_id: &str, slug: &str) -> bool {
        self.pages.values().any(|page| page.workspace_id == workspace_id && page.slug == slug)
    }

    pub(super) fn insert_page(&mut self, new_page: &NewPage<'_>) -> Result<Page, FolioError> {
        if self.slug_taken(new_page.workspace_id, new_page.slug) {
            return Err(FolioError::Conflict);
        }
        let now = self.tick();
        let page = Page {
            id: Uuid::new_v4(),
            workspace_id: new_page.workspace_id.to_string(),
            slug: new_page.slug.to_string(),
            title: new_page.title.to_string(),
            body: new_page.body.to_string(),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.pages.insert(page.id, page.clone());
        Ok(page)
    }

    fn sorted_pages<'a>(&'a self, workspace_id: &str, filter: &PageFilter) -> Vec<&'a Page> {
        let mut pages: Vec<&Page> = self
            .pages
            .values()
            .filter(|page| page.workspace_id == workspace_id)
            .filter(|page| filter.matches(&page.title, &page.slug, &page.body))
            .collect();
        pages.sort_by_key(|page| (Reverse(page.updated_at), page.id));
        pages
    }

    pub(super) fn list_pages(
        &self,
        workspace_id: &str,
        filter: &PageFilter,
        offset: usize,
        limit: usize,
    ) -> PageSlice {
        let pages = self.sorted_pages(workspace_id, filter);
        PageSlice {
            total: pages.len(),
            items: pages.into_iter().skip(offset).take(limit).map(summary).collect(),
        }
    }

    /// Ranks by how often the query terms occur in title and body.
    pub(super) fn search_pages(&self, workspace_id: &str, query: &str, limit: usize) -> Vec<PageSummary> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &Page)> = self
            .sorted_pages(workspace_id, &PageFilter::default())
            .into_iter()
            .filter_map(|page| {
                let haystack = format!("{} {}", page.title, page.body).to_lowercase();
                let score: usize = terms.iter().map(|term| haystack.matches(term.as_str()).count()).sum();
                (score > 0).then_some((score, page))
            })
            .collect();
        // Stable sort keeps the recency order among equal scores.
        scored.sort_by_key(|(score, _)| Reverse(*score));
        scored.into_iter().take(limit).map(|(_, page)| summary(page)).collect()
    }

    pub(super) fn scan_pages(&self, workspace_id: &str, needle: Option<&str>) -> Vec<Page> {
        let needle = needle.map(str::to_lowercase);
        self.sorted_pages(workspace_id, &PageFilter::default())
            .into_iter()
            .filter(|page| match &needle {
                Some(needle) => page.body.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .cloned()
            .collect()
    }

    pub(super) fn revise_page(
        &mut self,
        page_id: Uuid,
        author_id: Option<&str>,
        content: &PageContent,
    ) -> Result<Page, FolioError> {
        let current = self.pages.get(&page_id).cloned().ok_or(FolioError::NotFound("page"))?;
        if content.slug != current.slug && self.slug_taken(&current.workspace_id, &content.slug) {
            return Err(FolioError::Conflict);
        }

        let now = self.tick();
        self.insert_snapshot(snapshot_of(&current, author_id, now))?;

        let page = self.pages.get_mut(&page_id).ok_or(FolioError::NotFound("page"))?;
        page.title = content.title.clone();
        page.slug = content.slug.clone();
        page.body = content.body.clone();
        page.version += 1;
        page.updated_at = now;
        Ok(page.clone())
    }

    pub(super) fn delete_page(&mut self, page_id: Uuid, author_id: Option<&str>) -> Result<(), FolioError> {
        let current = self.pages.get(&page_id).cloned().ok_or(FolioError::NotFound("page"))?;
        let now = self.tick();
        self.insert_snapshot(snapshot_of(&current, author_id, now))?;

        self.pages.remove(&page_id);
        self.versions.retain(|version| version.page_id != page_id);
        self.rules.retain(|rule| rule.page_id != Some(page_id));
        Ok(())
    }

    pub(super) fn bump_version(&mut self, page_id: Uuid) -> Result<i32, FolioError> {
        let page = self.pages.get_mut(&page_id).ok_or(FolioError::NotFound("page"))?;
        page.version += 1;
        Ok(page.version)
    }

    pub(super) fn insert_snapshot(&mut self, snapshot: PageVersion) -> Result<(), FolioError> {
        let duplicate = self
            .versions
            .iter()
            .any(|existing| existing.page_id == snapshot.page_id && existing.version == snapshot.version);
        if duplicate {
            return Err(FolioError::Conflict);
        }
        self.versions.push(snapshot);
        Ok(())
    }

    pub(super) fn page_versions(&self, page_id: Uuid, limit: usize) -> Vec<PageVersion> {
        let mut versions: Vec<PageVersion> =
            self.versions.iter().filter(|version| version.page_id == page_id).cloned().collect();
        versions.sort_by_key(|version| Reverse(version.version));
        versions.truncate(limit);
        versions
    }

    pub(super) fn page_version(&self, page_id: Uuid, version: Option<i32>) -> Option<PageVersion> {
        let candidates = self.versions.iter().filter(|snapshot| snapshot.page_id == page_id);
        match version {
            Some(wanted) => candidates.filter(|snapshot| snapshot.version == wanted).last().cloned(),
            None => candidates.max_by_key(|snapshot| snapshot.version).cloned(),
        }
    }

    pub(super) fn applicable_rules(&self, workspace_id: &str, page_id: Option<Uuid>) -> Vec<PermissionRule> {
        self.rules
            .iter()
            .filter(|rule| rule.workspace_id == workspace_id)
            .filter(|rule| rule.page_id.is_none() || rule.page_id == page_id)
            .cloned()
            .collect()
    }

    pub(super) fn upsert_rule(&mut self, new_rule: &NewRule<'_>) -> PermissionRule {
        let page_id = new_rule.scope.page_id();
        let channel_id = new_rule.channel_id.map(str::to_string);

        if let Some(existing) = self.rules.iter_mut().find(|rule| {
            rule.workspace_id == new_rule.workspace_id
                && rule.page_id == page_id
                && rule.role_id == new_rule.role_id
                && rule.channel_id == channel_id
        }) {
            existing.can_read = new_rule.can_read;
            existing.can_write = new_rule.can_write;
            return existing.clone();
        }

        let rule = PermissionRule {
            id: Uuid::new_v4(),
            workspace_id: new_rule.workspace_id.to_string(),
            page_id,
            role_id: new_rule.role_id.to_string(),
            channel_id,
            can_read: new_rule.can_read,
            can_write: new_rule.can_write,
            created_at: self.tick(),
        };
        self.rules.push(rule.clone());
        rule
    }

    pub(super) fn list_rules(&self, workspace_id: &str, scope: RuleScope) -> Vec<PermissionRule> {
        let page_id = scope.page_id();
        self.rules
            .iter()
            .filter(|rule| rule.workspace_id == workspace_id && rule.page_id == page_id)
            .cloned()
            .collect()
    }

    pub(super) fn clear_rules(&mut self, workspace_id: &str, scope: RuleScope) -> u64 {
        let page_id = scope.page_id();
        let before = self.rules.len();
        self.rules.retain(|rule| !(rule.workspace_id == workspace_id && rule.page_id == page_id));
        (before - self.rules.len()) as u64
    }
}

fn summary(page: &Page) -> PageSummary {
    PageSummary {
        id: page.id,
        slug: page.slug.clone(),
        title: page.title.clone(),
        updated_at: page.updated_at,
    }
}

fn snapshot_of(page: &Page, author_id: Option<&str>, now: DateTime<Utc>) -> PageVersion {
    PageVersion {
        page_id: page.id,
        version: page.version,
        title: page.title.clone(),
        slug: page.slug.clone(),
        body: page.body.clone(),
        author_id: author_id.map(str::to_string),
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_page<'a>(slug: &'a str, title: &'a str, body: &'a str) -> NewPage<'a> {
        NewPage { workspace_id: "w1", slug, title, body }
    }

    #[test]
    fn duplicate_slug_is_a_conflict() {
        let mut store = MemoryStore::default();
        store.insert_page(&new_page("notes", "Notes", "")).expect("first insert");
        let error = store.insert_page(&new_page("notes", "Notes", "")).expect_err("duplicate");
        assert!(matches!(error, FolioError::Conflict));

        let other_workspace = NewPage { workspace_id: "w2", slug: "notes", title: "Notes", body: "" };
        store.insert_page(&other_workspace).expect("same slug in another workspace");
    }

    #[test]
    fn revise_snapshots_pre_mutation_version() {
        let mut store = MemoryStore::default();
        let page = store.insert_page(&new_page("notes", "Notes", "v1 body")).expect("insert");

        let content =
            PageContent { title: "Notes 2".to_string(), slug: "notes".to_string(), body: "v2".to_string() };
        let revised = store.revise_page(page.id, Some("u1"), &content).expect("revise");

        assert_eq!(revised.version, 2);
        let snapshot = store.page_version(page.id, None).expect("snapshot");
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.body, "v1 body");
        assert_eq!(snapshot.author_id.as_deref(), Some("u1"));
    }

    #[test]
    fn revise_to_taken_slug_is_a_conflict_without_snapshot() {
        let mut store = MemoryStore::default();
        let a = store.insert_page(&new_page("a", "A", "")).expect("insert a");
        store.insert_page(&new_page("b", "B", "")).expect("insert b");

        let content = PageContent { title: "A".to_string(), slug: "b".to_string(), body: String::new() };
        let error = store.revise_page(a.id, None, &content).expect_err("slug taken");
        assert!(matches!(error, FolioError::Conflict));
        assert!(store.page_versions(a.id, 10).is_empty());
    }

    #[test]
    fn delete_cascades_versions_and_page_rules() {
        let mut store = MemoryStore::default();
        let page = store.insert_page(&new_page("notes", "Notes", "")).expect("insert");
        store.upsert_rule(&NewRule {
            workspace_id: "w1",
            scope: RuleScope::Page(page.id),
            role_id: "r1",
            channel_id: None,
            can_read: true,
            can_write: false,
        });
        store.upsert_rule(&NewRule {
            workspace_id: "w1",
            scope: RuleScope::Workspace,
            role_id: "r1",
            channel_id: None,
            can_read: true,
            can_write: true,
        });

        store.delete_page(page.id, Some("u1")).expect("delete");
        assert!(store.page_by_slug("w1", "notes").is_none());
        assert!(store.page_versions(page.id, 10).is_empty());
        assert_eq!(store.list_rules("w1", RuleScope::Workspace).len(), 1);
        assert!(store.list_rules("w1", RuleScope::Page(page.id)).is_empty());
    }

    #[test]
    fn upsert_overwrites_same_scope_role_and_channel() {
        let mut store = MemoryStore::default();
        let rule = NewRule {
            workspace_id: "w1",
            scope: RuleScope::Workspace,
            role_id: "r1",
            channel_id: Some("c1"),
            can_read: true,
            can_write: false,
        };
        let first = store.upsert_rule(&rule);
        let second = store.upsert_rule(&NewRule { can_write: true, ..rule.clone() });
        assert_eq!(first.id, second.id);
        assert!(second.can_write);

        store.upsert_rule(&NewRule { channel_id: None, ..rule });
        assert_eq!(store.list_rules("w1", RuleScope::Workspace).len(), 2);
    }

    #[test]
    fn list_orders_by_most_recent_update() {
        let mut store = MemoryStore::default();
        let a = store.insert_page(&new_page("a", "A", "")).expect("insert a");
        store.insert_page(&new_page("b", "B", "")).expect("insert b");
        let content = PageContent { title: "A".to_string(), slug: "a".to_string(), body: "x".to_string() };
        store.revise_page(a.id, None, &content).expect("touch a");

        let slice = store.list_pages("w1", &PageFilter::default(), 0, 10);
        let slugs: Vec<_> = slice.items.iter().map(|item| item.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "b"]);
        assert_eq!(slice.total, 2);
    }

    #[test]
    fn search_ranks_by_term_hits() {
        let mut store = MemoryStore::default();
        store.insert_page(&new_page("one", "Deploy", "deploy deploy deploy")).expect("insert");
        store.insert_page(&new_page("two", "Notes", "deploy once")).expect("insert");
        store.insert_page(&new_page("three", "Other", "nothing")).expect("insert");

        let hits = store.search_pages("w1", "deploy", 10);
        let slugs: Vec<_> = hits.iter().map(|hit| hit.slug.as_str()).collect();
        assert_eq!(slugs, vec!["one", "two"]);
    }
}
