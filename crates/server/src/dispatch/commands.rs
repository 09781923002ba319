// Slash-command handlers.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use folio_common::{
    backlink::links_to,
    metadata::{add_tags, decode_tags, fold_into_title, normalize_tag, parse_tag_list, remove_tags, unfold_title},
    protocol::{
        command::help_text, token::MAX_LIST_PAGE, Command, CommandError, CommandInvocation, Reply, Response,
    },
    slug::{normalize_slug, slug_base},
    types::{Access, Page, PageContent, PageSummary},
};
use tracing::info;

use super::{render, resolve, Caller, Dispatcher, LIST_PAGE_SIZE, NO_WORKSPACE, SEARCH_LIMIT, UNKNOWN_COMMAND};
use crate::{
    error::FolioError,
    store::{NewPage, NewRule, PageFilter, RuleScope},
};

/// Folder that holds template pages.
pub const TEMPLATE_FOLDER: &str = "templates";

/// Re-allocation attempts when a freshly allocated slug is taken before the
/// rename commits.
const RENAME_SLUG_ATTEMPTS: usize = 3;

impl Dispatcher {
    pub(super) async fn on_command(
        &self,
        context: &folio_common::protocol::EventContext,
        invocation: &CommandInvocation,
    ) -> Result<Response, FolioError> {
        let Some(workspace_id) = context.workspace_id.as_deref() else {
            return Ok(Response::ephemeral(NO_WORKSPACE));
        };

        let command = match Command::parse(invocation) {
            Ok(command) => command,
            Err(CommandError::Unknown(name)) => {
                info!(workspace_id, command = %name, "unknown command");
                return Ok(Response::ephemeral(UNKNOWN_COMMAND));
            }
            Err(error) => return Err(FolioError::validation(format!("Invalid input: {error}."))),
        };

        info!(
            kind = "command",
            workspace_id,
            intent = command.name(),
            user_id = %context.actor.user_id,
            "event dispatched"
        );

        if !matches!(command, Command::Help) {
            self.store.ensure_workspace(workspace_id).await?;
        }

        let caller = Caller { workspace_id, actor: &context.actor };
        self.run_command(&caller, command).await.map(Response::from)
    }

    async fn run_command(&self, caller: &Caller<'_>, command: Command) -> Result<Reply, FolioError> {
        match command {
            Command::Help => Ok(Reply::new(help_text()).ephemeral()),
            Command::PageCreate { title, content } => {
                self.page_create(caller, &title, content.as_deref().unwrap_or("")).await
            }
            Command::PageOpen { query } => self.page_open(caller, &query).await,
            Command::PageList { search } => {
                self.list_window(caller, search.as_deref().unwrap_or(""), 1).await
            }
            Command::PageRename { query, title, keep_slug } => {
                self.page_rename(caller, &query, &title, keep_slug).await
            }
            Command::PageMove { query, folder } => self.page_move(caller, &query, &folder).await,
            Command::TagAdd { query, tags } => self.retag(caller, &query, &tags, true).await,
            Command::TagRemove { query, tags } => self.retag(caller, &query, &tags, false).await,
            Command::TagList { search } => self.tag_list(caller, search.as_deref().unwrap_or("")).await,
            Command::Search { q } => self.search(caller, &q).await,
            Command::Daily { date } => self.daily(caller, date.as_deref()).await,
            Command::TemplateCreate { name, content } => {
                self.template_create(caller, &name, &content).await
            }
            Command::TemplateUse { name, title } => self.template_use(caller, &name, &title).await,
            Command::Backlinks { query } => self.backlinks(caller, &query).await,
            Command::Export { query } => {
                let page = self.readable_page(caller, &query).await?;
                Ok(render::export(&page))
            }
            Command::Import { query, content } => self.import(caller, &query, content).await,
            Command::PageHistory { query, limit } => {
                let page = self.readable_page(caller, &query).await?;
                let versions = self.history.list(&page, limit).await?;
                Ok(render::history(&page, &versions))
            }
            Command::PageRollback { query, version } => self.rollback(caller, &query, version).await,
            Command::PermSet { role_id, read, write, query, channel_id } => {
                self.perm_set(caller, &role_id, read, write, query.as_deref(), channel_id.as_deref())
                    .await
            }
            Command::PermList { query } => self.perm_list(caller, query.as_deref()).await,
            Command::PermClear { query } => self.perm_clear(caller, query.as_deref()).await,
        }
    }

    // ── Shared helpers ────────────────────────────────────────────────

    async fn readable_page(&self, caller: &Caller<'_>, query: &str) -> Result<Page, FolioError> {
        let page = resolve::require_page(&self.store, caller.workspace_id, query).await?;
        self.permissions.authorize(caller.actor, caller.workspace_id, Some(page.id), Access::Read).await?;
        Ok(page)
    }

    pub(super) async fn writable_page(&self, caller: &Caller<'_>, query: &str) -> Result<Page, FolioError> {
        let page = resolve::require_page(&self.store, caller.workspace_id, query).await?;
        self.permissions.authorize(caller.actor, caller.workspace_id, Some(page.id), Access::Write).await?;
        Ok(page)
    }

    async fn authorize_workspace(&self, caller: &Caller<'_>, access: Access) -> Result<(), FolioError> {
        self.permissions.authorize(caller.actor, caller.workspace_id, None, access).await
    }

    /// Apply `content` through the history manager. Unchanged content is not
    /// a mutation and leaves the page as it is.
    pub(super) async fn apply(
        &self,
        caller: &Caller<'_>,
        page: Page,
        content: PageContent,
    ) -> Result<Page, FolioError> {
        if content == page.content() {
            return Ok(page);
        }
        self.history.revise(&page, caller.author(), content).await
    }

    /// One window of the page list; the requested number is clamped to the
    /// windows that exist.
    pub(super) async fn list_window(
        &self,
        caller: &Caller<'_>,
        search: &str,
        requested: u32,
    ) -> Result<Reply, FolioError> {
        self.authorize_workspace(caller, Access::Read).await?;

        let search = search.trim();
        let filter = PageFilter::new(search);
        let requested = requested.clamp(1, MAX_LIST_PAGE);
        let offset_of = |window: u32| (window as usize - 1) * LIST_PAGE_SIZE;

        let mut slice =
            self.store.list_pages(caller.workspace_id, &filter, offset_of(requested), LIST_PAGE_SIZE).await?;
        let total_pages = slice.total.div_ceil(LIST_PAGE_SIZE).max(1) as u32;
        let current = requested.min(total_pages);
        if current != requested {
            slice = self
                .store
                .list_pages(caller.workspace_id, &filter, offset_of(current), LIST_PAGE_SIZE)
                .await?;
        }

        Ok(render::page_list(caller.workspace_id, search, current, total_pages, offset_of(current), &slice))
    }

    // ── Pages ─────────────────────────────────────────────────────────

    async fn page_create(&self, caller: &Caller<'_>, title: &str, body: &str) -> Result<Reply, FolioError> {
        self.authorize_workspace(caller, Access::Write).await?;
        let page = self.allocator.create_page(caller.workspace_id, title, body).await?;
        info!(workspace_id = caller.workspace_id, slug = %page.slug, "page created");
        Ok(render::page_view(caller.workspace_id, &page))
    }

    async fn page_open(&self, caller: &Caller<'_>, query: &str) -> Result<Reply, FolioError> {
        let page = self.readable_page(caller, query).await?;
        Ok(render::page_view(caller.workspace_id, &page))
    }

    async fn page_rename(
        &self,
        caller: &Caller<'_>,
        query: &str,
        title: &str,
        keep_slug: bool,
    ) -> Result<Reply, FolioError> {
        let page = self.writable_page(caller, query).await?;

        let (current_folder, _) = unfold_title(&page.title);
        let (given_folder, bare) = unfold_title(title);
        if bare.is_empty() {
            return Err(FolioError::validation("The new title cannot be empty."));
        }
        let folder = if given_folder.is_empty() { current_folder } else { given_folder };
        let new_title = fold_into_title(&bare, &folder);

        if keep_slug {
            let content = PageContent { title: new_title, slug: page.slug.clone(), body: page.body.clone() };
            let page = self.apply(caller, page, content).await?;
            return Ok(render::page_view(caller.workspace_id, &page));
        }

        for _ in 0..RENAME_SLUG_ATTEMPTS {
            let slug = self.allocator.allocate(caller.workspace_id, &bare, Some(&page.slug)).await?;
            let content = PageContent { title: new_title.clone(), slug, body: page.body.clone() };
            match self.apply(caller, page.clone(), content).await {
                Err(FolioError::Conflict) => continue,
                result => return result.map(|page| render::page_view(caller.workspace_id, &page)),
            }
        }
        Err(FolioError::Conflict)
    }

    async fn page_move(&self, caller: &Caller<'_>, query: &str, folder: &str) -> Result<Reply, FolioError> {
        let page = self.writable_page(caller, query).await?;
        let content = PageContent {
            title: fold_into_title(&page.title, folder),
            slug: page.slug.clone(),
            body: page.body.clone(),
        };
        let page = self.apply(caller, page, content).await?;
        Ok(render::page_view(caller.workspace_id, &page))
    }

    async fn import(&self, caller: &Caller<'_>, query: &str, body: String) -> Result<Reply, FolioError> {
        let page = self.writable_page(caller, query).await?;
        let content = PageContent { title: page.title.clone(), slug: page.slug.clone(), body };
        let page = self.apply(caller, page, content).await?;
        Ok(render::page_view(caller.workspace_id, &page))
    }

    async fn rollback(&self, caller: &Caller<'_>, query: &str, version: Option<i64>) -> Result<Reply, FolioError> {
        let target = match version {
            None => None,
            Some(value) => match i32::try_from(value) {
                Ok(value) if value >= 1 => Some(value),
                _ => return Err(FolioError::validation("Version must be a positive number.")),
            },
        };

        let page = self.writable_page(caller, query).await?;
        let page = match self.history.rollback(&page, target, caller.author()).await {
            Err(FolioError::Conflict) => {
                return Err(FolioError::validation(
                    "That version's slug is now used by another page. Rename that page first.",
                ))
            }
            result => result?,
        };
        Ok(render::page_view(caller.workspace_id, &page))
    }

    async fn backlinks(&self, caller: &Caller<'_>, query: &str) -> Result<Reply, FolioError> {
        let page = self.readable_page(caller, query).await?;
        let linking: Vec<PageSummary> = self
            .store
            .scan_pages(caller.workspace_id, Some("[["))
            .await?
            .into_iter()
            .filter(|other| other.id != page.id && links_to(&other.body, &page.slug, &page.title))
            .map(|other| PageSummary {
                id: other.id,
                slug: other.slug,
                title: other.title,
                updated_at: other.updated_at,
            })
            .collect();

        Ok(render::summary_list(
            &format!("Backlinks to {} ({})", page.title, linking.len()),
            &linking,
            "No backlinks found.",
        ))
    }

    // ── Tags ──────────────────────────────────────────────────────────

    async fn retag(&self, caller: &Caller<'_>, query: &str, tags: &str, add: bool) -> Result<Reply, FolioError> {
        let tags = parse_tag_list(tags);
        if tags.is_empty() {
            return Err(FolioError::validation(
                "No valid tags given. Tags use a-z, 0-9, _ or - and are at most 32 characters.",
            ));
        }

        let page = self.writable_page(caller, query).await?;
        let body = if add { add_tags(&page.body, &tags) } else { remove_tags(&page.body, &tags) };
        let content = PageContent { title: page.title.clone(), slug: page.slug.clone(), body };
        let page = self.apply(caller, page, content).await?;
        Ok(render::page_view(caller.workspace_id, &page))
    }

    async fn tag_list(&self, caller: &Caller<'_>, search: &str) -> Result<Reply, FolioError> {
        self.authorize_workspace(caller, Access::Read).await?;

        let needle = normalize_tag(search).unwrap_or_else(|| search.trim().to_lowercase());
        let mut counts: HashMap<String, usize> = HashMap::new();
        for page in self.store.scan_pages(caller.workspace_id, Some("tags:")).await? {
            for tag in decode_tags(&page.body).tags {
                *counts.entry(tag).or_default() += 1;
            }
        }

        let mut tags: Vec<(String, usize)> =
            counts.into_iter().filter(|(tag, _)| tag.contains(needle.as_str())).collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        if tags.is_empty() {
            let message = if needle.is_empty() { "No tags yet." } else { "No tags found for that search." };
            return Ok(Reply::new(message).ephemeral());
        }

        let mut header = format!("Tags ({})", tags.len());
        if !needle.is_empty() {
            header.push_str(&format!(" | search: {needle}"));
        }
        let lines: Vec<String> = tags.iter().map(|(tag, count)| format!("#{tag}  ({count})")).collect();
        Ok(Reply::new(format!("{header}\n\n{}", lines.join("\n"))).ephemeral())
    }

    // ── Search ────────────────────────────────────────────────────────

    async fn search(&self, caller: &Caller<'_>, query: &str) -> Result<Reply, FolioError> {
        self.authorize_workspace(caller, Access::Read).await?;
        let hits = self.store.search_pages(caller.workspace_id, query, SEARCH_LIMIT).await?;
        Ok(render::summary_list(&format!("Search results for: {query}"), &hits, "No results."))
    }

    // ── Daily notes ───────────────────────────────────────────────────

    async fn daily(&self, caller: &Caller<'_>, date: Option<&str>) -> Result<Reply, FolioError> {
        let date = match date {
            None => Utc::now().date_naive(),
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| FolioError::validation("Date must be in YYYY-MM-DD format."))?,
        };
        let day = date.format("%Y-%m-%d").to_string();
        let slug = format!("daily-{day}");

        if let Some(page) = self.store.page_by_slug(caller.workspace_id, &slug).await? {
            self.permissions.authorize(caller.actor, caller.workspace_id, Some(page.id), Access::Read).await?;
            return Ok(render::page_view(caller.workspace_id, &page));
        }

        self.authorize_workspace(caller, Access::Write).await?;
        let title = fold_into_title(&day, "daily");
        let body = format!("# {day}");
        let new_page = NewPage { workspace_id: caller.workspace_id, slug: &slug, title: &title, body: &body };
        let page = match self.store.insert_page(new_page).await {
            // Created by a concurrent request; open that one.
            Err(FolioError::Conflict) => self
                .store
                .page_by_slug(caller.workspace_id, &slug)
                .await?
                .ok_or(FolioError::Conflict)?,
            result => result?,
        };
        Ok(render::page_view(caller.workspace_id, &page))
    }

    // ── Templates ─────────────────────────────────────────────────────

    async fn template_create(&self, caller: &Caller<'_>, name: &str, content: &str) -> Result<Reply, FolioError> {
        let slug = template_slug(name)?;
        let title = fold_into_title(name, TEMPLATE_FOLDER);

        let page = match self.store.page_by_slug(caller.workspace_id, &slug).await? {
            Some(existing) if !is_template(&existing) => {
                return Err(FolioError::validation(format!(
                    "A page that is not a template already uses the slug {}. Rename that page first.",
                    existing.slug
                )));
            }
            Some(existing) => {
                self.permissions
                    .authorize(caller.actor, caller.workspace_id, Some(existing.id), Access::Write)
                    .await?;
                let revised = PageContent { title, slug: existing.slug.clone(), body: content.to_string() };
                self.apply(caller, existing, revised).await?
            }
            None => {
                self.authorize_workspace(caller, Access::Write).await?;
                self.store
                    .insert_page(NewPage {
                        workspace_id: caller.workspace_id,
                        slug: &slug,
                        title: &title,
                        body: content,
                    })
                    .await?
            }
        };

        info!(workspace_id = caller.workspace_id, slug = %page.slug, "template saved");
        Ok(Reply::new(format!("Template saved: {} (slug: {}, version {})", name.trim(), page.slug, page.version))
            .ephemeral())
    }

    async fn template_use(&self, caller: &Caller<'_>, name: &str, title: &str) -> Result<Reply, FolioError> {
        let slug = template_slug(name)?;
        let template = self
            .store
            .page_by_slug(caller.workspace_id, &slug)
            .await?
            .filter(is_template)
            .ok_or(FolioError::NotFound("template"))?;
        self.permissions.authorize(caller.actor, caller.workspace_id, Some(template.id), Access::Read).await?;
        self.authorize_workspace(caller, Access::Write).await?;

        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        let body = template.body.replace("{{title}}", title).replace("{{date}}", &today);
        let page = self.allocator.create_page(caller.workspace_id, title, &body).await?;
        info!(workspace_id = caller.workspace_id, slug = %page.slug, template = %template.slug, "page created from template");
        Ok(render::page_view(caller.workspace_id, &page))
    }

    // ── Permissions ───────────────────────────────────────────────────

    async fn rule_scope(&self, caller: &Caller<'_>, query: Option<&str>) -> Result<(RuleScope, String), FolioError> {
        match query {
            None => Ok((RuleScope::Workspace, "the whole workspace".to_string())),
            Some(query) => {
                let page = resolve::require_page(&self.store, caller.workspace_id, query).await?;
                Ok((RuleScope::Page(page.id), format!("page {}", page.slug)))
            }
        }
    }

    async fn perm_set(
        &self,
        caller: &Caller<'_>,
        role_id: &str,
        read: bool,
        write: bool,
        query: Option<&str>,
        channel_id: Option<&str>,
    ) -> Result<Reply, FolioError> {
        self.permissions.require_admin(caller.actor)?;
        let (scope, label) = self.rule_scope(caller, query).await?;

        let rule = self
            .store
            .upsert_rule(NewRule {
                workspace_id: caller.workspace_id,
                scope,
                role_id,
                channel_id,
                can_read: read,
                can_write: write,
            })
            .await?;

        info!(workspace_id = caller.workspace_id, role_id, scope = %label, read, write, "permission rule saved");
        Ok(Reply::new(format!("Permission saved for {label}:\n{}", render::rule_line(&rule))).ephemeral())
    }

    async fn perm_list(&self, caller: &Caller<'_>, query: Option<&str>) -> Result<Reply, FolioError> {
        self.permissions.require_admin(caller.actor)?;
        let (scope, label) = self.rule_scope(caller, query).await?;
        let rules = self.store.list_rules(caller.workspace_id, scope).await?;
        Ok(render::rules(&label, &rules))
    }

    async fn perm_clear(&self, caller: &Caller<'_>, query: Option<&str>) -> Result<Reply, FolioError> {
        self.permissions.require_admin(caller.actor)?;
        let (scope, label) = self.rule_scope(caller, query).await?;
        let removed = self.store.clear_rules(caller.workspace_id, scope).await?;
        info!(workspace_id = caller.workspace_id, scope = %label, removed, "permission rules cleared");
        Ok(Reply::new(format!("Cleared {removed} permission rule(s) for {label}.")).ephemeral())
    }
}

/// `template-<name>`, clipped like any other slug.
pub fn template_slug(name: &str) -> Result<String, FolioError> {
    if normalize_slug(name).is_empty() {
        return Err(FolioError::validation("Template names need at least one letter or digit."));
    }
    Ok(slug_base(&format!("template {name}")))
}

/// Template pages live in [`TEMPLATE_FOLDER`]; a look-alike slug is not enough.
fn is_template(page: &Page) -> bool {
    unfold_title(&page.title).0 == TEMPLATE_FOLDER
}
