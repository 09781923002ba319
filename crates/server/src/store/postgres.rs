// PostgreSQL backend. Schema lives in `src/db/migrations`.

use chrono::{DateTime, Utc};
use folio_common::types::{Page, PageContent, PageSummary, PageVersion, PermissionRule};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{like_escape, NewPage, NewRule, PageFilter, PageSlice, RuleScope};
use crate::error::{map_sqlx_error, FolioError};

const PAGE_COLUMNS: &str = "id, workspace_id, slug, title, body, version, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PageRow {
    id: Uuid,
    workspace_id: String,
    slug: String,
    title: String,
    body: String,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PageRow> for Page {
    fn from(row: PageRow) -> Self {
        Self {
            id: row.id,
            workspace_id: row.workspace_id,
            slug: row.slug,
            title: row.title,
            body: row.body,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: Uuid,
    slug: String,
    title: String,
    updated_at: DateTime<Utc>,
}

impl From<SummaryRow> for PageSummary {
    fn from(row: SummaryRow) -> Self {
        Self { id: row.id, slug: row.slug, title: row.title, updated_at: row.updated_at }
    }
}

#[derive(sqlx::FromRow)]
struct VersionRow {
    page_id: Uuid,
    version: i32,
    title: String,
    slug: String,
    body: String,
    author_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<VersionRow> for PageVersion {
    fn from(row: VersionRow) -> Self {
        Self {
            page_id: row.page_id,
            version: row.version,
            title: row.title,
            slug: row.slug,
            body: row.body,
            author_id: row.author_id,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    workspace_id: String,
    page_id: Option<Uuid>,
    role_id: String,
    channel_id: Option<String>,
    can_read: bool,
    can_write: bool,
    created_at: DateTime<Utc>,
}

impl From<RuleRow> for PermissionRule {
    fn from(row: RuleRow) -> Self {
        Self {
            id: row.id,
            workspace_id: row.workspace_id,
            page_id: row.page_id,
            role_id: row.role_id,
            channel_id: row.channel_id,
            can_read: row.can_read,
            can_write: row.can_write,
            created_at: row.created_at,
        }
    }
}

// ── Workspaces ─────────────────────────────────────────────────────

pub(super) async fn ensure_workspace(pool: &PgPool, workspace_id: &str) -> Result<(), FolioError> {
    sqlx::query("INSERT INTO workspaces (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(workspace_id)
        .execute(pool)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}

// ── Pages ──────────────────────────────────────────────────────────

pub(super) async fn page_by_slug(
    pool: &PgPool,
    workspace_id: &str,
    slug: &str,
) -> Result<Option<Page>, FolioError> {
    let row = sqlx::query_as::<_, PageRow>(&format!(
        "SELECT {PAGE_COLUMNS} FROM pages WHERE workspace_id = $1 AND slug = $2"
    ))
    .bind(workspace_id)
    .bind(slug)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(row.map(Into::into))
}

pub(super) async fn page_by_title(
    pool: &PgPool,
    workspace_id: &str,
    title: &str,
) -> Result<Option<Page>, FolioError> {
    let row = sqlx::query_as::<_, PageRow>(&format!(
        r#"
        SELECT {PAGE_COLUMNS}
        FROM pages
        WHERE workspace_id = $1 AND lower(title) = lower($2)
        ORDER BY updated_at DESC
        LIMIT 1
        "#
    ))
    .bind(workspace_id)
    .bind(title)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(row.map(Into::into))
}

pub(super) async fn slug_taken(pool: &PgPool, workspace_id: &str, slug: &str) -> Result<bool, FolioError> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM pages WHERE workspace_id = $1 AND slug = $2)",
    )
    .bind(workspace_id)
    .bind(slug)
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)
}

pub(super) async fn insert_page(pool: &PgPool, page: &NewPage<'_>) -> Result<Page, FolioError> {
    let row = sqlx::query_as::<_, PageRow>(&format!(
        r#"
        INSERT INTO pages (id, workspace_id, slug, title, body)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {PAGE_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(page.workspace_id)
    .bind(page.slug)
    .bind(page.title)
    .bind(page.body)
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(row.into())
}

fn contains_pattern(value: &str) -> String {
    format!("%{}%", like_escape(value))
}

pub(super) async fn list_pages(
    pool: &PgPool,
    workspace_id: &str,
    filter: &PageFilter,
    offset: usize,
    limit: usize,
) -> Result<PageSlice, FolioError> {
    const FILTER: &str = r#"
        workspace_id = $1
        AND (
            $2::text IS NULL
            OR title ILIKE $2 ESCAPE '\'
            OR ($3::text IS NOT NULL AND slug LIKE $3 ESCAPE '\')
            OR body ILIKE $2 ESCAPE '\'
        )
    "#;

    let text_pattern = filter.text.as_deref().map(contains_pattern);
    let slug_pattern = filter.slug.as_deref().map(contains_pattern);

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT count(*) FROM pages WHERE {FILTER}"))
        .bind(workspace_id)
        .bind(text_pattern.as_deref())
        .bind(slug_pattern.as_deref())
        .fetch_one(pool)
        .await
        .map_err(map_sqlx_error)?;

    let rows = sqlx::query_as::<_, SummaryRow>(&format!(
        r#"
        SELECT id, slug, title, updated_at
        FROM pages
        WHERE {FILTER}
        ORDER BY updated_at DESC, id
        OFFSET $4
        LIMIT $5
        "#
    ))
    .bind(workspace_id)
    .bind(text_pattern.as_deref())
    .bind(slug_pattern.as_deref())
    .bind(offset as i64)
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(PageSlice { items: rows.into_iter().map(Into::into).collect(), total: total.max(0) as usize })
}

pub(super) async fn search_pages(
    pool: &PgPool,
    workspace_id: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<PageSummary>, FolioError> {
    let rows = sqlx::query_as::<_, SummaryRow>(
        r#"
        SELECT id, slug, title, updated_at
        FROM pages, websearch_to_tsquery('simple', $2) AS query
        WHERE workspace_id = $1 AND search_vector @@ query
        ORDER BY ts_rank(search_vector, query) DESC, updated_at DESC
        LIMIT $3
        "#,
    )
    .bind(workspace_id)
    .bind(query)
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(rows.into_iter().map(Into::into).collect())
}

pub(super) async fn scan_pages(
    pool: &PgPool,
    workspace_id: &str,
    needle: Option<&str>,
) -> Result<Vec<Page>, FolioError> {
    let pattern = needle.map(contains_pattern);
    let rows = sqlx::query_as::<_, PageRow>(&format!(
        r#"
        SELECT {PAGE_COLUMNS}
        FROM pages
        WHERE workspace_id = $1 AND ($2::text IS NULL OR body ILIKE $2 ESCAPE '\')
        ORDER BY updated_at DESC, id
        "#
    ))
    .bind(workspace_id)
    .bind(pattern.as_deref())
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(rows.into_iter().map(Into::into).collect())
}

async fn lock_page(tx: &mut Transaction<'_, Postgres>, page_id: Uuid) -> Result<PageRow, FolioError> {
    sqlx::query_as::<_, PageRow>(&format!(
        "SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1 FOR UPDATE"
    ))
    .bind(page_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_sqlx_error)?
    .ok_or(FolioError::NotFound("page"))
}

async fn snapshot_locked(
    tx: &mut Transaction<'_, Postgres>,
    page: &PageRow,
    author_id: Option<&str>,
) -> Result<(), FolioError> {
    sqlx::query(
        r#"
        INSERT INTO page_versions (id, page_id, version, title, slug, body, author_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(page.id)
    .bind(page.version)
    .bind(&page.title)
    .bind(&page.slug)
    .bind(&page.body)
    .bind(author_id)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

pub(super) async fn revise_page(
    pool: &PgPool,
    page_id: Uuid,
    author_id: Option<&str>,
    content: &PageContent,
) -> Result<Page, FolioError> {
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

    let current = lock_page(&mut tx, page_id).await?;
    snapshot_locked(&mut tx, &current, author_id).await?;

    let row = sqlx::query_as::<_, PageRow>(&format!(
        r#"
        UPDATE pages
        SET title = $2,
            slug = $3,
            body = $4,
            version = version + 1,
            updated_at = now()
        WHERE id = $1
        RETURNING {PAGE_COLUMNS}
        "#
    ))
    .bind(page_id)
    .bind(&content.title)
    .bind(&content.slug)
    .bind(&content.body)
    .fetch_one(&mut *tx)
    .await
    .map_err(map_sqlx_error)?;

    tx.commit().await.map_err(map_sqlx_error)?;
    Ok(row.into())
}

pub(super) async fn delete_page(
    pool: &PgPool,
    page_id: Uuid,
    author_id: Option<&str>,
) -> Result<(), FolioError> {
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

    let current = lock_page(&mut tx, page_id).await?;
    snapshot_locked(&mut tx, &current, author_id).await?;

    sqlx::query("DELETE FROM pages WHERE id = $1")
        .bind(page_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

    tx.commit().await.map_err(map_sqlx_error)?;
    Ok(())
}

pub(super) async fn bump_version(pool: &PgPool, page_id: Uuid) -> Result<i32, FolioError> {
    sqlx::query_scalar::<_, i32>("UPDATE pages SET version = version + 1 WHERE id = $1 RETURNING version")
        .bind(page_id)
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(FolioError::NotFound("page"))
}

// ── Versions ───────────────────────────────────────────────────────

pub(super) async fn insert_snapshot(pool: &PgPool, snapshot: &PageVersion) -> Result<(), FolioError> {
    sqlx::query(
        r#"
        INSERT INTO page_versions (id, page_id, version, title, slug, body, author_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(snapshot.page_id)
    .bind(snapshot.version)
    .bind(&snapshot.title)
    .bind(&snapshot.slug)
    .bind(&snapshot.body)
    .bind(snapshot.author_id.as_deref())
    .bind(snapshot.created_at)
    .execute(pool)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

pub(super) async fn page_versions(
    pool: &PgPool,
    page_id: Uuid,
    limit: usize,
) -> Result<Vec<PageVersion>, FolioError> {
    let rows = sqlx::query_as::<_, VersionRow>(
        r#"
        SELECT page_id, version, title, slug, body, author_id, created_at
        FROM page_versions
        WHERE page_id = $1
        ORDER BY version DESC
        LIMIT $2
        "#,
    )
    .bind(page_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(rows.into_iter().map(Into::into).collect())
}

pub(super) async fn page_version(
    pool: &PgPool,
    page_id: Uuid,
    version: Option<i32>,
) -> Result<Option<PageVersion>, FolioError> {
    let row = sqlx::query_as::<_, VersionRow>(
        r#"
        SELECT page_id, version, title, slug, body, author_id, created_at
        FROM page_versions
        WHERE page_id = $1 AND ($2::int4 IS NULL OR version = $2)
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .bind(page_id)
    .bind(version)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(row.map(Into::into))
}

// ── Permission rules ───────────────────────────────────────────────

const RULE_COLUMNS: &str =
    "id, workspace_id, page_id, role_id, channel_id, can_read, can_write, created_at";

pub(super) async fn applicable_rules(
    pool: &PgPool,
    workspace_id: &str,
    page_id: Option<Uuid>,
) -> Result<Vec<PermissionRule>, FolioError> {
    let rows = sqlx::query_as::<_, RuleRow>(&format!(
        r#"
        SELECT {RULE_COLUMNS}
        FROM permission_rules
        WHERE workspace_id = $1 AND (page_id IS NULL OR page_id = $2::uuid)
        "#
    ))
    .bind(workspace_id)
    .bind(page_id)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(rows.into_iter().map(Into::into).collect())
}

pub(super) async fn count_applicable_rules(
    pool: &PgPool,
    workspace_id: &str,
    page_id: Option<Uuid>,
) -> Result<i64, FolioError> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT count(*)
        FROM permission_rules
        WHERE workspace_id = $1 AND (page_id IS NULL OR page_id = $2::uuid)
        "#,
    )
    .bind(workspace_id)
    .bind(page_id)
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)
}

pub(super) async fn upsert_rule(pool: &PgPool, rule: &NewRule<'_>) -> Result<PermissionRule, FolioError> {
    let row = sqlx::query_as::<_, RuleRow>(&format!(
        r#"
        INSERT INTO permission_rules (id, workspace_id, page_id, role_id, channel_id, can_read, can_write)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (
            workspace_id,
            coalesce(page_id, '00000000-0000-0000-0000-000000000000'::uuid),
            role_id,
            coalesce(channel_id, '')
        )
        DO UPDATE SET can_read = EXCLUDED.can_read, can_write = EXCLUDED.can_write
        RETURNING {RULE_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(rule.workspace_id)
    .bind(rule.scope.page_id())
    .bind(rule.role_id)
    .bind(rule.channel_id)
    .bind(rule.can_read)
    .bind(rule.can_write)
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(row.into())
}

pub(super) async fn list_rules(
    pool: &PgPool,
    workspace_id: &str,
    scope: RuleScope,
) -> Result<Vec<PermissionRule>, FolioError> {
    let rows = sqlx::query_as::<_, RuleRow>(&format!(
        r#"
        SELECT {RULE_COLUMNS}
        FROM permission_rules
        WHERE workspace_id = $1 AND page_id IS NOT DISTINCT FROM $2::uuid
        ORDER BY created_at, role_id
        "#
    ))
    .bind(workspace_id)
    .bind(scope.page_id())
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(rows.into_iter().map(Into::into).collect())
}

pub(super) async fn clear_rules(pool: &PgPool, workspace_id: &str, scope: RuleScope) -> Result<u64, FolioError> {
    let result = sqlx::query(
        "DELETE FROM permission_rules WHERE workspace_id = $1 AND page_id IS NOT DISTINCT FROM $2::uuid",
    )
    .bind(workspace_id)
    .bind(scope.page_id())
    .execute(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(result.rows_affected())
}
