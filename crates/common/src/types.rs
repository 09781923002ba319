// Core domain types shared across all folio crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A workspace is the tenant boundary: one per collaboration space.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workspace {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// A named markdown document within a workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub id: Uuid,
    pub workspace_id: String,
    /// Unique within the workspace, `^[a-z0-9]+(-[a-z0-9]+)*$`.
    pub slug: String,
    /// Free text; may carry a `[folder] ` prefix.
    pub title: String,
    /// Markdown; may carry a leading `tags:` header line.
    pub body: String,
    /// Starts at 1 and grows by one on every content-affecting mutation.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn content(&self) -> PageContent {
        PageContent { title: self.title.clone(), slug: self.slug.clone(), body: self.body.clone() }
    }
}

/// The mutable, versioned fields of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    pub slug: String,
    pub body: String,
}

/// Listing row: enough to render a line and build an open token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSummary {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot of a page taken immediately before a mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageVersion {
    pub page_id: Uuid,
    /// The page's version number at snapshot time (pre-mutation).
    pub version: i32,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub author_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Allow-list entry. `page_id: None` scopes the rule to the whole workspace,
/// `channel_id: None` matches any channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionRule {
    pub id: Uuid,
    pub workspace_id: String,
    pub page_id: Option<Uuid>,
    pub role_id: String,
    pub channel_id: Option<String>,
    pub can_read: bool,
    pub can_write: bool,
    pub created_at: DateTime<Utc>,
}

impl PermissionRule {
    /// Whether this rule grants `access` to `actor`.
    pub fn grants(&self, actor: &Actor, access: Access) -> bool {
        let holds_role = actor.roles.iter().any(|role| *role == self.role_id);
        let channel_ok = match &self.channel_id {
            None => true,
            Some(channel) => actor.channel_id.as_deref() == Some(channel.as_str()),
        };
        let flag = match access {
            Access::Read => self.can_read,
            Access::Write => self.can_write,
        };
        holds_role && channel_ok && flag
    }
}

/// The identity behind an inbound event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Actor {
    pub user_id: String,
    /// Role ids the actor currently holds; missing means none.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Administrative capability in the workspace (bypasses all rules).
    #[serde(default)]
    pub is_admin: bool,
    /// Channel the event arrived on.
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
}

impl Access {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}
