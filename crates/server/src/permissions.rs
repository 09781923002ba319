// Permission resolution.
//
// Rules are an allow-list. For a (workspace, actor, page) triple:
//
//   1. Admins pass unconditionally.
//   2. Rules scoped to the page and workspace-wide rules are counted
//      together. None at all means the scope is open.
//   3. Otherwise at least one of those rules must match the actor's roles,
//      its channel restriction (if any) and the requested capability.
//
// Step 2 pools both scopes: one workspace-wide rule locks down every page in
// the workspace, including pages with no rule of their own.

use folio_common::types::{Access, Actor};
use tracing::debug;
use uuid::Uuid;

use crate::{error::FolioError, store::Store};

#[derive(Clone)]
pub struct PermissionEngine {
    store: Store,
}

impl PermissionEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn can_read(
        &self,
        actor: &Actor,
        workspace_id: &str,
        page_id: Option<Uuid>,
    ) -> Result<bool, FolioError> {
        self.allows(actor, workspace_id, page_id, Access::Read).await
    }

    pub async fn can_write(
        &self,
        actor: &Actor,
        workspace_id: &str,
        page_id: Option<Uuid>,
    ) -> Result<bool, FolioError> {
        self.allows(actor, workspace_id, page_id, Access::Write).await
    }

    /// `Ok(())` when allowed, [`FolioError::PermissionDenied`] otherwise.
    pub async fn authorize(
        &self,
        actor: &Actor,
        workspace_id: &str,
        page_id: Option<Uuid>,
        access: Access,
    ) -> Result<(), FolioError> {
        if self.allows(actor, workspace_id, page_id, access).await? {
            Ok(())
        } else {
            debug!(
                workspace_id,
                user_id = %actor.user_id,
                page_id = ?page_id,
                access = access.as_str(),
                "permission denied"
            );
            Err(FolioError::PermissionDenied(access))
        }
    }

    /// Administrative commands bypass rules but require the capability.
    pub fn require_admin(&self, actor: &Actor) -> Result<(), FolioError> {
        if actor.is_admin {
            Ok(())
        } else {
            Err(FolioError::AdminRequired)
        }
    }

    async fn allows(
        &self,
        actor: &Actor,
        workspace_id: &str,
        page_id: Option<Uuid>,
        access: Access,
    ) -> Result<bool, FolioError> {
        if actor.is_admin {
            return Ok(true);
        }

        if self.store.count_applicable_rules(workspace_id, page_id).await? == 0 {
            return Ok(true);
        }

        let rules = self.store.applicable_rules(workspace_id, page_id).await?;
        Ok(rules.iter().any(|rule| rule.grants(actor, access)))
    }
}
