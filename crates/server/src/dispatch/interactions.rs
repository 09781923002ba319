// Button presses, modal submissions and autocomplete.

use std::collections::BTreeMap;

use folio_common::{
    protocol::{
        command::command_spec,
        reply::MAX_CHOICES,
        Choice, EventContext, FocusedOption, InteractionToken, Reply, Response, TokenAction,
    },
    types::{Access, PageContent},
};
use tracing::{debug, info, warn};

use super::{render, Caller, Dispatcher, INVALID_ACTION, NO_WORKSPACE};
use crate::{error::FolioError, store::PageFilter};

/// Field id of the body input on the edit modal.
pub const BODY_FIELD: &str = "body";

impl Dispatcher {
    fn decode_token(&self, workspace_id: &str, custom_id: &str) -> Option<TokenAction> {
        match InteractionToken::decode(custom_id, workspace_id) {
            Ok(token) => Some(token.action),
            Err(error) => {
                warn!(workspace_id, custom_id, error = %error, "rejected interaction token");
                None
            }
        }
    }

    pub(super) async fn on_button(&self, context: &EventContext, custom_id: &str) -> Result<Response, FolioError> {
        let Some(workspace_id) = context.workspace_id.as_deref() else {
            return Ok(Response::ephemeral(NO_WORKSPACE));
        };
        let Some(action) = self.decode_token(workspace_id, custom_id) else {
            return Ok(Response::ephemeral(INVALID_ACTION));
        };

        info!(
            kind = "button_press",
            workspace_id,
            intent = action.kind().prefix(),
            user_id = %context.actor.user_id,
            "event dispatched"
        );

        let caller = Caller { workspace_id, actor: &context.actor };
        let reply: Reply = match action {
            TokenAction::PageList { search, page } => self.list_window(&caller, &search, page).await?,
            TokenAction::Open { slug } => {
                let page = self.open_by_slug(&caller, &slug, Access::Read).await?;
                render::page_view(workspace_id, &page)
            }
            TokenAction::Edit { slug } => {
                let page = self.open_by_slug(&caller, &slug, Access::Write).await?;
                return Ok(match render::edit_modal(workspace_id, &page) {
                    Some(modal) => Response::Modal(modal),
                    None => Response::ephemeral("This page cannot be edited from here. Use /import instead."),
                });
            }
            TokenAction::Delete { slug } => {
                let page = self.open_by_slug(&caller, &slug, Access::Write).await?;
                render::delete_prompt(workspace_id, &page)
            }
            TokenAction::DeleteConfirm { slug } => {
                let page = self.open_by_slug(&caller, &slug, Access::Write).await?;
                self.history.delete(&page, caller.author()).await?;
                Reply::new(format!("Deleted {} (slug: {}).", page.title, page.slug)).ephemeral()
            }
            TokenAction::EditModal { .. } => {
                debug!(workspace_id, custom_id, "modal token used on a button");
                Reply::new(INVALID_ACTION).ephemeral()
            }
        };
        Ok(reply.into())
    }

    pub(super) async fn on_modal(
        &self,
        context: &EventContext,
        custom_id: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Response, FolioError> {
        let Some(workspace_id) = context.workspace_id.as_deref() else {
            return Ok(Response::ephemeral(NO_WORKSPACE));
        };
        let Some(TokenAction::EditModal { slug }) = self.decode_token(workspace_id, custom_id) else {
            return Ok(Response::ephemeral(INVALID_ACTION));
        };

        info!(
            kind = "modal_submit",
            workspace_id,
            intent = "pm",
            user_id = %context.actor.user_id,
            "event dispatched"
        );

        let body = fields.get(BODY_FIELD).ok_or_else(|| FolioError::validation("Missing content."))?;
        let caller = Caller { workspace_id, actor: &context.actor };
        let page = self.open_by_slug(&caller, &slug, Access::Write).await?;
        let content = PageContent { title: page.title.clone(), slug: page.slug.clone(), body: body.clone() };
        let page = self.apply(&caller, page, content).await?;
        Ok(render::page_view(workspace_id, &page).into())
    }

    /// Up to 25 page choices matching what the user has typed so far.
    ///
    /// Never fails: anything unexpected yields an empty list.
    pub(super) async fn on_autocomplete(
        &self,
        context: &EventContext,
        command: &str,
        focused: &FocusedOption,
    ) -> Response {
        let empty = Response::Choices { choices: Vec::new() };
        let Some(workspace_id) = context.workspace_id.as_deref() else {
            return empty;
        };
        let completes_pages = command_spec(command)
            .and_then(|spec| spec.options.iter().find(|option| option.name == focused.name))
            .is_some_and(|option| option.autocomplete);
        if !completes_pages {
            return empty;
        }

        match self.page_choices(workspace_id, context, &focused.text()).await {
            Ok(choices) => Response::Choices { choices },
            Err(error) => {
                debug!(workspace_id, command, error = %error, "autocomplete suppressed");
                empty
            }
        }
    }

    async fn page_choices(
        &self,
        workspace_id: &str,
        context: &EventContext,
        typed: &str,
    ) -> Result<Vec<Choice>, FolioError> {
        if !self.permissions.can_read(&context.actor, workspace_id, None).await? {
            return Ok(Vec::new());
        }
        let slice = self.store.list_pages(workspace_id, &PageFilter::new(typed), 0, MAX_CHOICES).await?;
        Ok(slice.items.iter().map(|item| Choice::new(&item.title, item.slug.clone())).collect())
    }

    /// Load the page a token points at and check `access` on it.
    async fn open_by_slug(
        &self,
        caller: &Caller<'_>,
        slug: &str,
        access: Access,
    ) -> Result<folio_common::types::Page, FolioError> {
        let page = self
            .store
            .page_by_slug(caller.workspace_id, slug)
            .await?
            .ok_or(FolioError::NotFound("page"))?;
        self.permissions.authorize(caller.actor, caller.workspace_id, Some(page.id), access).await?;
        Ok(page)
    }
}
