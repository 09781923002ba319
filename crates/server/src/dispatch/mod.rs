// Event dispatcher.
//
// Turns one gateway event into one response. Every event gets an answer:
// failures are rendered as short ephemeral replies and internal errors are
// logged with their full chain before a generic message goes out.

mod commands;
mod interactions;
pub mod render;
pub mod resolve;

use folio_common::{
    protocol::{Event, Response},
    types::Actor,
};
use tracing::{debug, error, warn};

use crate::{
    allocator::SlugAllocator, error::FolioError, history::HistoryManager, permissions::PermissionEngine,
    store::Store,
};

/// Pages per list window.
pub const LIST_PAGE_SIZE: usize = 10;

/// Results returned by full-text search.
pub const SEARCH_LIMIT: usize = 10;

const NO_WORKSPACE: &str = "This command only works inside a server.";
const INVALID_ACTION: &str = "Invalid action.";
const UNKNOWN_COMMAND: &str = "Unknown command.";

/// Who is acting, and in which workspace.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Caller<'a> {
    pub workspace_id: &'a str,
    pub actor: &'a Actor,
}

impl Caller<'_> {
    /// Identity recorded on snapshots.
    fn author(&self) -> Option<&str> {
        Some(self.actor.user_id.as_str()).filter(|id| !id.is_empty())
    }
}

/// Composition root for event handling. Cheap to clone; every clone shares
/// the same storage handle.
#[derive(Clone)]
pub struct Dispatcher {
    store: Store,
    allocator: SlugAllocator,
    permissions: PermissionEngine,
    history: HistoryManager,
}

impl Dispatcher {
    pub fn new(store: Store) -> Self {
        Self {
            allocator: SlugAllocator::new(store.clone()),
            permissions: PermissionEngine::new(store.clone()),
            history: HistoryManager::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn handle(&self, event: Event) -> Response {
        let kind = event.kind();
        let workspace_id = event.context().workspace_id.clone();

        let outcome = match &event {
            Event::Command { context, invocation } => self.on_command(context, invocation).await,
            Event::ButtonPress { context, custom_id } => self.on_button(context, custom_id).await,
            Event::ModalSubmit { context, custom_id, fields } => {
                self.on_modal(context, custom_id, fields).await
            }
            Event::Autocomplete { context, command, focused } => {
                Ok(self.on_autocomplete(context, command, focused).await)
            }
        };

        outcome.unwrap_or_else(|failure| render_failure(kind, workspace_id.as_deref(), failure))
    }
}

fn render_failure(kind: &'static str, workspace_id: Option<&str>, failure: FolioError) -> Response {
    match &failure {
        FolioError::Internal(cause) => {
            error!(kind, workspace_id, error = ?cause, "event handling failed");
        }
        FolioError::Timeout(operation) => {
            warn!(kind, workspace_id, operation, "event abandoned after storage timeout");
        }
        other => {
            debug!(kind, workspace_id, code = other.code().as_str(), "event rejected");
        }
    }
    Response::ephemeral(failure.user_message())
}
