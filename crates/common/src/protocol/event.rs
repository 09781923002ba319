// Inbound events delivered by the chat gateway.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::command::{CommandInvocation, OptionValue};
use crate::types::Actor;

/// Who sent the event and where from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventContext {
    /// Tenant id; absent for direct messages outside any workspace.
    #[serde(default)]
    pub workspace_id: Option<String>,
    pub actor: Actor,
}

/// The option the user is currently typing in an autocomplete request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FocusedOption {
    pub name: String,
    #[serde(default)]
    pub value: Option<OptionValue>,
}

impl FocusedOption {
    pub fn text(&self) -> String {
        match &self.value {
            Some(OptionValue::String(value)) => value.trim().to_string(),
            Some(OptionValue::Integer(value)) => value.to_string(),
            Some(OptionValue::Bool(value)) => value.to_string(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Slash-command invocation.
    Command { context: EventContext, invocation: CommandInvocation },

    /// Button press; `custom_id` is an interaction token.
    ButtonPress { context: EventContext, custom_id: String },

    /// Modal form submission; `custom_id` is an interaction token.
    ModalSubmit {
        context: EventContext,
        custom_id: String,
        #[serde(default)]
        fields: BTreeMap<String, String>,
    },

    /// Autocomplete request for a command option.
    Autocomplete { context: EventContext, command: String, focused: FocusedOption },
}

impl Event {
    pub fn context(&self) -> &EventContext {
        match self {
            Self::Command { context, .. }
            | Self::ButtonPress { context, .. }
            | Self::ModalSubmit { context, .. }
            | Self::Autocomplete { context, .. } => context,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::ButtonPress { .. } => "button_press",
            Self::ModalSubmit { .. } => "modal_submit",
            Self::Autocomplete { .. } => "autocomplete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_event_deserializes_from_gateway_json() {
        let event: Event = serde_json::from_value(json!({
            "type": "command",
            "context": {
                "workspace_id": "guild-1",
                "actor": { "user_id": "u1", "roles": ["r1"], "channel_id": "c1" }
            },
            "invocation": {
                "name": "page-rename",
                "options": { "query": "my-notes", "title": "New", "keep_slug": true }
            }
        }))
        .expect("command event should deserialize");

        let Event::Command { context, invocation } = &event else {
            panic!("expected command event");
        };
        assert_eq!(context.workspace_id.as_deref(), Some("guild-1"));
        assert_eq!(context.actor.roles, vec!["r1"]);
        assert_eq!(invocation.options.get("keep_slug"), Some(&OptionValue::Bool(true)));
        assert_eq!(event.kind(), "command");
    }

    #[test]
    fn modal_submit_defaults_missing_fields() {
        let event: Event = serde_json::from_value(json!({
            "type": "modal_submit",
            "context": { "actor": { "user_id": "u1" } },
            "custom_id": "pm|g|slug"
        }))
        .expect("modal event should deserialize");

        assert!(event.context().workspace_id.is_none());
        let Event::ModalSubmit { fields, .. } = event else {
            panic!("expected modal submit");
        };
        assert!(fields.is_empty());
    }

    #[test]
    fn focused_option_text_is_trimmed() {
        let focused = FocusedOption {
            name: "query".to_string(),
            value: Some(OptionValue::String("  road ".to_string())),
        };
        assert_eq!(focused.text(), "road");
        assert_eq!(FocusedOption { name: "query".to_string(), value: None }.text(), "");
    }
}
