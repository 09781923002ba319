// Outbound responses rendered by the gateway.

use serde::{Deserialize, Serialize};

/// Maximum characters of message text the gateway will display.
pub const DISPLAY_BUDGET: usize = 1900;

/// Marker appended when text is cut to fit a budget.
pub const ELLIPSIS: &str = "...";

/// Maximum autocomplete choices per request.
pub const MAX_CHOICES: usize = 25;

/// Maximum characters of an autocomplete choice label.
pub const MAX_CHOICE_NAME: usize = 100;

/// Clip `text` to [`DISPLAY_BUDGET`] characters.
pub fn truncate_for_display(text: &str) -> String {
    truncate_chars(text, DISPLAY_BUDGET)
}

/// Clip `text` to at most `max` characters, ending with [`ELLIPSIS`] when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut clipped: String = text.chars().take(keep).collect();
    clipped.push_str(ELLIPSIS);
    clipped
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Message(Reply),
    Modal(Modal),
    Choices { choices: Vec<Choice> },
}

impl Response {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Message(Reply::new(content))
    }

    /// A message visible only to the invoking actor.
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self::Message(Reply::new(content).ephemeral())
    }
}

impl From<Reply> for Response {
    fn from(reply: Reply) -> Self {
        Self::Message(reply)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
    #[serde(default)]
    pub ephemeral: bool,
}

impl Reply {
    /// Text reply, clipped to the display budget.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: truncate_for_display(&content.into()), components: Vec::new(), ephemeral: false }
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    pub fn with_row(mut self, row: ActionRow) -> Self {
        if !row.buttons.is_empty() {
            self.components.push(row);
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionRow {
    pub buttons: Vec<Button>,
}

impl ActionRow {
    pub fn new(buttons: Vec<Button>) -> Self {
        Self { buttons }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Danger,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Button {
    /// Interaction token round-tripped on press.
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
    #[serde(default)]
    pub disabled: bool,
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self { custom_id: custom_id.into(), label: label.into(), style, disabled: false }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Modal {
    /// Interaction token round-tripped on submit.
    pub custom_id: String,
    pub title: String,
    pub inputs: Vec<TextInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextInput {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub multiline: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub value: String,
    pub max_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Choice {
    pub name: String,
    pub value: String,
}

impl Choice {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self { name: truncate_chars(name, MAX_CHOICE_NAME), value: value.into() }
    }
}
