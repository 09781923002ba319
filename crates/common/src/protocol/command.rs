// Slash-command surface: registration manifest and typed parsing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single option value as delivered by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    String(String),
}

/// Raw command invocation: name plus named options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandInvocation {
    pub name: String,
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    String,
    Integer,
    Boolean,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct OptionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: OptionKind,
    pub required: bool,
    pub autocomplete: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub options: &'static [OptionSpec],
}

impl CommandSpec {
    /// True when some option of this command is page-autocompleted.
    pub fn has_autocomplete(&self) -> bool {
        self.options.iter().any(|option| option.autocomplete)
    }

    /// One-line usage, e.g. `/page-rename query title [keep_slug]`.
    pub fn usage(&self) -> String {
        let mut usage = format!("/{}", self.name);
        for option in self.options {
            if option.required {
                usage.push_str(&format!(" {}", option.name));
            } else {
                usage.push_str(&format!(" [{}]", option.name));
            }
        }
        usage
    }
}

const fn string(name: &'static str, description: &'static str, required: bool) -> OptionSpec {
    OptionSpec { name, description, kind: OptionKind::String, required, autocomplete: false }
}

const fn page_query(required: bool) -> OptionSpec {
    OptionSpec {
        name: "query",
        description: "Slug or title",
        kind: OptionKind::String,
        required,
        autocomplete: true,
    }
}

const fn integer(name: &'static str, description: &'static str) -> OptionSpec {
    OptionSpec { name, description, kind: OptionKind::Integer, required: false, autocomplete: false }
}

const fn boolean(name: &'static str, description: &'static str, required: bool) -> OptionSpec {
    OptionSpec { name, description, kind: OptionKind::Boolean, required, autocomplete: false }
}

/// Every command the gateway must register for a workspace.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "help", description: "Shows help for the bot", options: &[] },
    CommandSpec {
        name: "page-create",
        description: "Create a page",
        options: &[string("title", "Title", true), string("content", "Content (markdown)", false)],
    },
    CommandSpec {
        name: "page-open",
        description: "Open a page (by slug or title)",
        options: &[page_query(true)],
    },
    CommandSpec {
        name: "page-list",
        description: "List pages",
        options: &[string("search", "Filter by title/slug/content", false)],
    },
    CommandSpec {
        name: "page-rename",
        description: "Rename a page",
        options: &[
            page_query(true),
            string("title", "New title", true),
            boolean("keep_slug", "Keep current slug", false),
        ],
    },
    CommandSpec {
        name: "page-move",
        description: "Move page into a folder (prefix in title)",
        options: &[page_query(true), string("folder", "Example: build/guides", true)],
    },
    CommandSpec {
        name: "tag-add",
        description: "Add tags to a page",
        options: &[page_query(true), string("tags", "Example: build,todo,guide", true)],
    },
    CommandSpec {
        name: "tag-remove",
        description: "Remove tags from a page",
        options: &[page_query(true), string("tags", "Example: build,todo", true)],
    },
    CommandSpec {
        name: "tag-list",
        description: "List tags",
        options: &[string("search", "Filter by tag", false)],
    },
    CommandSpec {
        name: "search",
        description: "Full-text search",
        options: &[string("q", "Query", true)],
    },
    CommandSpec {
        name: "daily",
        description: "Create/open daily note",
        options: &[string("date", "YYYY-MM-DD (optional)", false)],
    },
    CommandSpec {
        name: "template-create",
        description: "Create/update a template",
        options: &[
            string("name", "Template name", true),
            string("content", "Template content (markdown)", true),
        ],
    },
    CommandSpec {
        name: "template-use",
        description: "Create a page from a template",
        options: &[string("name", "Template name", true), string("title", "New page title", true)],
    },
    CommandSpec {
        name: "backlinks",
        description: "Find pages that link to this page using [[...]]",
        options: &[page_query(true)],
    },
    CommandSpec {
        name: "export",
        description: "Export a page as markdown",
        options: &[page_query(true)],
    },
    CommandSpec {
        name: "import",
        description: "Import markdown content into a page (overwrite)",
        options: &[page_query(true), string("content", "Markdown content", true)],
    },
    CommandSpec {
        name: "page-history",
        description: "Show page version history",
        options: &[page_query(true), integer("limit", "Max results")],
    },
    CommandSpec {
        name: "page-rollback",
        description: "Rollback a page to a previous version",
        options: &[page_query(true), integer("version", "Version number (optional)")],
    },
    CommandSpec {
        name: "perm-set",
        description: "Set permissions for a role (optional channel / optional page scope)",
        options: &[
            string("role_id", "Role id", true),
            boolean("read", "Allow read", true),
            boolean("write", "Allow write", true),
            page_query(false),
            string("channel_id", "Channel id (optional)", false),
        ],
    },
    CommandSpec {
        name: "perm-list",
        description: "List permissions (optional page scope)",
        options: &[page_query(false)],
    },
    CommandSpec {
        name: "perm-clear",
        description: "Clear permissions (optional page scope)",
        options: &[page_query(false)],
    },
];

/// Look up a command's registration entry by name.
pub fn command_spec(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// Multi-line usage listing for the `help` command.
pub fn help_text() -> String {
    let mut lines = vec!["Commands".to_string(), String::new()];
    lines.extend(COMMANDS.iter().filter(|spec| spec.name != "help").map(CommandSpec::usage));
    lines.join("\n")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    Unknown(String),

    #[error("missing required option `{0}`")]
    MissingOption(&'static str),

    #[error("option `{option}` must be a {expected}")]
    WrongType { option: &'static str, expected: &'static str },
}

/// A parsed command with typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    PageCreate { title: String, content: Option<String> },
    PageOpen { query: String },
    PageList { search: Option<String> },
    PageRename { query: String, title: String, keep_slug: bool },
    PageMove { query: String, folder: String },
    TagAdd { query: String, tags: String },
    TagRemove { query: String, tags: String },
    TagList { search: Option<String> },
    Search { q: String },
    Daily { date: Option<String> },
    TemplateCreate { name: String, content: String },
    TemplateUse { name: String, title: String },
    Backlinks { query: String },
    Export { query: String },
    Import { query: String, content: String },
    PageHistory { query: String, limit: Option<i64> },
    PageRollback { query: String, version: Option<i64> },
    PermSet {
        role_id: String,
        read: bool,
        write: bool,
        query: Option<String>,
        channel_id: Option<String>,
    },
    PermList { query: Option<String> },
    PermClear { query: Option<String> },
}

impl Command {
    pub fn parse(invocation: &CommandInvocation) -> Result<Self, CommandError> {
        let o = Options(&invocation.options);
        let command = match invocation.name.as_str() {
            "help" => Self::Help,
            "page-create" => {
                Self::PageCreate { title: o.required_str("title")?, content: o.raw_str("content")? }
            }
            "page-open" => Self::PageOpen { query: o.required_str("query")? },
            "page-list" => Self::PageList { search: o.optional_str("search")? },
            "page-rename" => Self::PageRename {
                query: o.required_str("query")?,
                title: o.required_str("title")?,
                keep_slug: o.optional_bool("keep_slug")?.unwrap_or(false),
            },
            "page-move" => {
                // An empty folder is meaningful: it moves the page to the root.
                let folder = o.raw_str("folder")?.ok_or(CommandError::MissingOption("folder"))?;
                Self::PageMove { query: o.required_str("query")?, folder }
            }
            "tag-add" => {
                Self::TagAdd { query: o.required_str("query")?, tags: o.required_str("tags")? }
            }
            "tag-remove" => {
                Self::TagRemove { query: o.required_str("query")?, tags: o.required_str("tags")? }
            }
            "tag-list" => Self::TagList { search: o.optional_str("search")? },
            "search" => Self::Search { q: o.required_str("q")? },
            "daily" => Self::Daily { date: o.optional_str("date")? },
            "template-create" => Self::TemplateCreate {
                name: o.required_str("name")?,
                content: o.required_str("content")?,
            },
            "template-use" => {
                Self::TemplateUse { name: o.required_str("name")?, title: o.required_str("title")? }
            }
            "backlinks" => Self::Backlinks { query: o.required_str("query")? },
            "export" => Self::Export { query: o.required_str("query")? },
            "import" => {
                Self::Import { query: o.required_str("query")?, content: o.required_str("content")? }
            }
            "page-history" => Self::PageHistory {
                query: o.required_str("query")?,
                limit: o.optional_int("limit")?,
            },
            "page-rollback" => Self::PageRollback {
                query: o.required_str("query")?,
                version: o.optional_int("version")?,
            },
            "perm-set" => Self::PermSet {
                role_id: o.required_str("role_id")?,
                read: o.optional_bool("read")?.ok_or(CommandError::MissingOption("read"))?,
                write: o.optional_bool("write")?.ok_or(CommandError::MissingOption("write"))?,
                query: o.optional_str("query")?,
                channel_id: o.optional_str("channel_id")?,
            },
            "perm-list" => Self::PermList { query: o.optional_str("query")? },
            "perm-clear" => Self::PermClear { query: o.optional_str("query")? },
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::PageCreate { .. } => "page-create",
            Self::PageOpen { .. } => "page-open",
            Self::PageList { .. } => "page-list",
            Self::PageRename { .. } => "page-rename",
            Self::PageMove { .. } => "page-move",
            Self::TagAdd { .. } => "tag-add",
            Self::TagRemove { .. } => "tag-remove",
            Self::TagList { .. } => "tag-list",
            Self::Search { .. } => "search",
            Self::Daily { .. } => "daily",
            Self::TemplateCreate { .. } => "template-create",
            Self::TemplateUse { .. } => "template-use",
            Self::Backlinks { .. } => "backlinks",
            Self::Export { .. } => "export",
            Self::Import { .. } => "import",
            Self::PageHistory { .. } => "page-history",
            Self::PageRollback { .. } => "page-rollback",
            Self::PermSet { .. } => "perm-set",
            Self::PermList { .. } => "perm-list",
            Self::PermClear { .. } => "perm-clear",
        }
    }
}

struct Options<'a>(&'a BTreeMap<String, OptionValue>);

impl Options<'_> {
    fn raw_str(&self, name: &'static str) -> Result<Option<String>, CommandError> {
        match self.0.get(name) {
            None => Ok(None),
            Some(OptionValue::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(CommandError::WrongType { option: name, expected: "string" }),
        }
    }

    /// Trimmed string; blank counts as absent.
    fn optional_str(&self, name: &'static str) -> Result<Option<String>, CommandError> {
        Ok(self
            .raw_str(name)?
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()))
    }

    fn required_str(&self, name: &'static str) -> Result<String, CommandError> {
        self.optional_str(name)?.ok_or(CommandError::MissingOption(name))
    }

    fn optional_bool(&self, name: &'static str) -> Result<Option<bool>, CommandError> {
        match self.0.get(name) {
            None => Ok(None),
            Some(OptionValue::Bool(value)) => Ok(Some(*value)),
            Some(_) => Err(CommandError::WrongType { option: name, expected: "boolean" }),
        }
    }

    fn optional_int(&self, name: &'static str) -> Result<Option<i64>, CommandError> {
        match self.0.get(name) {
            None => Ok(None),
            Some(OptionValue::Integer(value)) => Ok(Some(*value)),
            Some(_) => Err(CommandError::WrongType { option: name, expected: "integer" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(name: &str, options: &[(&str, OptionValue)]) -> CommandInvocation {
        CommandInvocation {
            name: name.to_string(),
            options: options.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }

    fn s(value: &str) -> OptionValue {
        OptionValue::String(value.to_string())
    }

    #[test]
    fn parses_page_rename_with_defaults() {
        let command =
            Command::parse(&invocation("page-rename", &[("query", s("notes")), ("title", s("New"))]))
                .expect("command should parse");
        assert_eq!(
            command,
            Command::PageRename {
                query: "notes".to_string(),
                title: "New".to_string(),
                keep_slug: false
            }
        );
    }

    #[test]
    fn blank_required_option_is_missing() {
        let err = Command::parse(&invocation("page-open", &[("query", s("   "))]))
            .expect_err("blank query should be rejected");
        assert_eq!(err, CommandError::MissingOption("query"));
    }

    #[test]
    fn wrong_option_type_is_rejected() {
        let err = Command::parse(&invocation(
            "page-history",
            &[("query", s("x")), ("limit", s("ten"))],
        ))
        .expect_err("string limit should be rejected");
        assert_eq!(err, CommandError::WrongType { option: "limit", expected: "integer" });
    }

    #[test]
    fn perm_set_requires_flags() {
        let err = Command::parse(&invocation("perm-set", &[("role_id", s("r1"))]))
            .expect_err("missing read flag");
        assert_eq!(err, CommandError::MissingOption("read"));

        let command = Command::parse(&invocation(
            "perm-set",
            &[
                ("role_id", s("r1")),
                ("read", OptionValue::Bool(true)),
                ("write", OptionValue::Bool(false)),
                ("channel_id", s(" ")),
            ],
        ))
        .expect("perm-set should parse");
        assert_eq!(
            command,
            Command::PermSet {
                role_id: "r1".to_string(),
                read: true,
                write: false,
                query: None,
                channel_id: None
            }
        );
    }

    #[test]
    fn page_move_accepts_empty_folder() {
        let command =
            Command::parse(&invocation("page-move", &[("query", s("x")), ("folder", s(""))]))
                .expect("empty folder is allowed");
        assert_eq!(command, Command::PageMove { query: "x".to_string(), folder: String::new() });
    }

    #[test]
    fn unknown_command_is_reported() {
        assert_eq!(
            Command::parse(&invocation("nope", &[])),
            Err(CommandError::Unknown("nope".to_string()))
        );
    }

    #[test]
    fn manifest_names_are_unique_and_parseable() {
        let mut names: Vec<&str> = COMMANDS.iter().map(|spec| spec.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), COMMANDS.len());

        for spec in COMMANDS {
            let options: Vec<(&str, OptionValue)> = spec
                .options
                .iter()
                .filter(|option| option.required)
                .map(|option| {
                    let value = match option.kind {
                        OptionKind::String => s("value"),
                        OptionKind::Integer => OptionValue::Integer(1),
                        OptionKind::Boolean => OptionValue::Bool(true),
                    };
                    (option.name, value)
                })
                .collect();
            let command = Command::parse(&invocation(spec.name, &options))
                .unwrap_or_else(|err| panic!("{} should parse: {err}", spec.name));
            assert_eq!(command.name(), spec.name);
        }
    }

    #[test]
    fn help_lists_usage_lines() {
        let help = help_text();
        assert!(help.starts_with("Commands\n\n"));
        assert!(help.contains("/page-rename query title [keep_slug]"));
        assert!(help.contains("/perm-set role_id read write [query] [channel_id]"));
        assert!(!help.contains("/help"));
    }

    #[test]
    fn autocomplete_flags_follow_query_options() {
        assert!(command_spec("page-open").expect("spec").has_autocomplete());
        assert!(command_spec("perm-list").expect("spec").has_autocomplete());
        assert!(!command_spec("page-list").expect("spec").has_autocomplete());
    }
}
