// Interaction tokens: routing state carried in UI control ids.
//
// Wire form: `<kind>|<workspace>|<field>...` with a fixed arity per kind.
// Free text is percent-encoded so the `|` delimiter never appears inside a
// field. The gateway caps control ids at 100 characters.
//
//   pl|<ws>|<search>|<page>   paginated page list
//   po|<ws>|<slug>            open / refresh a page
//   pe|<ws>|<slug>            edit button (opens the modal)
//   pm|<ws>|<slug>            edit modal submission
//   pd|<ws>|<slug>            delete button (asks for confirmation)
//   pdc|<ws>|<slug>           delete confirmation

use thiserror::Error;
use url::form_urlencoded;

/// Maximum encoded token length accepted by the gateway.
pub const MAX_TOKEN_LEN: usize = 100;

/// Highest page number a list token may carry.
pub const MAX_LIST_PAGE: u32 = 1_000;

const DELIMITER: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    PageList,
    Open,
    Edit,
    EditModal,
    Delete,
    DeleteConfirm,
}

impl TokenKind {
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::PageList => "pl",
            Self::Open => "po",
            Self::Edit => "pe",
            Self::EditModal => "pm",
            Self::Delete => "pd",
            Self::DeleteConfirm => "pdc",
        }
    }

    /// Number of `|`-separated fields, including the kind itself.
    pub const fn arity(self) -> usize {
        match self {
            Self::PageList => 4,
            _ => 3,
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "pl" => Some(Self::PageList),
            "po" => Some(Self::Open),
            "pe" => Some(Self::Edit),
            "pm" => Some(Self::EditModal),
            "pd" => Some(Self::Delete),
            "pdc" => Some(Self::DeleteConfirm),
            _ => None,
        }
    }
}

/// What the token asks the dispatcher to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenAction {
    PageList { search: String, page: u32 },
    Open { slug: String },
    Edit { slug: String },
    EditModal { slug: String },
    Delete { slug: String },
    DeleteConfirm { slug: String },
}

impl TokenAction {
    pub const fn kind(&self) -> TokenKind {
        match self {
            Self::PageList { .. } => TokenKind::PageList,
            Self::Open { .. } => TokenKind::Open,
            Self::Edit { .. } => TokenKind::Edit,
            Self::EditModal { .. } => TokenKind::EditModal,
            Self::Delete { .. } => TokenKind::Delete,
            Self::DeleteConfirm { .. } => TokenKind::DeleteConfirm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionToken {
    pub workspace_id: String,
    pub action: TokenAction,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("unknown token kind `{0}`")]
    UnknownKind(String),

    #[error("token kind `{kind}` expects {expected} fields, found {found}")]
    Arity { kind: &'static str, expected: usize, found: usize },

    #[error("token field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("token field `{0}` contains the reserved delimiter")]
    ReservedDelimiter(&'static str),

    #[error("token minted for another workspace")]
    WorkspaceMismatch,

    #[error("encoded token exceeds {MAX_TOKEN_LEN} characters")]
    TooLong,
}

impl InteractionToken {
    pub fn page_list(workspace_id: impl Into<String>, search: impl Into<String>, page: u32) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            action: TokenAction::PageList { search: search.into(), page: clamp_page(page) },
        }
    }

    pub fn open(workspace_id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self { workspace_id: workspace_id.into(), action: TokenAction::Open { slug: slug.into() } }
    }

    pub fn edit(workspace_id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self { workspace_id: workspace_id.into(), action: TokenAction::Edit { slug: slug.into() } }
    }

    pub fn edit_modal(workspace_id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            action: TokenAction::EditModal { slug: slug.into() },
        }
    }

    pub fn delete(workspace_id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self { workspace_id: workspace_id.into(), action: TokenAction::Delete { slug: slug.into() } }
    }

    pub fn delete_confirm(workspace_id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            action: TokenAction::DeleteConfirm { slug: slug.into() },
        }
    }

    /// Serialize into the delimited wire form.
    ///
    /// List tokens shorten their search text until the token fits in
    /// [`MAX_TOKEN_LEN`]; every other kind fails with [`TokenError::TooLong`].
    pub fn encode(&self) -> Result<String, TokenError> {
        check_field("workspace", &self.workspace_id)?;
        let kind = self.action.kind().prefix();
        let ws = &self.workspace_id;

        let encoded = match &self.action {
            TokenAction::PageList { search, page } => {
                let page = clamp_page(*page);
                let fixed = kind.len() + ws.len() + page.to_string().len() + 3;
                let budget = MAX_TOKEN_LEN.checked_sub(fixed).ok_or(TokenError::TooLong)?;
                let search = encode_component_within(search.trim(), budget);
                format!("{kind}|{ws}|{search}|{page}")
            }
            TokenAction::Open { slug }
            | TokenAction::Edit { slug }
            | TokenAction::EditModal { slug }
            | TokenAction::Delete { slug }
            | TokenAction::DeleteConfirm { slug } => {
                check_field("slug", slug)?;
                format!("{kind}|{ws}|{slug}")
            }
        };

        if encoded.len() > MAX_TOKEN_LEN {
            return Err(TokenError::TooLong);
        }
        Ok(encoded)
    }

    /// Parse `token` and require that it was minted for `expected_workspace`.
    ///
    /// A token replayed from another workspace is rejected, never re-scoped.
    pub fn decode(token: &str, expected_workspace: &str) -> Result<Self, TokenError> {
        let parts: Vec<&str> = token.split(DELIMITER).collect();
        let kind = TokenKind::from_prefix(parts[0])
            .ok_or_else(|| TokenError::UnknownKind(parts[0].to_string()))?;

        if parts.len() != kind.arity() {
            return Err(TokenError::Arity {
                kind: kind.prefix(),
                expected: kind.arity(),
                found: parts.len(),
            });
        }

        let workspace_id = parts[1];
        if workspace_id.is_empty() {
            return Err(TokenError::EmptyField("workspace"));
        }
        if workspace_id != expected_workspace {
            return Err(TokenError::WorkspaceMismatch);
        }

        let action = match kind {
            TokenKind::PageList => TokenAction::PageList {
                search: decode_component(parts[2]),
                page: parts[3].parse::<u32>().map(clamp_page).unwrap_or(1),
            },
            _ => {
                let slug = parts[2];
                if slug.is_empty() {
                    return Err(TokenError::EmptyField("slug"));
                }
                let slug = slug.to_string();
                match kind {
                    TokenKind::Open => TokenAction::Open { slug },
                    TokenKind::Edit => TokenAction::Edit { slug },
                    TokenKind::EditModal => TokenAction::EditModal { slug },
                    TokenKind::Delete => TokenAction::Delete { slug },
                    _ => TokenAction::DeleteConfirm { slug },
                }
            }
        };

        Ok(Self { workspace_id: workspace_id.to_string(), action })
    }
}

fn check_field(name: &'static str, value: &str) -> Result<(), TokenError> {
    if value.is_empty() {
        return Err(TokenError::EmptyField(name));
    }
    if value.contains(DELIMITER) {
        return Err(TokenError::ReservedDelimiter(name));
    }
    Ok(())
}

fn clamp_page(page: u32) -> u32 {
    page.clamp(1, MAX_LIST_PAGE)
}

/// Percent-encode free text; spaces become `%20`.
fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>().replace('+', "%20")
}

fn encode_component_within(value: &str, budget: usize) -> String {
    let mut chars: Vec<char> = value.chars().collect();
    loop {
        let encoded = encode_component(&chars.iter().collect::<String>());
        if encoded.len() <= budget {
            return encoded;
        }
        chars.pop();
    }
}

fn decode_component(value: &str) -> String {
    form_urlencoded::parse(value.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_token_round_trips_search_with_spaces() {
        let token = InteractionToken::page_list("T1", "foo bar", 2);
        let encoded = token.encode().expect("token should encode");
        assert_eq!(encoded, "pl|T1|foo%20bar|2");

        let decoded = InteractionToken::decode(&encoded, "T1").expect("token should decode");
        assert_eq!(decoded, token);
    }

    #[test]
    fn delimiter_inside_search_is_escaped() {
        let token = InteractionToken::page_list("T1", "a|b & c+d", 1);
        let encoded = token.encode().expect("token should encode");
        assert_eq!(encoded.matches('|').count(), 3);

        let decoded = InteractionToken::decode(&encoded, "T1").expect("token should decode");
        assert_eq!(decoded.action, TokenAction::PageList { search: "a|b & c+d".to_string(), page: 1 });
    }

    #[test]
    fn empty_search_round_trips() {
        let encoded = InteractionToken::page_list("T1", "", 1).encode().expect("encode");
        assert_eq!(encoded, "pl|T1||1");
        let decoded = InteractionToken::decode(&encoded, "T1").expect("decode");
        assert_eq!(decoded.action, TokenAction::PageList { search: String::new(), page: 1 });
    }

    #[test]
    fn token_from_another_workspace_is_rejected() {
        let encoded = InteractionToken::page_list("T1", "foo", 1).encode().expect("encode");
        assert_eq!(InteractionToken::decode(&encoded, "T2"), Err(TokenError::WorkspaceMismatch));

        let open = InteractionToken::open("T1", "my-notes").encode().expect("encode");
        assert_eq!(InteractionToken::decode(&open, "T2"), Err(TokenError::WorkspaceMismatch));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        assert_eq!(
            InteractionToken::decode("pl|T1|foo", "T1"),
            Err(TokenError::Arity { kind: "pl", expected: 4, found: 3 })
        );
        assert_eq!(
            InteractionToken::decode("po|T1|a|b", "T1"),
            Err(TokenError::Arity { kind: "po", expected: 3, found: 4 })
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert_eq!(
            InteractionToken::decode("zz|T1|x", "T1"),
            Err(TokenError::UnknownKind("zz".to_string()))
        );
        assert_eq!(InteractionToken::decode("", "T1"), Err(TokenError::UnknownKind(String::new())));
    }

    #[test]
    fn non_numeric_page_falls_back_to_first_page() {
        let decoded = InteractionToken::decode("pl|T1|x|abc", "T1").expect("decode");
        assert_eq!(decoded.action, TokenAction::PageList { search: "x".to_string(), page: 1 });

        let zero = InteractionToken::decode("pl|T1|x|0", "T1").expect("decode");
        assert_eq!(zero.action, TokenAction::PageList { search: "x".to_string(), page: 1 });
    }

    #[test]
    fn slug_kinds_round_trip() {
        let workspace = "123456789012345678";
        for token in [
            InteractionToken::open(workspace, "my-notes"),
            InteractionToken::edit(workspace, "my-notes"),
            InteractionToken::edit_modal(workspace, "my-notes"),
            InteractionToken::delete(workspace, "my-notes"),
            InteractionToken::delete_confirm(workspace, "my-notes"),
        ] {
            let encoded = token.encode().expect("encode");
            assert!(encoded.starts_with(token.action.kind().prefix()));
            assert_eq!(InteractionToken::decode(&encoded, workspace).expect("decode"), token);
        }
    }

    #[test]
    fn edit_modal_token_has_three_fields() {
        let encoded = InteractionToken::edit_modal("T1", "notes").encode().expect("encode");
        assert_eq!(encoded, "pm|T1|notes");
    }

    #[test]
    fn long_search_is_shortened_to_fit() {
        let token = InteractionToken::page_list("123456789012345678", "ü ".repeat(80), 999);
        let encoded = token.encode().expect("encode");
        assert!(encoded.len() <= MAX_TOKEN_LEN);

        let decoded = InteractionToken::decode(&encoded, "123456789012345678").expect("decode");
        let TokenAction::PageList { search, page } = decoded.action else {
            panic!("expected list token");
        };
        assert_eq!(page, 999);
        assert!("ü ".repeat(80).starts_with(&search));
    }

    #[test]
    fn delimiter_in_workspace_is_rejected() {
        assert_eq!(
            InteractionToken::open("a|b", "slug").encode(),
            Err(TokenError::ReservedDelimiter("workspace"))
        );
    }

    #[test]
    fn overlong_slug_token_is_rejected() {
        let slug = "s".repeat(MAX_TOKEN_LEN);
        assert_eq!(InteractionToken::open("T1", slug).encode(), Err(TokenError::TooLong));
    }
}
