// `folio token`: inspect and mint interaction tokens for debugging.

use clap::{Args, Subcommand, ValueEnum};
use folio_common::protocol::{InteractionToken, TokenAction};
use serde::Serialize;

use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub action: TokenCommand,

    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Decode a token as the server would for `workspace`.
    Decode {
        token: String,
        #[arg(long)]
        workspace: String,
    },
    /// Encode a token for a button or modal.
    Encode {
        #[arg(value_enum)]
        kind: Kind,
        #[arg(long)]
        workspace: String,
        /// Target page slug (every kind except `list`).
        #[arg(long)]
        slug: Option<String>,
        /// Search text carried by `list` tokens.
        #[arg(long, default_value = "")]
        search: String,
        /// Page number carried by `list` tokens.
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    List,
    Open,
    Edit,
    EditModal,
    Delete,
    DeleteConfirm,
}

/// Flattened view of a token for printing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenView {
    pub token: String,
    pub kind: &'static str,
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl TokenView {
    fn new(token: String, decoded: &InteractionToken) -> Self {
        let (slug, search, page) = match &decoded.action {
            TokenAction::PageList { search, page } => (None, Some(search.clone()), Some(*page)),
            TokenAction::Open { slug }
            | TokenAction::Edit { slug }
            | TokenAction::EditModal { slug }
            | TokenAction::Delete { slug }
            | TokenAction::DeleteConfirm { slug } => (Some(slug.clone()), None, None),
        };
        Self {
            token,
            kind: decoded.action.kind().prefix(),
            workspace_id: decoded.workspace_id.clone(),
            slug,
            search,
            page,
        }
    }
}

pub fn run(args: TokenArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match execute(args.action) {
        Ok(view) => {
            output::print_output(format, &view, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn execute(command: TokenCommand) -> anyhow::Result<TokenView> {
    match command {
        TokenCommand::Decode { token, workspace } => {
            let decoded = InteractionToken::decode(token.trim(), &workspace)?;
            Ok(TokenView::new(token.trim().to_string(), &decoded))
        }
        TokenCommand::Encode { kind, workspace, slug, search, page } => {
            let token = build(kind, workspace, slug, search, page)?;
            let encoded = token.encode()?;
            Ok(TokenView::new(encoded, &token))
        }
    }
}

fn build(
    kind: Kind,
    workspace: String,
    slug: Option<String>,
    search: String,
    page: u32,
) -> anyhow::Result<InteractionToken> {
    if kind == Kind::List {
        return Ok(InteractionToken::page_list(workspace, search, page));
    }
    let Some(slug) = slug else {
        anyhow::bail!("--slug is required for {kind:?} tokens");
    };
    Ok(match kind {
        Kind::Open => InteractionToken::open(workspace, slug),
        Kind::Edit => InteractionToken::edit(workspace, slug),
        Kind::EditModal => InteractionToken::edit_modal(workspace, slug),
        Kind::Delete => InteractionToken::delete(workspace, slug),
        Kind::DeleteConfirm | Kind::List => InteractionToken::delete_confirm(workspace, slug),
    })
}

fn format_human(view: &TokenView) -> String {
    let mut lines = vec![view.token.clone(), format!("  kind:      {}", view.kind)];
    lines.push(format!("  workspace: {}", view.workspace_id));
    if let Some(slug) = &view.slug {
        lines.push(format!("  slug:      {slug}"));
    }
    if let Some(search) = &view.search {
        lines.push(format!("  search:    {search:?}"));
    }
    if let Some(page) = view.page {
        lines.push(format!("  page:      {page}"));
    }
    lines.join("\n")
}
