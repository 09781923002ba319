// Text and control rendering for replies.

use chrono::{DateTime, Utc};
use folio_common::{
    protocol::{
        reply::{truncate_chars, DISPLAY_BUDGET},
        ActionRow, Button, ButtonStyle, InteractionToken, Modal, Reply, TextInput,
    },
    types::{Page, PageSummary, PageVersion, PermissionRule},
};
use tracing::warn;

use crate::store::PageSlice;

/// Longest body pre-filled into the edit modal.
pub const MODAL_BODY_LIMIT: usize = 4000;

const MODAL_TITLE_LIMIT: usize = 45;

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Encode `token` into a button; a token that cannot be encoded drops the
/// button rather than failing the reply.
fn button(token: InteractionToken, label: &str, style: ButtonStyle) -> Option<Button> {
    match token.encode() {
        Ok(custom_id) => Some(Button::new(custom_id, label, style)),
        Err(error) => {
            warn!(error = %error, label, "interaction token could not be encoded");
            None
        }
    }
}

fn row(buttons: impl IntoIterator<Item = Option<Button>>) -> ActionRow {
    ActionRow::new(buttons.into_iter().flatten().collect())
}

/// Page view with Edit / Delete / Refresh controls.
pub fn page_view(workspace_id: &str, page: &Page) -> Reply {
    let body = page.body.trim();
    let body = if body.is_empty() { "(empty)" } else { body };
    let text = format!(
        "{} (slug: {})\n\nversion: {}\nupdated: {}\n\n{}",
        page.title,
        page.slug,
        page.version,
        timestamp(page.updated_at),
        body
    );

    Reply::new(text).ephemeral().with_row(row([
        button(InteractionToken::edit(workspace_id, &page.slug), "Edit", ButtonStyle::Primary),
        button(InteractionToken::delete(workspace_id, &page.slug), "Delete", ButtonStyle::Danger),
        button(InteractionToken::open(workspace_id, &page.slug), "Refresh", ButtonStyle::Secondary),
    ]))
}

/// One window of the page list with Previous / Next controls.
pub fn page_list(
    workspace_id: &str,
    search: &str,
    current: u32,
    total_pages: u32,
    offset: usize,
    slice: &PageSlice,
) -> Reply {
    if slice.items.is_empty() {
        let message = if search.is_empty() { "No pages yet." } else { "No pages found for that search." };
        return Reply::new(message).ephemeral();
    }

    let mut header = format!(
        "Pages {}-{} of {} (page {current}/{total_pages})",
        offset + 1,
        (offset + slice.items.len()).min(slice.total),
        slice.total
    );
    if !search.is_empty() {
        header.push_str(&format!(" | search: {search}"));
    }

    let lines: Vec<String> = slice
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| format!("{}. {}  |  {}", offset + index + 1, item.title, item.slug))
        .collect();

    let reply = Reply::new(format!("{header}\n\n{}", lines.join("\n"))).ephemeral();
    if total_pages <= 1 {
        return reply;
    }

    let previous = current.saturating_sub(1).max(1);
    let next = (current + 1).min(total_pages);
    reply.with_row(row([
        button(InteractionToken::page_list(workspace_id, search, previous), "Previous", ButtonStyle::Secondary)
            .map(|b| b.disabled(current <= 1)),
        button(InteractionToken::page_list(workspace_id, search, next), "Next", ButtonStyle::Secondary)
            .map(|b| b.disabled(current >= total_pages)),
    ]))
}

/// Numbered `title  |  slug` lines under `header`, or `empty` when none.
pub fn summary_list(header: &str, items: &[PageSummary], empty: &str) -> Reply {
    if items.is_empty() {
        return Reply::new(empty).ephemeral();
    }
    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(index, item)| format!("{}. {}  |  {}", index + 1, item.title, item.slug))
        .collect();
    Reply::new(format!("{header}\n\n{}", lines.join("\n"))).ephemeral()
}

pub fn history(page: &Page, versions: &[PageVersion]) -> Reply {
    if versions.is_empty() {
        return Reply::new(format!("No history yet for {} (version {}).", page.slug, page.version))
            .ephemeral();
    }
    let lines: Vec<String> = versions
        .iter()
        .map(|version| {
            format!(
                "v{}  |  {}  |  {}  |  {}  |  by {}",
                version.version,
                version.title,
                version.slug,
                timestamp(version.created_at),
                version.author_id.as_deref().unwrap_or("unknown")
            )
        })
        .collect();
    Reply::new(format!(
        "History for {} (current version: {})\n\n{}",
        page.slug,
        page.version,
        lines.join("\n")
    ))
    .ephemeral()
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub fn rule_line(rule: &PermissionRule) -> String {
    format!(
        "- role {}  |  read: {}  |  write: {}  |  channel: {}",
        rule.role_id,
        yes_no(rule.can_read),
        yes_no(rule.can_write),
        rule.channel_id.as_deref().unwrap_or("any")
    )
}

pub fn rules(scope: &str, rules: &[PermissionRule]) -> Reply {
    if rules.is_empty() {
        return Reply::new(format!("No permission rules for {scope}.")).ephemeral();
    }
    let lines: Vec<String> = rules.iter().map(rule_line).collect();
    Reply::new(format!("Permissions for {scope}\n\n{}", lines.join("\n"))).ephemeral()
}

/// `# Title` plus body in a fenced block that stays closed when clipped.
pub fn export(page: &Page) -> Reply {
    const OPEN: &str = "```markdown\n";
    const CLOSE: &str = "\n```";
    let markdown = format!("# {}\n\n{}", page.title, page.body.trim_end());
    let budget = DISPLAY_BUDGET - OPEN.len() - CLOSE.len();
    Reply::new(format!("{OPEN}{}{CLOSE}", truncate_chars(&markdown, budget))).ephemeral()
}

pub fn delete_prompt(workspace_id: &str, page: &Page) -> Reply {
    Reply::new(format!("Delete {} (slug: {})? This cannot be undone.", page.title, page.slug))
        .ephemeral()
        .with_row(row([button(
            InteractionToken::delete_confirm(workspace_id, &page.slug),
            "Confirm delete",
            ButtonStyle::Danger,
        )]))
}

/// `None` when the body does not fit the text input; submitting a clipped
/// body would drop the rest of the page.
pub fn edit_modal(workspace_id: &str, page: &Page) -> Option<Modal> {
    if page.body.chars().count() > MODAL_BODY_LIMIT {
        return None;
    }

    let custom_id = match InteractionToken::edit_modal(workspace_id, &page.slug).encode() {
        Ok(custom_id) => custom_id,
        Err(error) => {
            warn!(error = %error, slug = %page.slug, "edit modal token could not be encoded");
            return None;
        }
    };

    Some(Modal {
        custom_id,
        title: truncate_chars(&format!("Edit: {}", page.title), MODAL_TITLE_LIMIT),
        inputs: vec![TextInput {
            id: "body".to_string(),
            label: "Content (markdown)".to_string(),
            multiline: true,
            required: false,
            value: page.body.clone(),
            max_length: MODAL_BODY_LIMIT,
        }],
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn page(body: &str) -> Page {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).single().expect("valid timestamp");
        Page {
            id: Uuid::new_v4(),
            workspace_id: "w1".to_string(),
            slug: "my-notes".to_string(),
            title: "My Notes".to_string(),
            body: body.to_string(),
            version: 3,
            created_at: at,
            updated_at: at,
        }
    }

    fn summaries(count: usize) -> Vec<PageSummary> {
        (0..count)
            .map(|index| PageSummary {
                id: Uuid::new_v4(),
                slug: format!("p-{index}"),
                title: format!("Page {index}"),
                updated_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn page_view_layout_and_buttons() {
        let reply = page_view("w1", &page("  hello  "));
        assert_eq!(
            reply.content,
            "My Notes (slug: my-notes)\n\nversion: 3\nupdated: 2024-05-06 07:08:09\n\nhello"
        );
        let ids: Vec<&str> =
            reply.components[0].buttons.iter().map(|b| b.custom_id.as_str()).collect();
        assert_eq!(ids, vec!["pe|w1|my-notes", "pd|w1|my-notes", "po|w1|my-notes"]);
        assert!(reply.ephemeral);
    }

    #[test]
    fn empty_body_renders_placeholder() {
        assert!(page_view("w1", &page("   ")).content.ends_with("(empty)"));
    }

    #[test]
    fn single_page_list_has_no_controls() {
        let slice = PageSlice { items: summaries(2), total: 2 };
        let reply = page_list("w1", "", 1, 1, 0, &slice);
        assert!(reply.content.starts_with("Pages 1-2 of 2 (page 1/1)\n\n1. Page 0  |  p-0"));
        assert!(reply.components.is_empty());
    }

    #[test]
    fn middle_page_has_both_controls_enabled() {
        let slice = PageSlice { items: summaries(10), total: 35 };
        let reply = page_list("w1", "foo bar", 2, 4, 10, &slice);
        assert!(reply.content.starts_with("Pages 11-20 of 35 (page 2/4) | search: foo bar"));
        let buttons = &reply.components[0].buttons;
        assert_eq!(buttons[0].custom_id, "pl|w1|foo%20bar|1");
        assert_eq!(buttons[1].custom_id, "pl|w1|foo%20bar|3");
        assert!(!buttons[0].disabled && !buttons[1].disabled);
    }

    #[test]
    fn last_page_disables_next() {
        let slice = PageSlice { items: summaries(5), total: 15 };
        let reply = page_list("w1", "", 2, 2, 10, &slice);
        let buttons = &reply.components[0].buttons;
        assert!(!buttons[0].disabled);
        assert!(buttons[1].disabled);
    }

    #[test]
    fn empty_list_messages() {
        let empty = PageSlice::default();
        assert_eq!(page_list("w1", "", 1, 1, 0, &empty).content, "No pages yet.");
        assert_eq!(page_list("w1", "x", 1, 1, 0, &empty).content, "No pages found for that search.");
    }

    #[test]
    fn export_keeps_fence_closed_when_clipped() {
        let reply = export(&page(&"x".repeat(5000)));
        assert!(reply.content.starts_with("```markdown\n# My Notes\n\n"));
        assert!(reply.content.ends_with("...\n```"));
        assert!(reply.content.chars().count() <= DISPLAY_BUDGET);
    }

    #[test]
    fn edit_modal_carries_whole_body() {
        let modal = edit_modal("w1", &page(&"b".repeat(MODAL_BODY_LIMIT))).expect("modal");
        assert_eq!(modal.custom_id, "pm|w1|my-notes");
        assert_eq!(modal.inputs[0].value.chars().count(), MODAL_BODY_LIMIT);
    }

    #[test]
    fn oversized_body_has_no_edit_modal() {
        assert!(edit_modal("w1", &page(&"b".repeat(MODAL_BODY_LIMIT + 1))).is_none());
    }

    #[test]
    fn history_lines_name_author() {
        let current = page("");
        let versions = vec![PageVersion {
            page_id: current.id,
            version: 2,
            title: "Old".to_string(),
            slug: "old".to_string(),
            body: String::new(),
            author_id: None,
            created_at: current.updated_at,
        }];
        let reply = history(&current, &versions);
        assert!(reply.content.contains("v2  |  Old  |  old  |  2024-05-06 07:08:09  |  by unknown"));
    }
}
