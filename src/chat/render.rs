use serde_json::Value;

use crate::truncate;

use super::segment::{scan_links, segment_line, Span};
use super::types::{Fragment, Message, Role};

pub(crate) const ARGS_PREVIEW_MAX_CHARS: usize = 80;
const DIVIDER_TOKEN: &str = "---";

/// One renderable unit of a message. Tool payloads never appear here; a
/// result block only acknowledges the tool by name.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum DisplayBlock {
    Paragraph(Vec<Span>),
    ToolCall {
        tool_name: String,
        args_preview: String,
    },
    ToolResult {
        tool_name: String,
    },
    Spacing,
    Divider,
}

/// Blocks produced by one fragment, keyed by the fragment's position so the
/// wall can address them stably across re-renders.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FragmentGroup {
    pub(crate) fragment_index: usize,
    pub(crate) blocks: Vec<DisplayBlock>,
}

/// Map a message to its display blocks. Pure and deterministic; an empty
/// result means the wall skips the message entirely.
pub(crate) fn render_message(message: &Message) -> Vec<FragmentGroup> {
    if message.role == Role::User {
        let text = message.first_text().unwrap_or_default();
        return single_group(user_blocks(text));
    }

    if message.fragments.is_empty() {
        // Snapshots written before fragments existed carry flat text.
        let content = message.content.as_deref().unwrap_or_default();
        if content.is_empty() {
            return Vec::new();
        }
        return single_group(text_blocks(content));
    }

    let mut groups = Vec::new();
    for (index, fragment) in message.fragments.iter().enumerate() {
        let blocks = match fragment {
            Fragment::Text { text } => {
                if text.is_empty() {
                    continue;
                }
                text_blocks(text)
            }
            Fragment::ToolCall { tool_name, args } => vec![DisplayBlock::ToolCall {
                tool_name: tool_name.clone(),
                args_preview: args_preview(args),
            }],
            Fragment::ToolResult { tool_name, .. } => vec![DisplayBlock::ToolResult {
                tool_name: tool_name.clone(),
            }],
            Fragment::Reasoning { .. } => continue,
        };
        if blocks.is_empty() {
            continue;
        }
        groups.push(FragmentGroup {
            fragment_index: index,
            blocks,
        });
    }
    groups
}

fn single_group(blocks: Vec<DisplayBlock>) -> Vec<FragmentGroup> {
    if blocks.is_empty() {
        Vec::new()
    } else {
        vec![FragmentGroup {
            fragment_index: 0,
            blocks,
        }]
    }
}

/// Assistant text: blank line becomes spacing, a lone `---` a divider,
/// anything else a paragraph of inline spans.
fn text_blocks(text: &str) -> Vec<DisplayBlock> {
    let mut blocks = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end();
        if line.is_empty() {
            blocks.push(DisplayBlock::Spacing);
        } else if line.trim() == DIVIDER_TOKEN {
            blocks.push(DisplayBlock::Divider);
        } else {
            blocks.push(DisplayBlock::Paragraph(segment_line(line)));
        }
    }
    blocks
}

/// User text is never interpreted as markup: links only, line breaks kept
/// verbatim.
fn user_blocks(text: &str) -> Vec<DisplayBlock> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                DisplayBlock::Spacing
            } else {
                DisplayBlock::Paragraph(scan_links(line))
            }
        })
        .collect()
}

fn args_preview(args: &Value) -> String {
    let raw = match args {
        Value::Null => return String::new(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    };
    truncate(&raw, ARGS_PREVIEW_MAX_CHARS)
}
