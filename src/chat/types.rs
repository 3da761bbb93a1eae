use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
    Assistant,
}

/// One typed unit of message content. Tool args and payloads stay opaque
/// JSON; their schema belongs to the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(crate) enum Fragment {
    Text {
        text: String,
    },
    ToolCall {
        #[serde(rename = "toolName")]
        tool_name: String,
        #[serde(default)]
        args: Value,
    },
    ToolResult {
        #[serde(rename = "toolName")]
        tool_name: String,
        #[serde(default)]
        payload: Value,
    },
    /// Kept for audit, never rendered.
    Reasoning {
        text: String,
    },
}

impl Fragment {
    pub(crate) fn text(text: impl Into<String>) -> Self {
        Fragment::Text { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Message {
    pub(crate) id: String,
    pub(crate) role: Role,
    #[serde(default)]
    pub(crate) fragments: Vec<Fragment>,
    /// Flat text from snapshots written before fragments existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) content: Option<String>,
}

impl Message {
    pub(crate) fn new(id: String, role: Role, fragments: Vec<Fragment>) -> Self {
        Self {
            id,
            role,
            fragments,
            content: None,
        }
    }

    pub(crate) fn first_text(&self) -> Option<&str> {
        match self.fragments.first() {
            Some(Fragment::Text { text }) => Some(text),
            _ => self.content.as_deref(),
        }
    }
}

/// Events the completion boundary delivers for an open turn.
#[derive(Debug)]
pub(crate) enum TurnEvent {
    Fragment {
        message_id: String,
        fragment: Fragment,
    },
    Completed {
        message_id: String,
        elapsed_ms: u64,
    },
    Failed {
        reason: String,
    },
}
