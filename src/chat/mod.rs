use std::sync::{Arc, Mutex};

use crossbeam_channel::Receiver;
use ratatui::text::{Line, Text};
use ratatui::widgets::{Paragraph, Wrap};

use crate::backend;

mod conversation;
mod input;
mod persist;
mod render;
mod runtime;
mod segment;
mod status;
#[cfg(test)]
mod tests;
mod types;
pub(crate) mod ui;
mod worker;

pub(crate) use conversation::{Conversation, OpenTurn};
pub(crate) use persist::SnapshotStore;
pub(crate) use runtime::run_app;
pub(crate) use types::{Fragment, Message, TurnEvent};

#[cfg(test)]
pub(crate) use persist::ConversationSnapshot;
#[cfg(test)]
pub(crate) use render::{render_message, DisplayBlock, ARGS_PREVIEW_MAX_CHARS};
#[cfg(test)]
pub(crate) use segment::Span;
#[cfg(test)]
pub(crate) use status::ChatStatus;
#[cfg(test)]
pub(crate) use types::Role;

/// Rows taken by the composer, hint, and status areas below the transcript.
const FIXED_ROWS: u16 = 5;
const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

/// Cached transcript rendering; rebuilt when the generation counter or the
/// viewport changes.
struct RenderCache {
    generation: u64,
    width: u16,
    height: u16,
    lines: Vec<Line<'static>>,
    scroll_max: u16,
}

impl RenderCache {
    fn new() -> Self {
        Self {
            generation: u64::MAX, // force first rebuild
            width: 0,
            height: 0,
            lines: Vec::new(),
            scroll_max: 0,
        }
    }
}

pub(crate) struct ChatApp {
    conversation: Conversation,

    input: String,
    cursor: usize,
    should_quit: bool,
    spinner_idx: usize,
    scroll: u16,
    autoscroll: bool,
    viewport_width: u16,
    viewport_height: u16,
    quick_prompt_idx: usize,
    notice: Option<String>,

    rx: Option<Receiver<TurnEvent>>,
    child_pids: Arc<Mutex<Vec<u32>>>,

    render_generation: u64,
    render_cache: RenderCache,
}

impl ChatApp {
    fn new() -> Self {
        let store = if cfg!(test) {
            None
        } else {
            SnapshotStore::open_default().ok()
        };
        let mut conversation = Conversation::load(store);
        conversation.maybe_bootstrap_welcome();

        Self {
            conversation,
            input: String::new(),
            cursor: 0,
            should_quit: false,
            spinner_idx: 0,
            scroll: 0,
            autoscroll: true,
            viewport_width: 120,
            viewport_height: 36,
            quick_prompt_idx: 0,
            notice: None,
            rx: None,
            child_pids: Arc::new(Mutex::new(Vec::new())),
            render_generation: 0,
            render_cache: RenderCache::new(),
        }
    }

    pub(super) fn is_running(&self) -> bool {
        self.conversation.status().is_running()
    }

    pub(super) fn stop_turn(&mut self) {
        if !self.conversation.status().can_stop() {
            return;
        }
        // Status drops to idle first; the kill below is only advisory.
        self.conversation.stop();
        self.rx = None;
        backend::cancel(&self.child_pids);
        self.notice = Some("stopped".to_string());
    }

    pub(super) fn clear_chat(&mut self) {
        self.conversation.clear();
        self.conversation.maybe_bootstrap_welcome();
        self.notice = Some("chat cleared".to_string());
        self.follow_scroll();
    }

    /// Bump the render generation to invalidate the transcript cache.
    fn invalidate_render_cache(&mut self) {
        self.render_generation = self.render_generation.wrapping_add(1);
    }

    /// Invalidate and keep the viewport pinned to the bottom while
    /// autoscroll is on. Call after any transcript mutation.
    pub(super) fn follow_scroll(&mut self) {
        self.invalidate_render_cache();
        if self.autoscroll {
            self.scroll = self.scroll_max();
        } else {
            self.scroll = self.scroll.min(self.scroll_max());
        }
    }

    pub(super) fn ensure_render_cache(&mut self) {
        let need_rebuild = self.render_cache.generation != self.render_generation
            || self.render_cache.width != self.viewport_width
            || self.render_cache.height != self.viewport_height;
        if !need_rebuild {
            return;
        }

        let width = self.viewport_width.max(1);
        let lines = ui::transcript_lines(&self.conversation, width);
        let paragraph = Paragraph::new(Text::from(lines.clone())).wrap(Wrap { trim: false });
        let rendered_line_count = paragraph.line_count(width) as u16;
        let scroll_max = rendered_line_count.saturating_sub(self.transcript_height());

        self.render_cache = RenderCache {
            generation: self.render_generation,
            width: self.viewport_width,
            height: self.viewport_height,
            lines,
            scroll_max,
        };
    }

    fn transcript_height(&self) -> u16 {
        self.viewport_height.saturating_sub(FIXED_ROWS).max(1)
    }

    fn scroll_max(&mut self) -> u16 {
        self.ensure_render_cache();
        self.render_cache.scroll_max
    }

    pub(super) fn cached_transcript_lines(&self) -> &[Line<'static>] {
        &self.render_cache.lines
    }

    pub(super) fn update_viewport(&mut self, width: u16, height: u16) {
        self.viewport_width = width.max(1);
        self.viewport_height = height.max(1);
        let max_scroll = self.scroll_max();
        if self.autoscroll {
            self.scroll = max_scroll;
        } else {
            self.scroll = self.scroll.min(max_scroll);
        }
    }

    pub(super) fn scroll_up(&mut self, n: u16) {
        let from = if self.autoscroll {
            self.scroll_max()
        } else {
            self.scroll
        };
        self.autoscroll = false;
        self.scroll = from.saturating_sub(n);
    }

    pub(super) fn scroll_down(&mut self, n: u16) {
        let max_scroll = self.scroll_max();
        self.scroll = self.scroll.saturating_add(n).min(max_scroll);
        if self.scroll >= max_scroll {
            self.autoscroll = true;
        }
    }

    pub(super) fn spinner_frame(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_idx % SPINNER_FRAMES.len()]
    }

    #[cfg(test)]
    pub(super) fn push_test_turn(&mut self, rx: Receiver<TurnEvent>) {
        self.rx = Some(rx);
    }
}
