use crossbeam_channel::unbounded;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::{backend, config};

use super::*;

impl ChatApp {
    pub(super) fn handle_key(&mut self, key: KeyEvent) {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => self.should_quit = true,
            (KeyCode::Char('n'), KeyModifiers::CONTROL) => self.clear_chat(),
            (KeyCode::Esc, _) => self.stop_turn(),
            (KeyCode::Tab, _) => self.cycle_quick_prompt(),
            (KeyCode::Enter, _) => self.submit_message(),
            (KeyCode::Backspace, _) => self.delete_before_cursor(),
            (KeyCode::Delete, _) => self.delete_at_cursor(),
            (KeyCode::Left, _) => self.move_cursor_left(),
            (KeyCode::Right, _) => self.move_cursor_right(),
            (KeyCode::Home, _) => self.cursor = 0,
            (KeyCode::End, _) => self.cursor = self.input.len(),
            (KeyCode::PageUp, _) => self.scroll_up(5),
            (KeyCode::PageDown, _) => self.scroll_down(5),
            (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(ch);
            }
            _ => {}
        }
    }

    pub(super) fn handle_paste(&mut self, text: &str) {
        // The composer is one line; pasted newlines become spaces.
        for ch in text.chars() {
            let ch = if ch == '\n' || ch == '\r' { ' ' } else { ch };
            self.insert_char(ch);
        }
    }

    pub(super) fn submit_message(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }
        if text == "/exit" || text == "/quit" {
            self.should_quit = true;
            return;
        }
        if text == "/new" || text == "/clear" {
            self.clear_chat();
            self.clear_input();
            return;
        }
        if text.chars().count() > config::MAX_MESSAGE_CHARS {
            self.notice = Some(format!(
                "message must be at most {} characters",
                config::MAX_MESSAGE_CHARS
            ));
            return;
        }
        if !self.conversation.status().can_send() {
            self.notice = Some("a reply is in flight; Esc stops it".to_string());
            return;
        }

        let Some(turn) = self.conversation.send(&text) else {
            return;
        };
        let (tx, rx) = unbounded::<TurnEvent>();
        self.rx = Some(rx);
        backend::open_turn(turn, tx, self.child_pids.clone());
        self.notice = None;
        self.clear_input();
        self.follow_scroll();
    }

    fn cycle_quick_prompt(&mut self) {
        let (_, prompt) = config::QUICK_PROMPTS[self.quick_prompt_idx % config::QUICK_PROMPTS.len()];
        self.quick_prompt_idx = (self.quick_prompt_idx + 1) % config::QUICK_PROMPTS.len();
        // Paste into the composer only; sending stays a deliberate Enter.
        self.input = prompt.to_string();
        self.cursor = self.input.len();
    }

    fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    fn insert_char(&mut self, ch: char) {
        self.input.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn delete_before_cursor(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char_boundary(&self.input, self.cursor);
        self.input.replace_range(prev..self.cursor, "");
        self.cursor = prev;
    }

    fn delete_at_cursor(&mut self) {
        if self.cursor >= self.input.len() {
            return;
        }
        let next = next_char_boundary(&self.input, self.cursor);
        self.input.replace_range(self.cursor..next, "");
    }

    fn move_cursor_left(&mut self) {
        if self.cursor > 0 {
            self.cursor = prev_char_boundary(&self.input, self.cursor);
        }
    }

    fn move_cursor_right(&mut self) {
        if self.cursor < self.input.len() {
            self.cursor = next_char_boundary(&self.input, self.cursor);
        }
    }
}

fn prev_char_boundary(s: &str, idx: usize) -> usize {
    s[..idx]
        .char_indices()
        .next_back()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn next_char_boundary(s: &str, idx: usize) -> usize {
    s[idx..]
        .chars()
        .next()
        .map(|ch| idx + ch.len_utf8())
        .unwrap_or(s.len())
}
