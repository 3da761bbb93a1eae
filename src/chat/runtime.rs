use std::io::Stdout;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use super::*;

pub(crate) fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let mut app = ChatApp::new();
    const ACTIVE_POLL_MS: u64 = 33;
    const IDLE_POLL_MS: u64 = 100;
    const SPINNER_TICK_MS: u64 = 120;
    const MAX_EVENTS_PER_FRAME: u16 = 64;
    let mut last_spinner_tick = Instant::now();
    let mut needs_draw = true;

    loop {
        let mut state_changed = app.poll_backend();
        if app.is_running()
            && last_spinner_tick.elapsed() >= Duration::from_millis(SPINNER_TICK_MS)
        {
            app.spinner_idx = (app.spinner_idx + 1) % SPINNER_FRAMES.len();
            last_spinner_tick = Instant::now();
            state_changed = true;
        }
        if state_changed {
            needs_draw = true;
        }

        if needs_draw {
            if let Ok(size) = terminal.size() {
                app.update_viewport(size.width, size.height);
            }
            app.ensure_render_cache();
            terminal.draw(|f| ui::draw(f, &app))?;
            needs_draw = false;
        }

        if app.should_quit {
            break;
        }

        let timeout = if app.is_running() {
            Duration::from_millis(ACTIVE_POLL_MS)
        } else {
            Duration::from_millis(IDLE_POLL_MS)
        };
        if !event::poll(timeout).context("event poll")? {
            continue;
        }

        let mut drained: u16 = 0;
        loop {
            match event::read().context("event read")? {
                Event::Key(key) => {
                    if !matches!(key.kind, KeyEventKind::Release) {
                        app.handle_key(key);
                    }
                }
                Event::Paste(text) => app.handle_paste(&text),
                Event::Resize(_, _) => {}
                _ => {}
            }
            needs_draw = true;
            drained = drained.saturating_add(1);
            if drained >= MAX_EVENTS_PER_FRAME {
                break;
            }
            if !event::poll(Duration::from_millis(0)).context("event poll drain")? {
                break;
            }
        }
    }

    app.conversation.persist();
    Ok(())
}
