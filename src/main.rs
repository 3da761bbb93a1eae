use std::io::Stdout;

use anyhow::{Context, Result};
use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

mod backend;
mod chat;
mod config;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--version" | "-v" => {
                println!("cinematch {}", APP_VERSION);
                return Ok(());
            }
            unknown => {
                eprintln!("unknown argument: {}", unknown);
                std::process::exit(2);
            }
        }
    }

    let mut terminal = setup_terminal()?;
    let result = chat::run_app(&mut terminal);
    restore_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enable raw mode")?;
    crossterm::execute!(std::io::stdout(), EnterAlternateScreen)
        .context("enter alternate screen")?;
    crossterm::execute!(std::io::stdout(), EnableBracketedPaste).ok();

    let terminal =
        Terminal::new(CrosstermBackend::new(std::io::stdout())).context("create terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    crossterm::execute!(std::io::stdout(), DisableBracketedPaste).ok();
    crossterm::execute!(std::io::stdout(), LeaveAlternateScreen).ok();
    disable_raw_mode().context("disable raw mode")?;
    terminal.show_cursor().context("show cursor")?;
    Ok(())
}

/// Cap to `max_chars`, replacing the tail with an ellipsis when over.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}
