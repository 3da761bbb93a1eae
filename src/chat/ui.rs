use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config;
use crate::truncate;

use super::render::{render_message, DisplayBlock, FragmentGroup};
use super::segment::Span as TextSpan;
use super::types::Role;
use super::{ChatApp, Conversation};

pub(super) struct Palette {
    prompt: Color,
    input_text: Color,
    muted: Color,
    user_fg: Color,
    user_bg: Color,
    assistant_text: Color,
    tool_icon: Color,
    tool_text: Color,
    link: Color,
    divider: Color,
    status_text: Color,
    error_text: Color,
    border: Color,
}

/// Warm amber scheme to match the movie-night mood of the chat surface.
pub(super) fn palette() -> Palette {
    Palette {
        prompt: Color::Rgb(245, 158, 11),
        input_text: Color::Rgb(253, 230, 191),
        muted: Color::Rgb(198, 154, 106),
        user_fg: Color::Rgb(253, 230, 191),
        user_bg: Color::Rgb(42, 24, 16),
        assistant_text: Color::Rgb(235, 219, 198),
        tool_icon: Color::Rgb(198, 154, 106),
        tool_text: Color::Rgb(182, 142, 98),
        link: Color::Rgb(245, 158, 11),
        divider: Color::Rgb(90, 60, 40),
        status_text: Color::Rgb(170, 132, 92),
        error_text: Color::Rgb(230, 120, 120),
        border: Color::Rgb(58, 33, 20),
    }
}

impl Palette {
    fn body_style(&self) -> Style {
        Style::default().fg(self.assistant_text)
    }

    fn link_style(&self) -> Style {
        Style::default()
            .fg(self.link)
            .add_modifier(Modifier::UNDERLINED)
    }

    fn muted_style(&self) -> Style {
        Style::default().fg(self.muted)
    }

    fn user_style(&self) -> Style {
        Style::default().fg(self.user_fg).bg(self.user_bg)
    }

    fn prompt_style(&self) -> Style {
        Style::default().fg(self.prompt).add_modifier(Modifier::BOLD)
    }

    fn input_style(&self) -> Style {
        Style::default().fg(self.input_text)
    }

    fn status_style(&self) -> Style {
        Style::default().fg(self.status_text)
    }

    fn error_style(&self) -> Style {
        Style::default().fg(self.error_text)
    }

    fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }
}

/// Build the full transcript as styled lines. Messages that render to no
/// blocks are skipped outright, never shown as empty bubbles.
pub(super) fn transcript_lines(conversation: &Conversation, width: u16) -> Vec<Line<'static>> {
    let palette = palette();
    let mut lines = Vec::new();

    for message in conversation.messages() {
        let groups = render_message(message);
        if groups.is_empty() {
            continue;
        }
        match message.role {
            Role::User => push_user_lines(&mut lines, &groups, width, &palette),
            Role::Assistant => {
                push_assistant_lines(&mut lines, &groups, width, &palette);
                if let Some(ms) = conversation.duration_ms(&message.id) {
                    lines.push(Line::from(Span::styled(
                        format!("· {:.1}s", ms as f64 / 1000.0),
                        palette.muted_style(),
                    )));
                }
            }
        }
        lines.push(Line::from(""));
    }

    lines
}

fn push_user_lines(
    lines: &mut Vec<Line<'static>>,
    groups: &[FragmentGroup],
    width: u16,
    palette: &Palette,
) {
    let base = palette.user_style().add_modifier(Modifier::BOLD);
    let link = palette
        .user_style()
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    for group in groups {
        for block in &group.blocks {
            let mut row: Vec<Span<'static>> = vec![Span::styled(" ", base)];
            if let DisplayBlock::Paragraph(spans) = block {
                row.extend(inline_spans(spans, base, link));
            }
            pad_row(&mut row, width, base);
            lines.push(Line::from(row));
        }
    }
}

fn push_assistant_lines(
    lines: &mut Vec<Line<'static>>,
    groups: &[FragmentGroup],
    width: u16,
    palette: &Palette,
) {
    for group in groups {
        for block in &group.blocks {
            match block {
                DisplayBlock::Paragraph(spans) => {
                    lines.push(Line::from(inline_spans(
                        spans,
                        palette.body_style(),
                        palette.link_style(),
                    )));
                }
                DisplayBlock::ToolCall {
                    tool_name,
                    args_preview,
                } => {
                    let mut text = format!("using {tool_name}");
                    if !args_preview.is_empty() {
                        text.push_str(" - ");
                        text.push_str(args_preview);
                    }
                    lines.push(Line::from(vec![
                        Span::styled(
                            "  \u{25B8} ".to_string(),
                            Style::default()
                                .fg(palette.tool_icon)
                                .add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(text, Style::default().fg(palette.tool_text)),
                    ]));
                }
                DisplayBlock::ToolResult { tool_name } => {
                    lines.push(Line::from(vec![
                        Span::styled(
                            "  \u{2714} ".to_string(),
                            Style::default().fg(palette.tool_icon),
                        ),
                        Span::styled(
                            format!("got results from {tool_name}"),
                            Style::default().fg(palette.tool_text),
                        ),
                    ]));
                }
                DisplayBlock::Spacing => lines.push(Line::from("")),
                DisplayBlock::Divider => {
                    lines.push(Line::from(Span::styled(
                        "─".repeat(width.max(1) as usize),
                        Style::default().fg(palette.divider),
                    )));
                }
            }
        }
    }
}

fn inline_spans(spans: &[TextSpan], base: Style, link: Style) -> Vec<Span<'static>> {
    let mut out = Vec::new();
    for span in spans {
        match span {
            TextSpan::Plain(text) => out.push(Span::styled(text.clone(), base)),
            // The matched text is already what should be displayed; the href
            // only differs for www. links and terminals can't follow it.
            TextSpan::Link { text, .. } => out.push(Span::styled(text.clone(), link)),
            TextSpan::Bold(children) => out.extend(inline_spans(
                children,
                base.add_modifier(Modifier::BOLD),
                link.add_modifier(Modifier::BOLD),
            )),
        }
    }
    out
}

fn pad_row(row: &mut Vec<Span<'static>>, width: u16, style: Style) {
    let used: usize = row
        .iter()
        .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
        .sum();
    let target = width as usize;
    if target > used {
        row.push(Span::styled(" ".repeat(target - used), style));
    }
}

pub(super) fn draw(f: &mut Frame, app: &ChatApp) {
    let palette = palette();
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    let transcript = Paragraph::new(Text::from(app.cached_transcript_lines().to_vec()))
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    f.render_widget(transcript, chunks[0]);

    // Composer: single line with a sliding window so the cursor stays visible.
    let prompt = "> ";
    let prompt_width = UnicodeWidthStr::width(prompt) as u16;
    let inner_width = chunks[1].width.saturating_sub(2);
    let avail = inner_width.saturating_sub(prompt_width).max(1);
    let (visible, cursor_col) = compose_window(&app.input, app.cursor, avail);
    let composer_line = if app.input.is_empty() {
        Line::from(vec![
            Span::styled(prompt.to_string(), palette.prompt_style()),
            Span::styled(
                "describe what you want to watch...".to_string(),
                palette.muted_style(),
            ),
        ])
    } else {
        Line::from(vec![
            Span::styled(prompt.to_string(), palette.prompt_style()),
            Span::styled(visible, palette.input_style()),
        ])
    };
    let composer = Paragraph::new(composer_line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(palette.border_style())
            .title(format!(" {} ", config::AI_NAME)),
    );
    f.render_widget(composer, chunks[1]);
    f.set_cursor_position((
        chunks[1].x + 1 + prompt_width + cursor_col,
        chunks[1].y + 1,
    ));

    // Hints
    let (label, _) = config::QUICK_PROMPTS[app.quick_prompt_idx % config::QUICK_PROMPTS.len()];
    let hints = format!(
        "Tab quick prompt: {label} | Enter send | Esc stop | Ctrl+N new chat | Ctrl+C quit"
    );
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(hints, palette.muted_style()))),
        chunks[2],
    );

    // Status
    let status = app.conversation.status();
    let mut text = if status.is_running() {
        format!("{} {}", app.spinner_frame(), status.label())
    } else {
        status.label().to_string()
    };
    let style = if status == super::status::ChatStatus::Error {
        if let Some(reason) = app.conversation.failure_note() {
            text.push_str(" | ");
            text.push_str(&truncate(reason, 80));
        }
        palette.error_style()
    } else {
        if let Some(note) = app.notice.as_deref() {
            text.push_str(" | ");
            text.push_str(note);
        }
        palette.status_style()
    };
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(text, style))),
        chunks[3],
    );
}

/// Window `input` so the cursor column fits inside `avail` display columns.
fn compose_window(input: &str, cursor: usize, avail: u16) -> (String, u16) {
    let avail = avail.max(1) as usize;
    let chars: Vec<(usize, char, usize)> = input
        .char_indices()
        .map(|(idx, ch)| (idx, ch, UnicodeWidthChar::width(ch).unwrap_or(1).max(1)))
        .collect();
    let cursor_idx = chars
        .iter()
        .position(|(idx, _, _)| *idx >= cursor)
        .unwrap_or(chars.len());

    let mut cursor_col: usize = chars[..cursor_idx].iter().map(|(_, _, w)| w).sum();
    let mut start = 0;
    while cursor_col > avail.saturating_sub(1) {
        cursor_col -= chars[start].2;
        start += 1;
    }

    let mut shown = String::new();
    let mut used = 0usize;
    for (_, ch, w) in &chars[start..] {
        if used + w > avail {
            break;
        }
        shown.push(*ch);
        used += w;
    }
    (shown, cursor_col as u16)
}
