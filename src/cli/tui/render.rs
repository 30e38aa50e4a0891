use ratatui::{
    layout::{Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::sidebar::{sidebar_items, truncate};
use super::theme::*;
use super::{Focus, TuiApp};
use crate::core::message::{Message, Sender};

const SIDEBAR_WIDTH: u16 = 28;
const INDENT: &str = "    ";

/// Render a spinner character based on tick count
pub fn spinner(tick: u64) -> &'static str {
    const FRAMES: &[&str] = &[
        "\u{280B}", "\u{2819}", "\u{2839}", "\u{2838}", "\u{283C}", "\u{2834}", "\u{2826}",
        "\u{2827}", "\u{2807}", "\u{280F}",
    ];
    FRAMES[(tick as usize) % FRAMES.len()]
}

/// Break `text` into rows of at most `width` terminal columns, preferring
/// to break at spaces. Explicit newlines are kept.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for raw in text.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let mut line = String::new();
        let mut cols = 0usize;
        for (i, word) in raw.split(' ').enumerate() {
            let word_cols = word.width();
            if i > 0 {
                if cols > 0 && cols + 1 + word_cols.min(width) > width {
                    out.push(std::mem::take(&mut line));
                    cols = 0;
                } else {
                    line.push(' ');
                    cols += 1;
                }
            }
            for ch in word.chars() {
                let ch_cols = ch.width().unwrap_or(0);
                // Zero-width marks stay with the character they modify
                if ch_cols > 0 && cols > 0 && cols + ch_cols > width {
                    out.push(std::mem::take(&mut line));
                }
                line.push(ch);
                cols = line.width();
            }
        }
        out.push(line);
    }
    out
}

/// Conversation lines for one session: its messages in order, then any
/// notices, then the waiting indicator.
pub fn chat_lines(
    messages: &[Message],
    notices: &[String],
    awaiting: bool,
    tick: u64,
    width: usize,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let text_width = width.saturating_sub(INDENT.len());

    for msg in messages {
        let (icon, label, color) = match msg.sender {
            Sender::User => ("\u{25B6}", "You", GREEN),
            Sender::Bot => ("\u{2728}", "Bot", ACCENT),
        };
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled(format!("  {icon} "), Style::default().fg(color)),
            Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        ]));
        for row in wrap(&msg.text, text_width) {
            lines.push(Line::from(Span::styled(
                format!("{INDENT}{row}"),
                Style::default().fg(TEXT),
            )));
        }
    }

    for notice in notices {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  \u{2716} {notice}"),
            Style::default().fg(RED).add_modifier(Modifier::BOLD),
        )));
    }

    if awaiting {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {} Waiting for answer...", spinner(tick)),
            Style::default().fg(YELLOW),
        )));
    }

    if !lines.is_empty() {
        // Bottom spacer
        lines.push(Line::from(""));
    }
    lines
}

pub(super) fn ui(f: &mut Frame, app: &mut TuiApp) {
    let area = f.area();
    f.render_widget(Paragraph::new("").style(Style::default().bg(BG)), area);

    let (sidebar_area, main_area) = if area.width > 60 {
        let c = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(30)])
            .split(area);
        (c[0], c[1])
    } else {
        (Rect::default(), area)
    };

    let input_rows = app.input.lines().len().clamp(1, app.input_max_lines.max(1)) as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(input_rows + 2),
            Constraint::Length(1),
        ])
        .split(main_area);

    render_header(f, app, chunks[0]);
    render_chat(f, app, chunks[1]);
    render_input(f, app, chunks[2]);
    render_status(f, app, chunks[3]);

    // Drawn last so the item menu overlays the chat
    let items = sidebar_items(app.chat.store(), app.chat.active(), app.chat.requests());
    app.sidebar.clamp(items.len());
    let focused = app.focus == Focus::Sidebar;
    app.sidebar.render(f, sidebar_area, &items, focused, app.tick);
}

fn render_header(f: &mut Frame, app: &TuiApp, area: Rect) {
    let (title, short) = match app.chat.active() {
        Some(id) => (app.chat.store().display_title(id).to_string(), id.short().to_string()),
        None => ("No chat selected".to_string(), String::new()),
    };
    let max = (area.width as usize).saturating_sub(30);
    let line = Line::from(vec![
        Span::styled(" \u{1F4AC} ", Style::default().fg(ACCENT)),
        Span::styled(
            "ragchat",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled("  \u{2502}  ", Style::default().fg(BORDER)),
        Span::styled(truncate(&title, max), Style::default().fg(CYAN).add_modifier(Modifier::BOLD)),
        Span::styled(format!("  \u{2502}  {short}"), Style::default().fg(DIM)),
    ]);
    f.render_widget(Paragraph::new(line).style(Style::default().bg(SURFACE)), area);
}

fn render_chat(f: &mut Frame, app: &mut TuiApp, area: Rect) {
    app.chat_area = area;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER));
    let inner = block.inner(area);
    // One column is left for the scrollbar
    let width = inner.width.saturating_sub(1) as usize;

    let lines = match app.chat.active() {
        Some(id) => chat_lines(
            app.chat.store().messages(id),
            app.chat.notices(id),
            app.chat.is_awaiting(id),
            app.tick,
            width,
        ),
        None => Vec::new(),
    };

    if lines.is_empty() {
        let hint = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "  Ask a question to start.",
                Style::default().fg(DIM).add_modifier(Modifier::ITALIC),
            )),
        ])
        .block(block);
        f.render_widget(hint, area);
        app.max_scroll = 0;
        app.scroll_offset = 0;
        return;
    }

    // Rows are pre-wrapped to the pane width, so one line is one screen row
    let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    app.max_scroll = total.saturating_sub(inner.height);
    if app.follow {
        app.scroll_offset = app.max_scroll;
    }
    app.scroll_offset = app.scroll_offset.min(app.max_scroll);

    let chat = Paragraph::new(Text::from(lines))
        .scroll((app.scroll_offset, 0))
        .block(block);
    f.render_widget(chat, area);

    if app.max_scroll > 0 {
        let sb = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_style(Style::default().fg(ACCENT))
            .track_style(Style::default().fg(BORDER));
        let mut state =
            ScrollbarState::new(app.max_scroll as usize).position(app.scroll_offset as usize);
        f.render_stateful_widget(
            sb,
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut state,
        );
    }
}

fn render_input(f: &mut Frame, app: &mut TuiApp, area: Rect) {
    let awaiting = app.chat.active_is_awaiting();
    let focused = app.focus == Focus::Input && !app.sidebar.is_modal();
    let blank = app.input.lines().iter().all(|l| l.trim().is_empty());

    let border = if focused && !awaiting { BORDER_ACTIVE } else { BORDER };
    let title = if awaiting {
        format!(" {} Waiting... Esc cancel ", spinner(app.tick))
    } else {
        " Message \u{2502} Enter send \u{2502} Alt+Enter newline ".to_string()
    };
    let button = if awaiting {
        Span::styled(" \u{25A0} ", Style::default().fg(RED).add_modifier(Modifier::BOLD))
    } else if blank {
        Span::styled(" \u{2191} ", Style::default().fg(DIM))
    } else {
        Span::styled(" \u{2191} ", Style::default().fg(GREEN).add_modifier(Modifier::BOLD))
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(title, Style::default().fg(ACCENT)))
        .title_top(Line::from(button).right_aligned());
    app.input.set_block(block);

    let text_style = if awaiting {
        Style::default().fg(DIM)
    } else {
        Style::default().fg(TEXT)
    };
    app.input.set_style(text_style);
    app.input.set_cursor_style(if focused && !awaiting {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    });

    f.render_widget(&app.input, area);

    app.input_area = area;
    app.button_area = Rect::new(area.x + area.width.saturating_sub(5), area.y, 3, 1);
}

/// Status bar text. A pending request on the chat on screen takes
/// precedence over the last event message.
pub(super) fn status_text(app: &TuiApp) -> &str {
    if app.chat.active_is_awaiting() {
        "Waiting for answer..."
    } else {
        &app.status_message
    }
}

fn render_status(f: &mut Frame, app: &TuiApp, area: Rect) {
    let pending = app.chat.requests().awaiting_count();
    let status_fg = if pending > 0 { YELLOW } else { GREEN };
    let sep = Span::styled(" \u{2502} ", Style::default().fg(BORDER));

    let line = Line::from(vec![
        Span::styled(format!(" {} ", status_text(app)), Style::default().fg(status_fg)),
        sep.clone(),
        Span::styled(format!("{pending} pending"), Style::default().fg(DIM)),
        sep.clone(),
        Span::styled(app.chat.backend_name().to_string(), Style::default().fg(CYAN)),
        sep,
        Span::styled(
            "^N new  Tab chats  r rename  m menu  ^Q quit",
            Style::default().fg(HINT),
        ),
    ]);
    f.render_widget(Paragraph::new(line).style(Style::default().bg(SURFACE)), area);
}
