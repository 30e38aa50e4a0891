mod render;
mod sidebar;
mod theme;

use anyhow::Result;
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers, KeyboardEnhancementFlags, MouseButton, MouseEvent,
        MouseEventKind, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{
    layout::{Position, Rect},
    prelude::CrosstermBackend,
    style::Style,
    Terminal,
};
use std::io;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tui_textarea::TextArea;

use crate::chat::{ChatController, ChatEvent, Completion};
use crate::core::session::ChatId;

use sidebar::{sidebar_items, SidebarAction, SidebarState};
use theme::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Input,
    Sidebar,
}

// ─── App State ───────────────────────────────────────

struct TuiApp {
    chat: ChatController,
    events: mpsc::Receiver<ChatEvent>,
    input: TextArea<'static>,
    input_max_lines: usize,
    focus: Focus,
    sidebar: SidebarState,
    scroll_offset: u16,
    max_scroll: u16,
    /// Pin the conversation to its newest line on the next draw.
    follow: bool,
    status_message: String,
    should_quit: bool,
    tick: u64,
    chat_area: Rect,
    input_area: Rect,
    button_area: Rect,
}

impl TuiApp {
    fn new(chat: ChatController, events: mpsc::Receiver<ChatEvent>, input_max_lines: usize) -> Self {
        let mut app = Self {
            chat,
            events,
            input: new_input(),
            input_max_lines,
            focus: Focus::Input,
            sidebar: SidebarState::default(),
            scroll_offset: 0,
            max_scroll: 0,
            follow: true,
            status_message: "Ready".into(),
            should_quit: false,
            tick: 0,
            chat_area: Rect::default(),
            input_area: Rect::default(),
            button_area: Rect::default(),
        };
        app.sync_selection();
        app
    }

    fn sync_selection(&mut self) {
        if let Some(active) = self.chat.active().cloned() {
            let items = sidebar_items(self.chat.store(), Some(&active), self.chat.requests());
            self.sidebar.select(&items, &active);
        }
    }

    fn input_text(&self) -> String {
        self.input.lines().join("\n")
    }
}

fn new_input() -> TextArea<'static> {
    let mut input = TextArea::default();
    input.set_placeholder_text("Ask a question...");
    input.set_placeholder_style(Style::default().fg(DIM));
    input.set_cursor_line_style(Style::default());
    input
}

pub async fn run(app: super::App, resume_session: Option<ChatId>) -> Result<()> {
    let super::App {
        mut chat,
        events,
        config,
    } = app;

    chat.init().await;
    if let Some(id) = &resume_session {
        chat.switch_to(id).map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    // Without this most terminals report Shift+Enter as a plain Enter
    let enhanced_keys = supports_keyboard_enhancement().unwrap_or(false);
    if enhanced_keys {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut tui_app = TuiApp::new(chat, events, config.input_max_lines as usize);
    let result = run_event_loop(&mut terminal, &mut tui_app).await;

    if enhanced_keys {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result
}

// ─── Event Loop ──────────────────────────────────────

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut TuiApp,
) -> Result<()> {
    let mut event_reader = EventStream::new();
    let mut tick_interval = tokio::time::interval(std::time::Duration::from_millis(80));

    loop {
        terminal.draw(|f| render::ui(f, app))?;
        if app.should_quit {
            return Ok(());
        }

        tokio::select! {
            biased;

            Some(event) = app.events.recv() => {
                handle_chat_event(app, event).await;
            }

            Some(Ok(event)) = event_reader.next() => {
                match event {
                    Event::Key(key) => handle_key_event(app, key).await,
                    Event::Mouse(mouse) => handle_mouse_event(app, mouse).await,
                    _ => {}
                }
            }

            _ = tick_interval.tick() => {
                app.tick += 1;
            }
        }
    }
}

// ─── Chat Events ─────────────────────────────────────

async fn handle_chat_event(app: &mut TuiApp, event: ChatEvent) {
    let ChatEvent::Answered { chat_id, .. } = &event;
    let on_screen = app.chat.active() == Some(chat_id);

    match app.chat.apply(event).await {
        Completion::Answered(_) => app.status_message = "Ready".into(),
        Completion::Failed(_) => app.status_message = "Request failed".into(),
        Completion::Cancelled => app.status_message = "Cancelled".into(),
        Completion::Stale => return,
    }
    if on_screen {
        app.follow = true;
    }
}

// ─── Key Handling ────────────────────────────────────

async fn handle_key_event(app: &mut TuiApp, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    // Global keys
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), KeyModifiers::CONTROL) => {
            app.should_quit = true;
            return;
        }
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            if !cancel_active(app) {
                app.should_quit = true;
            }
            return;
        }
        (KeyCode::Char('n'), KeyModifiers::CONTROL) => {
            let action = app.sidebar.commit_editor();
            app.sidebar.menu = None;
            apply_sidebar_action(app, action).await;
            app.chat.new_chat().await;
            app.focus = Focus::Input;
            app.follow = true;
            app.status_message = "New chat".into();
            return;
        }
        _ => {}
    }

    if app.focus == Focus::Sidebar || app.sidebar.is_modal() {
        let items = sidebar_items(app.chat.store(), app.chat.active(), app.chat.requests());
        let action = app.sidebar.handle_key(key, &items);
        apply_sidebar_action(app, action).await;
        return;
    }

    let awaiting = app.chat.active_is_awaiting();
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            cancel_active(app);
        }
        (KeyCode::Tab, _) => {
            app.focus = Focus::Sidebar;
            app.sync_selection();
        }
        (KeyCode::Enter, m) if m.intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) => {
            if !awaiting {
                app.input.insert_newline();
            }
        }
        (KeyCode::Enter, _) => submit_input(app).await,
        // Up/Down move the cursor in a multi-line draft, otherwise they scroll
        (KeyCode::Up, KeyModifiers::NONE) if app.input.lines().len() <= 1 => scroll_up(app, 3),
        (KeyCode::Down, KeyModifiers::NONE) if app.input.lines().len() <= 1 => scroll_down(app, 3),
        (KeyCode::PageUp, _) => scroll_up(app, 10),
        (KeyCode::PageDown, _) => scroll_down(app, 10),
        _ if !awaiting => {
            app.input.input(key);
        }
        _ => {}
    }
}

async fn handle_mouse_event(app: &mut TuiApp, mouse: MouseEvent) {
    let pos = Position::new(mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::ScrollUp if app.chat_area.contains(pos) => scroll_up(app, 3),
        MouseEventKind::ScrollDown if app.chat_area.contains(pos) => scroll_down(app, 3),
        MouseEventKind::Down(MouseButton::Left) => {
            let in_sidebar = app.sidebar.contains(pos);
            if in_sidebar || app.sidebar.is_modal() {
                let items = sidebar_items(app.chat.store(), app.chat.active(), app.chat.requests());
                let action = app.sidebar.handle_click(pos, &items);
                apply_sidebar_action(app, action).await;
                if in_sidebar {
                    return;
                }
            }

            if app.button_area.contains(pos) {
                if !cancel_active(app) {
                    submit_input(app).await;
                }
                app.focus = Focus::Input;
            } else if app.input_area.contains(pos) {
                app.focus = Focus::Input;
            }
        }
        _ => {}
    }
}

async fn apply_sidebar_action(app: &mut TuiApp, action: SidebarAction) {
    match action {
        SidebarAction::None => {}
        SidebarAction::Switch(id) => {
            if let Err(e) = app.chat.switch_to(&id) {
                app.status_message = e.to_string();
                return;
            }
            app.focus = Focus::Input;
            app.follow = true;
        }
        SidebarAction::Rename(id, title) => {
            if app.chat.rename(&id, &title).await {
                app.status_message = "Renamed".into();
            }
        }
        SidebarAction::Delete(id) => {
            app.chat.delete(&id).await;
            app.status_message = "Chat deleted".into();
            app.follow = true;
            app.sync_selection();
        }
        SidebarAction::Leave => {
            app.focus = Focus::Input;
        }
    }
}

async fn submit_input(app: &mut TuiApp) {
    if app.chat.active_is_awaiting() {
        return;
    }
    let text = app.input_text();
    if app.chat.submit(&text).await.is_some() {
        app.input = new_input();
        app.follow = true;
        app.sync_selection();
    }
}

/// Cancel the request of the session on screen, if it has one.
fn cancel_active(app: &mut TuiApp) -> bool {
    let Some(id) = app.chat.active().cloned() else {
        return false;
    };
    if app.chat.cancel(&id) {
        app.status_message = "Cancelled".into();
        true
    } else {
        false
    }
}

fn scroll_up(app: &mut TuiApp, rows: u16) {
    app.follow = false;
    app.scroll_offset = app.scroll_offset.saturating_sub(rows);
}

fn scroll_down(app: &mut TuiApp, rows: u16) {
    app.scroll_offset = app.scroll_offset.saturating_add(rows).min(app.max_scroll);
    if app.scroll_offset == app.max_scroll {
        app.follow = true;
    }
}
