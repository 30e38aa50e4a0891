use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use tui_textarea::TextArea;

use super::theme::*;
use crate::chat::RequestTracker;
use crate::core::session::ChatId;
use crate::storage::SessionStore;

/// One visible sidebar row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarItem {
    pub id: ChatId,
    pub title: String,
    pub active: bool,
    pub awaiting: bool,
}

/// Sidebar rows in display order. Empty sessions are skipped.
pub fn sidebar_items(
    store: &SessionStore,
    active: Option<&ChatId>,
    requests: &RequestTracker,
) -> Vec<SidebarItem> {
    store
        .sidebar()
        .into_iter()
        .map(|id| SidebarItem {
            id: id.clone(),
            title: store.display_title(id).to_string(),
            active: active == Some(id),
            awaiting: requests.is_awaiting(id),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEntry {
    Rename,
    Delete,
}

impl MenuEntry {
    const ALL: [MenuEntry; 2] = [MenuEntry::Rename, MenuEntry::Delete];

    fn label(&self) -> &'static str {
        match self {
            MenuEntry::Rename => "Rename",
            MenuEntry::Delete => "Delete",
        }
    }
}

/// Item-level menu opened on one sidebar row.
pub struct ItemMenu {
    pub id: ChatId,
    pub selected: usize,
}

/// Inline title editor replacing one sidebar row.
pub struct TitleEditor {
    pub id: ChatId,
    pub input: TextArea<'static>,
}

impl TitleEditor {
    fn new(id: ChatId, current: &str) -> Self {
        let mut input = TextArea::new(vec![current.to_string()]);
        input.move_cursor(tui_textarea::CursorMove::End);
        input.set_style(Style::default().fg(TEXT).bg(SURFACE));
        input.set_cursor_line_style(Style::default());
        Self { id, input }
    }

    fn text(&self) -> String {
        self.input.lines().join(" ")
    }
}

pub enum SidebarAction {
    None,
    Switch(ChatId),
    Rename(ChatId, String),
    Delete(ChatId),
    /// Focus goes back to the message input.
    Leave,
}

#[derive(Default)]
pub struct SidebarState {
    pub selected: usize,
    pub menu: Option<ItemMenu>,
    pub editor: Option<TitleEditor>,
    /// Screen rows of visible items, filled in while rendering.
    rows: Vec<(Rect, ChatId)>,
    menu_rows: Vec<(Rect, MenuEntry)>,
    area: Rect,
}

impl SidebarState {
    pub fn clamp(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    /// Move the selection onto `id` if it is listed.
    pub fn select(&mut self, items: &[SidebarItem], id: &ChatId) {
        if let Some(i) = items.iter().position(|it| &it.id == id) {
            self.selected = i;
        }
    }

    pub fn is_modal(&self) -> bool {
        self.menu.is_some() || self.editor.is_some()
    }

    pub fn open_menu(&mut self, items: &[SidebarItem]) {
        if let Some(item) = items.get(self.selected) {
            self.menu = Some(ItemMenu {
                id: item.id.clone(),
                selected: 0,
            });
        }
    }

    pub fn start_rename(&mut self, id: ChatId, current: &str) {
        self.menu = None;
        self.editor = Some(TitleEditor::new(id, current));
    }

    /// Close the editor, yielding the rename it commits. Blank titles are
    /// dropped by the store.
    pub fn commit_editor(&mut self) -> SidebarAction {
        match self.editor.take() {
            Some(editor) => {
                let title = editor.text();
                SidebarAction::Rename(editor.id, title)
            }
            None => SidebarAction::None,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, items: &[SidebarItem]) -> SidebarAction {
        if let Some(editor) = &mut self.editor {
            return match key.code {
                KeyCode::Enter | KeyCode::Esc | KeyCode::Tab => self.commit_editor(),
                _ => {
                    editor.input.input(key);
                    SidebarAction::None
                }
            };
        }

        if let Some(menu) = &mut self.menu {
            match key.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    menu.selected = menu.selected.saturating_sub(1);
                    return SidebarAction::None;
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    menu.selected = (menu.selected + 1).min(MenuEntry::ALL.len() - 1);
                    return SidebarAction::None;
                }
                KeyCode::Enter => {
                    let entry = MenuEntry::ALL[menu.selected];
                    return self.activate(entry, items);
                }
                KeyCode::Esc => {
                    self.menu = None;
                    return SidebarAction::None;
                }
                _ => {
                    // Anything else dismisses the menu and is handled normally
                    self.menu = None;
                }
            }
        }

        match (key.code, key.modifiers) {
            (KeyCode::Up, _) | (KeyCode::Char('k'), KeyModifiers::NONE) => {
                self.selected = self.selected.saturating_sub(1);
                SidebarAction::None
            }
            (KeyCode::Down, _) | (KeyCode::Char('j'), KeyModifiers::NONE) => {
                if self.selected + 1 < items.len() {
                    self.selected += 1;
                }
                SidebarAction::None
            }
            (KeyCode::Enter, _) => match items.get(self.selected) {
                Some(item) => SidebarAction::Switch(item.id.clone()),
                None => SidebarAction::None,
            },
            (KeyCode::Char('r'), KeyModifiers::NONE) | (KeyCode::F(2), _) => {
                if let Some(item) = items.get(self.selected) {
                    self.start_rename(item.id.clone(), &item.title);
                }
                SidebarAction::None
            }
            (KeyCode::Char('m'), KeyModifiers::NONE) => {
                self.open_menu(items);
                SidebarAction::None
            }
            (KeyCode::Tab, _) | (KeyCode::Esc, _) => SidebarAction::Leave,
            _ => SidebarAction::None,
        }
    }

    fn activate(&mut self, entry: MenuEntry, items: &[SidebarItem]) -> SidebarAction {
        let Some(menu) = self.menu.take() else {
            return SidebarAction::None;
        };
        match entry {
            MenuEntry::Rename => {
                let title = items
                    .iter()
                    .find(|it| it.id == menu.id)
                    .map(|it| it.title.clone())
                    .unwrap_or_default();
                self.start_rename(menu.id, &title);
                SidebarAction::None
            }
            MenuEntry::Delete => SidebarAction::Delete(menu.id),
        }
    }

    /// Left click at `pos`. Clicks outside an open menu dismiss it, and
    /// clicks outside the editor commit it.
    pub fn handle_click(&mut self, pos: Position, items: &[SidebarItem]) -> SidebarAction {
        if self.menu.is_some() {
            if let Some((_, entry)) = self.menu_rows.iter().find(|(r, _)| r.contains(pos)) {
                let entry = *entry;
                return self.activate(entry, items);
            }
            self.menu = None;
        }

        if let Some(editor) = &self.editor {
            let on_editor = self
                .rows
                .iter()
                .any(|(r, id)| id == &editor.id && r.contains(pos));
            if on_editor {
                return SidebarAction::None;
            }
            return self.commit_editor();
        }

        if let Some((row, id)) = self.rows.iter().find(|(r, _)| r.contains(pos)) {
            let on_toggle = pos.x + 2 >= row.x + row.width;
            let id = id.clone();
            self.select(items, &id);
            if on_toggle {
                self.open_menu(items);
                return SidebarAction::None;
            }
            return SidebarAction::Switch(id);
        }
        SidebarAction::None
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.area.contains(pos)
            || self.menu_rows.iter().any(|(r, _)| r.contains(pos))
    }

    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        items: &[SidebarItem],
        focused: bool,
        tick: u64,
    ) {
        self.area = area;
        self.rows.clear();
        self.menu_rows.clear();

        let border = if focused { BORDER_ACTIVE } else { BORDER };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(Span::styled(
                format!(" Chats ({}) ", items.len()),
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ));
        let inner = block.inner(area);
        f.render_widget(block, area);

        if items.is_empty() {
            f.render_widget(
                Paragraph::new(Line::from(Span::styled(" No chats yet", Style::default().fg(DIM)))),
                inner,
            );
            return;
        }

        let height = inner.height as usize;
        let first = self.selected.saturating_sub(height.saturating_sub(1));

        for (row, (i, item)) in items.iter().enumerate().skip(first).take(height).enumerate() {
            let rect = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
            self.rows.push((rect, item.id.clone()));

            if let Some(editor) = self.editor.as_ref().filter(|e| e.id == item.id) {
                f.render_widget(&editor.input, rect);
                continue;
            }

            let marker = if focused && i == self.selected { "> " } else { "  " };
            let prefix = if item.awaiting {
                format!("{} ", super::render::spinner(tick))
            } else {
                String::new()
            };
            let style = if item.active {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else if focused && i == self.selected {
                Style::default().fg(TEXT).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(TEXT)
            };
            let width = (inner.width as usize).saturating_sub(marker.len() + prefix.chars().count() + 2);
            let line = Line::from(vec![
                Span::styled(marker, Style::default().fg(ACCENT)),
                Span::styled(prefix, Style::default().fg(YELLOW)),
                Span::styled(truncate(&item.title, width), style),
                Span::styled(" \u{22EE}", Style::default().fg(DIM)),
            ]);
            f.render_widget(Paragraph::new(line), rect);
        }

        let anchor = self.menu.as_ref().and_then(|menu| {
            self.rows
                .iter()
                .find(|(_, id)| id == &menu.id)
                .map(|(row, _)| (*row, menu.selected))
        });
        if let Some((row, selected)) = anchor {
            let screen = f.area();
            self.render_menu(f, row, selected, screen);
        }
    }

    fn render_menu(&mut self, f: &mut Frame, row: Rect, selected: usize, screen: Rect) {
        let width = 12u16.min(row.width);
        let height = MenuEntry::ALL.len() as u16 + 2;
        let x = row.x + row.width.saturating_sub(width);
        let y = if row.y + 1 + height <= screen.height {
            row.y + 1
        } else {
            row.y.saturating_sub(height)
        };
        let menu_area = Rect::new(x, y, width, height).intersection(screen);

        f.render_widget(Clear, menu_area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(BORDER_ACTIVE))
            .style(Style::default().bg(SURFACE));
        let inner = block.inner(menu_area);
        f.render_widget(block, menu_area);

        for (i, entry) in MenuEntry::ALL.iter().enumerate() {
            if i as u16 >= inner.height {
                break;
            }
            let rect = Rect::new(inner.x, inner.y + i as u16, inner.width, 1);
            let fg = match entry {
                MenuEntry::Delete => RED,
                MenuEntry::Rename => TEXT,
            };
            let mut style = Style::default().fg(fg);
            if i == selected {
                style = style.bg(BORDER).add_modifier(Modifier::BOLD);
            }
            f.render_widget(
                Paragraph::new(Span::styled(format!(" {}", entry.label()), style)),
                rect,
            );
            self.menu_rows.push((rect, *entry));
        }
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else if max == 0 {
        String::new()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('\u{2026}');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, KeyEventKind::Press)
    }

    fn items() -> Vec<SidebarItem> {
        ["3", "2", "1"]
            .iter()
            .map(|id| SidebarItem {
                id: ChatId::from(*id),
                title: format!("Chat {id}"),
                active: *id == "3",
                awaiting: false,
            })
            .collect()
    }

    #[test]
    fn test_navigation_and_switch() {
        let items = items();
        let mut state = SidebarState::default();

        state.handle_key(key(KeyCode::Down), &items);
        state.handle_key(key(KeyCode::Down), &items);
        state.handle_key(key(KeyCode::Down), &items);
        assert_eq!(state.selected, 2);

        match state.handle_key(key(KeyCode::Enter), &items) {
            SidebarAction::Switch(id) => assert_eq!(id, ChatId::from("1")),
            _ => panic!("expected switch"),
        }
    }

    #[test]
    fn test_inline_rename_commits_on_enter() {
        let items = items();
        let mut state = SidebarState::default();

        state.handle_key(key(KeyCode::Char('r')), &items);
        assert!(state.editor.is_some());
        state.handle_key(key(KeyCode::Char('!')), &items);

        match state.handle_key(key(KeyCode::Enter), &items) {
            SidebarAction::Rename(id, title) => {
                assert_eq!(id, ChatId::from("3"));
                assert_eq!(title, "Chat 3!");
            }
            _ => panic!("expected rename"),
        }
        assert!(state.editor.is_none());
    }

    #[test]
    fn test_rename_commits_when_focus_leaves() {
        let items = items();
        let mut state = SidebarState::default();
        state.start_rename(ChatId::from("2"), "Chat 2");

        assert!(matches!(
            state.handle_key(key(KeyCode::Tab), &items),
            SidebarAction::Rename(_, _)
        ));
    }

    #[test]
    fn test_menu_delete() {
        let items = items();
        let mut state = SidebarState::default();
        state.selected = 1;

        state.handle_key(key(KeyCode::Char('m')), &items);
        assert!(state.menu.is_some());
        state.handle_key(key(KeyCode::Down), &items);

        match state.handle_key(key(KeyCode::Enter), &items) {
            SidebarAction::Delete(id) => assert_eq!(id, ChatId::from("2")),
            _ => panic!("expected delete"),
        }
        assert!(state.menu.is_none());
    }

    #[test]
    fn test_menu_rename_opens_editor() {
        let items = items();
        let mut state = SidebarState::default();
        state.handle_key(key(KeyCode::Char('m')), &items);

        assert!(matches!(
            state.handle_key(key(KeyCode::Enter), &items),
            SidebarAction::None
        ));
        let editor = state.editor.as_ref().unwrap();
        assert_eq!(editor.id, ChatId::from("3"));
        assert_eq!(editor.text(), "Chat 3");
    }

    #[test]
    fn test_other_key_dismisses_menu() {
        let items = items();
        let mut state = SidebarState::default();
        state.handle_key(key(KeyCode::Char('m')), &items);

        state.handle_key(key(KeyCode::Char('x')), &items);
        assert!(state.menu.is_none());
    }

    #[test]
    fn test_click_outside_dismisses_menu() {
        let items = items();
        let mut state = SidebarState::default();
        state.handle_key(key(KeyCode::Char('m')), &items);

        let action = state.handle_click(Position::new(200, 200), &items);
        assert!(matches!(action, SidebarAction::None));
        assert!(state.menu.is_none());
    }

    #[test]
    fn test_click_outside_commits_editor() {
        let items = items();
        let mut state = SidebarState::default();
        state.start_rename(ChatId::from("1"), "New name");

        match state.handle_click(Position::new(200, 200), &items) {
            SidebarAction::Rename(id, title) => {
                assert_eq!(id, ChatId::from("1"));
                assert_eq!(title, "New name");
            }
            _ => panic!("expected rename"),
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 6), "a lon\u{2026}");
        assert_eq!(truncate("abc", 0), "");
    }
}
