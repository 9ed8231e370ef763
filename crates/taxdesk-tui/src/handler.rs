use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::App;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.picker.is_some() {
        handle_picker(app, key).await;
    } else {
        handle_chat(app, key).await;
    }
}

async fn handle_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_picker(),
        KeyCode::Char('j') | KeyCode::Down => app.picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.picker_nav_up(),
        KeyCode::Enter => app.picker_confirm().await,
        _ => {}
    }
}

async fn handle_chat(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        // Upload an invoice
        KeyCode::Char('u') if ctrl => app.open_picker(),

        KeyCode::Enter => {
            // Submit is disabled while a question is outstanding
            if app.can_submit() || app.draft_input.trim_start().starts_with(':') {
                app.submit_draft().await;
            }
        }
        KeyCode::Esc => {
            app.clear_draft();
            app.status = None;
        }

        // Chat scrolling
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1) / 2),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1) / 2),

        // Draft editing
        KeyCode::Backspace => {
            if app.draft_cursor > 0 {
                app.draft_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.draft_input, app.draft_cursor);
                app.draft_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.draft_input.chars().count();
            if app.draft_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.draft_input, app.draft_cursor);
                app.draft_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.draft_cursor = app.draft_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.draft_input.chars().count();
            app.draft_cursor = (app.draft_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.draft_cursor = 0;
        }
        KeyCode::End => {
            app.draft_cursor = app.draft_input.chars().count();
        }
        KeyCode::Char(c) if !ctrl => {
            let byte_pos = char_to_byte_index(&app.draft_input, app.draft_cursor);
            app.draft_input.insert(byte_pos, c);
            app.draft_cursor += 1;
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(3),
        MouseEventKind::ScrollDown => app.scroll_down(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_char_to_byte_index_multibyte() {
        let s = "₹500 tax";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 1), '₹'.len_utf8());
        assert_eq!(char_to_byte_index(s, 100), s.len());
    }

    #[tokio::test]
    async fn test_typing_and_editing_the_draft() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = crate::app::tests_support::app_in(dir.path());

        for c in "GST₹".chars() {
            handle_chat(&mut app, key(KeyCode::Char(c))).await;
        }
        assert_eq!(app.draft_input, "GST₹");
        assert_eq!(app.draft_cursor, 4);

        handle_chat(&mut app, key(KeyCode::Backspace)).await;
        assert_eq!(app.draft_input, "GST");

        handle_chat(&mut app, key(KeyCode::Home)).await;
        handle_chat(&mut app, key(KeyCode::Delete)).await;
        assert_eq!(app.draft_input, "ST");
        assert_eq!(app.draft_cursor, 0);

        handle_chat(&mut app, key(KeyCode::Esc)).await;
        assert!(app.draft_input.is_empty());
    }

    #[tokio::test]
    async fn test_enter_on_blank_draft_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = crate::app::tests_support::app_in(dir.path());
        app.draft_input = "  ".to_string();

        handle_chat(&mut app, key(KeyCode::Enter)).await;
        assert!(app.query_task.is_none());
        assert!(app.store.is_empty());
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_from_picker() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = crate::app::tests_support::app_in(dir.path());
        app.open_picker();

        let mut ctrl_c = key(KeyCode::Char('c'));
        ctrl_c.modifiers = KeyModifiers::CONTROL;
        handle_key(&mut app, ctrl_c).await;
        assert!(app.should_quit);
    }
}
