use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Rows moved per mouse wheel notch
const WHEEL_STEP: i32 = 3;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => {
            if app.input_mode == InputMode::Editing {
                insert_text(app, &text.replace("\r\n", "\n").replace('\r', "\n"));
            }
        }
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('l') => {
                app.clear_chat();
                return;
            }
            KeyCode::Char('t') => {
                app.toggle_theme();
                return;
            }
            _ => {}
        }
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn half_page(app: &App) -> i32 {
    (app.view.viewport_height() / 2).max(1) as i32
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Back to typing
        KeyCode::Char('i') | KeyCode::Char('a') | KeyCode::Enter | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
            app.input_cursor = app.input.chars().count();
        }

        // Half-page scroll (before plain 'd'/'u' would match anything)
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.view.scroll_by(half_page(app));
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.view.scroll_by(-half_page(app));
        }
        KeyCode::PageDown => app.view.scroll_by(half_page(app)),
        KeyCode::PageUp => app.view.scroll_by(-half_page(app)),

        KeyCode::Char('j') | KeyCode::Down => app.view.scroll_by(1),
        KeyCode::Char('k') | KeyCode::Up => app.view.scroll_by(-1),
        KeyCode::Char('g') | KeyCode::Home => app.view.scroll_to_top(),
        KeyCode::Char('G') | KeyCode::End => app.view.jump_to_bottom(),

        // Code blocks
        KeyCode::Char('[') => app.select_code_block(false),
        KeyCode::Char(']') => app.select_code_block(true),
        KeyCode::Char('y') => {
            app.copy_code_block();
        }

        KeyCode::Char('t') => app.toggle_theme(),

        // Suggested prompts on the welcome screen
        KeyCode::Char(c @ '1'..='4') => {
            if let Some(index) = c.to_digit(10) {
                app.use_suggested_prompt(index as usize - 1);
            }
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            if key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) {
                insert_text(app, "\n");
            } else {
                app.submit();
            }
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }

        // The transcript stays scrollable while typing
        KeyCode::Up => app.view.scroll_by(-1),
        KeyCode::Down => app.view.scroll_by(1),
        KeyCode::PageUp => app.view.scroll_by(-half_page(app)),
        KeyCode::PageDown => app.view.scroll_by(half_page(app)),

        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let mut buf = [0u8; 4];
            insert_text(app, c.encode_utf8(&mut buf));
        }
        _ => {}
    }
}

fn insert_text(app: &mut App, text: &str) {
    let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
    app.input.insert_str(byte_pos, text);
    app.input_cursor += text.chars().count();
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let on_jump = app.jump_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown if in_chat => app.view.scroll_by(WHEEL_STEP),
        MouseEventKind::ScrollUp if in_chat => app.view.scroll_by(-WHEEL_STEP),
        MouseEventKind::Down(MouseButton::Left) if on_jump => app.view.jump_to_bottom(),
        _ => {}
    }
}
