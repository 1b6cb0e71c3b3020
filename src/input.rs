use anyhow::Result;
use chrono::Local;
use crossterm::event::KeyCode;

use crate::app::App;
use crate::models::View;
use crate::prefs::KeyValueStore;

/// Applies one key press. Returns `Ok(false)` when the panel should go away.
pub fn handle_key<S: KeyValueStore>(key: KeyCode, app: &mut App<S>) -> Result<bool> {
    let Some((view, picker_open)) = app.panel().map(|p| (p.view, p.language_picker.is_some())) else {
        return Ok(false);
    };

    // The picker overlay swallows every key while it is open.
    if picker_open {
        match key {
            KeyCode::Up | KeyCode::Char('k') => app.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => app.move_cursor(1),
            KeyCode::Enter => app.confirm_language(),
            KeyCode::Esc | KeyCode::Char('L') => app.cancel_language_picker(),
            KeyCode::Char('q') => return Ok(false),
            _ => {}
        }
        return Ok(true);
    }

    app.notice = None;
    match (view, key) {
        (_, KeyCode::Char('q')) => {
            app.close();
            return Ok(false);
        }
        (_, KeyCode::Char('L')) => app.open_language_picker(),
        (_, KeyCode::Char('d')) => app.dismiss_today(Local::now()),
        (_, KeyCode::Char('D')) => app.dismiss_forever(),

        (View::Tip, KeyCode::Right | KeyCode::Char('n') | KeyCode::Char('l')) => app.next(),
        (View::Tip, KeyCode::Left | KeyCode::Char('p') | KeyCode::Char('h')) => app.previous(),
        (View::Tip, KeyCode::Char('r') | KeyCode::Char(' ')) => app.random(),
        (View::Tip, KeyCode::Char('f')) => app.toggle_favorite(),
        (View::Tip, KeyCode::Char('v') | KeyCode::Tab) => app.show_favorites(),
        (View::Tip, KeyCode::Up | KeyCode::Char('k')) => app.scroll(-1),
        (View::Tip, KeyCode::Down | KeyCode::Char('j')) => app.scroll(1),
        (View::Tip, KeyCode::Esc) => app.close(),

        (View::Favorites, KeyCode::Up | KeyCode::Char('k')) => app.move_cursor(-1),
        (View::Favorites, KeyCode::Down | KeyCode::Char('j')) => app.move_cursor(1),
        (View::Favorites, KeyCode::Enter) => app.open_selected_favorite(),
        (View::Favorites, KeyCode::Char('x') | KeyCode::Delete) => app.remove_selected_favorite(),
        (View::Favorites, KeyCode::Esc | KeyCode::Tab | KeyCode::Char('t')) => {
            app.show(View::Tip);
        }
        _ => {}
    }
    Ok(app.is_open())
}
