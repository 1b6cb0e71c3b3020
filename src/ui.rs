use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    layout::{Constraint, Direction, Layout},
    style::{Modifier, Style},
    text::{Line, Span},
};

use crate::app::{App, Panel};
use crate::localization::SUPPORTED_LANGUAGES;
use crate::models::{Tip, View};
use crate::prefs::KeyValueStore;
use crate::theme::Theme;

const TIP_FOOTER: &str =
    "←/→ Prev/Next | r Random | f Favorite | v Favorites | L Language | d Dismiss today | D Dismiss forever | q Quit";
const FAVORITES_FOOTER: &str =
    "↑/↓ Select | <Enter> Open | x Remove | Esc Back | L Language | q Quit";

/// Renders the panel, if one is open.
pub fn render<S: KeyValueStore>(f: &mut Frame, app: &App<S>, theme: &Theme) {
    let Some(panel) = app.panel() else { return };

    let area = centered_rect(80, 80, f.area());
    f.render_widget(Clear, area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1), Constraint::Length(3)])
        .split(area);

    match panel.view {
        View::Tip => render_tip(f, app, panel, theme, chunks[0]),
        View::Favorites => render_favorites(f, app, panel, theme, chunks[0]),
    }

    if let Some(notice) = &app.notice {
        let line = Paragraph::new(notice.text.clone()).style(theme.notice(notice.level));
        f.render_widget(line, chunks[1]);
    }

    let footer_text = match panel.view {
        View::Tip => TIP_FOOTER,
        View::Favorites => FAVORITES_FOOTER,
    };
    let footer = Paragraph::new(footer_text)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true })
        .style(theme.footer);
    f.render_widget(footer, chunks[2]);

    if let Some(cursor) = panel.language_picker {
        render_language_picker(f, app.engine.language(), cursor, theme);
    }
}

fn tip_lines(tip: &Tip, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(tip.title.clone(), theme.tip_title)),
        Line::from(""),
    ];
    lines.extend(
        tip.content
            .lines()
            .map(|l| Line::from(Span::styled(l.to_owned(), Style::default().fg(theme.text)))),
    );
    if let Some(shortcuts) = &tip.shortcuts {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Shortcut: ", Style::default().fg(theme.text_secondary)),
            Span::styled(shortcuts.default.clone(), theme.shortcut),
        ]));
    }
    if let Some(source) = &tip.source {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!("Contributed by @{source}"), theme.source)));
    }
    lines
}

fn render_tip<S: KeyValueStore>(f: &mut Frame, app: &App<S>, panel: &Panel, theme: &Theme, area: Rect) {
    let engine = &app.engine;
    let star = if app.current_is_favorite() { "★ " } else { "" };
    let position = engine
        .current_index()
        .map(|i| format!(" {}/{} · {} ", i + 1, engine.collection().len(), engine.language()))
        .unwrap_or_default();

    let block = Block::default()
        .title(Line::from(vec![
            Span::styled(star, theme.favorite_star),
            Span::styled("💡 Tip of the Day 💡", theme.panel_title),
        ]))
        .title_bottom(Line::from(Span::styled(position, theme.position)).right_aligned())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border));

    let lines = engine.current_tip().map(|tip| tip_lines(tip, theme)).unwrap_or_default();
    let para = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((panel.scroll, 0));
    f.render_widget(para, area);
}

fn render_favorites<S: KeyValueStore>(
    f: &mut Frame,
    app: &App<S>,
    panel: &Panel,
    theme: &Theme,
    area: Rect,
) {
    let block = Block::default()
        .title(Span::styled("⭐ My Favorite Tips ⭐", theme.panel_title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border));

    if panel.favorites.is_empty() {
        let placeholder = Paragraph::new("No favorites yet. Press 'f' on a tip to add it here.")
            .block(block)
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.text_secondary));
        f.render_widget(placeholder, area);
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let items: Vec<ListItem> = panel
        .favorites
        .iter()
        .enumerate()
        .map(|(i, (_, tip))| {
            let selected = i == panel.favorites_cursor;
            let style = if selected {
                Style::default().fg(theme.selection_fg).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(theme.text)
            };
            ListItem::new(Line::from(Span::styled(tip.title.clone(), style)))
        })
        .collect();
    let mut state = ListState::default();
    state.select(Some(panel.favorites_cursor));
    let list = List::new(items).block(block).highlight_symbol("→ ");
    f.render_stateful_widget(list, columns[0], &mut state);

    if let Some((_, tip)) = panel.favorites.get(panel.favorites_cursor) {
        let preview = Paragraph::new(tip_lines(tip, theme))
            .block(
                Block::default()
                    .title(format!("Preview · {}", app.engine.language()))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(theme.text_secondary)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(preview, columns[1]);
    }
}

fn render_language_picker(f: &mut Frame, current: &str, cursor: usize, theme: &Theme) {
    let popup_area = centered_rect(40, 60, f.area());
    f.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = SUPPORTED_LANGUAGES
        .iter()
        .map(|lang| {
            let marker = if current.starts_with(lang.code) { "●" } else { " " };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{marker} ")),
                Span::styled(format!("{:<4}", lang.code), Style::default().fg(theme.text_secondary)),
                Span::raw(format!("{} ({})", lang.native_name, lang.name)),
            ]))
        })
        .collect();
    let mut state = ListState::default();
    state.select(Some(cursor));
    let list = List::new(items)
        .block(Block::default().title("Language").borders(Borders::ALL).style(theme.popup_border))
        .highlight_style(Style::default().fg(theme.selection_fg).add_modifier(Modifier::BOLD))
        .highlight_symbol("→");
    f.render_stateful_widget(list, popup_area, &mut state);
}

/// Carves a `percent_x` by `percent_y` box out of the middle of `area`.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);
    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(middle);
    center
}
