use ratatui::style::{Color, Modifier, Style};

use crate::models::NoticeLevel;

pub struct Theme {
    pub border: Color,
    pub text: Color,
    pub text_secondary: Color,
    pub selection_fg: Color,

    // Specific components
    pub panel_title: Style,
    pub tip_title: Style,
    pub shortcut: Style,
    pub source: Style,
    pub favorite_star: Style,
    pub position: Style,
    pub footer: Style,
    pub popup_border: Style,
    pub notice_info: Style,
    pub notice_warning: Style,
    pub notice_error: Style,
}

impl Theme {
    pub fn notice(&self, level: NoticeLevel) -> Style {
        match level {
            NoticeLevel::Info => self.notice_info,
            NoticeLevel::Warning => self.notice_warning,
            NoticeLevel::Error => self.notice_error,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            border: Color::Rgb(255, 215, 0),
            text: Color::White,
            text_secondary: Color::Gray,
            selection_fg: Color::Yellow,

            panel_title: Style::default().fg(Color::Rgb(255, 215, 0)).add_modifier(Modifier::BOLD),
            tip_title: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            shortcut: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            source: Style::default().fg(Color::Green).add_modifier(Modifier::ITALIC),
            favorite_star: Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            position: Style::default().fg(Color::DarkGray),
            footer: Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
            popup_border: Style::default().fg(Color::Magenta).bg(Color::Black),
            notice_info: Style::default().fg(Color::Green),
            notice_warning: Style::default().fg(Color::Yellow),
            notice_error: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        }
    }
}
