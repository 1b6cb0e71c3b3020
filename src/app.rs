use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::config::{save_user_setting, Settings};
use crate::engine::TipEngine;
use crate::error::TipError;
use crate::localization::SUPPORTED_LANGUAGES;
use crate::models::{Notice, Tip, TipId, View};
use crate::prefs::KeyValueStore;
use crate::schedule::{should_trigger, TriggerInput};

/// The one live display session. At most one exists per `App`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    pub view: View,
    pub scroll: u16,
    pub favorites: Vec<(TipId, Tip)>,
    pub favorites_cursor: usize,
    /// Cursor into `SUPPORTED_LANGUAGES` while the language picker is open.
    pub language_picker: Option<usize>,
}

impl Panel {
    fn new(view: View) -> Self {
        Self { view, scroll: 0, favorites: Vec::new(), favorites_cursor: 0, language_picker: None }
    }
}

pub struct App<S> {
    pub engine: TipEngine<S>,
    pub settings: Settings,
    pub notice: Option<Notice>,
    panel: Option<Panel>,
    write_back_settings: bool,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(engine: TipEngine<S>, settings: Settings) -> Self {
        Self { engine, settings, notice: None, panel: None, write_back_settings: false }
    }

    /// Mirror language and enabled changes into the user's config file.
    pub fn with_settings_write_back(mut self, enabled: bool) -> Self {
        self.write_back_settings = enabled;
        self
    }

    pub fn panel(&self) -> Option<&Panel> {
        self.panel.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.panel.is_some()
    }

    /// Opens the panel on `view`, or switches the already open panel to it.
    /// Returns true when a new panel was created.
    pub fn show(&mut self, view: View) -> bool {
        let created = self.panel.is_none();
        if created {
            self.panel = Some(Panel::new(view));
        } else {
            info!("panel already open, revealing it");
        }
        match view {
            View::Tip => {
                self.engine.ensure_current();
                self.show_tip_view();
            }
            View::Favorites => self.show_favorites(),
        }
        created
    }

    pub fn close(&mut self) {
        self.panel = None;
    }

    pub fn startup_due(&self, now: &DateTime<Local>) -> bool {
        let state = self.engine.state();
        let input = TriggerInput {
            frequency: self.settings.frequency,
            disabled: self.engine.is_disabled()
                || !self.settings.enabled
                || !self.settings.show_on_startup,
            not_before_hour: self.settings.startup_hour_local,
            last_shown_date: state.last_shown_date(),
            last_shown_at: state.last_shown_timestamp(),
        };
        let due = should_trigger(&input, now);
        info!(due, frequency = self.settings.frequency.label(), "startup check");
        due
    }

    /// Manual show: a fresh unseen tip, recorded as shown.
    pub fn show_random(&mut self, now: DateTime<Local>) {
        self.engine.select_random_unshown();
        self.engine.record_shown(now);
        self.show(View::Tip);
    }

    /// Startup show: whatever tip the engine settled on at initialization.
    pub fn show_current(&mut self, now: DateTime<Local>) {
        self.engine.ensure_current();
        self.engine.record_shown(now);
        self.show(View::Tip);
    }

    fn with_panel(&mut self, f: impl FnOnce(&mut Panel)) {
        if let Some(panel) = self.panel.as_mut() {
            f(panel);
        }
    }

    fn show_tip_view(&mut self) {
        self.with_panel(|p| {
            p.view = View::Tip;
            p.scroll = 0;
        });
    }

    pub fn next(&mut self) {
        self.engine.advance_next();
        self.show_tip_view();
    }

    pub fn previous(&mut self) {
        self.engine.advance_previous();
        self.show_tip_view();
    }

    pub fn random(&mut self) {
        self.engine.select_random_unshown();
        self.show_tip_view();
    }

    pub fn scroll(&mut self, delta: i32) {
        self.with_panel(|p| {
            p.scroll = if delta < 0 {
                p.scroll.saturating_sub(delta.unsigned_abs() as u16)
            } else {
                p.scroll.saturating_add(delta as u16)
            };
        });
    }

    pub fn toggle_favorite(&mut self) {
        let Some(id) = self.engine.current_tip().and_then(|t| t.id) else {
            self.notice = Some(Notice::warning("This tip cannot be saved as a favorite."));
            return;
        };
        self.notice = Some(if self.engine.toggle_favorite(id) {
            Notice::info("Added to favorites.")
        } else {
            Notice::info("Removed from favorites.")
        });
    }

    pub fn current_is_favorite(&self) -> bool {
        self.engine
            .current_tip()
            .and_then(|t| t.id)
            .is_some_and(|id| self.engine.is_favorite(id))
    }

    pub fn show_favorites(&mut self) {
        self.engine.mark_favorites_opened();
        let favorites = self.engine.favorite_tips();
        self.with_panel(|p| {
            p.view = View::Favorites;
            p.favorites_cursor = p.favorites_cursor.min(favorites.len().saturating_sub(1));
            p.favorites = favorites;
        });
    }

    pub fn move_cursor(&mut self, delta: i32) {
        self.with_panel(|p| match p.language_picker {
            Some(cursor) => {
                p.language_picker = Some(step(cursor, delta, SUPPORTED_LANGUAGES.len()));
            }
            None => {
                p.favorites_cursor = step(p.favorites_cursor, delta, p.favorites.len());
            }
        });
    }

    fn selected_favorite(&self) -> Option<TipId> {
        let panel = self.panel.as_ref()?;
        panel.favorites.get(panel.favorites_cursor).map(|(id, _)| *id)
    }

    pub fn open_selected_favorite(&mut self) {
        let Some(id) = self.selected_favorite() else { return };
        if self.engine.open_favorite(id).is_some() {
            self.show_tip_view();
        } else {
            self.notice = Some(Notice::warning(
                "This tip is no longer available and has been removed from your favorites.",
            ));
            self.show_favorites();
        }
    }

    pub fn remove_selected_favorite(&mut self) {
        let Some(id) = self.selected_favorite() else { return };
        self.engine.remove_favorite(id);
        self.show_favorites();
    }

    pub fn open_language_picker(&mut self) {
        let current = SUPPORTED_LANGUAGES
            .iter()
            .position(|l| self.engine.language().starts_with(l.code))
            .unwrap_or(0);
        self.with_panel(|p| p.language_picker = Some(current));
    }

    pub fn cancel_language_picker(&mut self) {
        self.with_panel(|p| p.language_picker = None);
    }

    pub fn confirm_language(&mut self) {
        let Some(cursor) = self.panel.as_ref().and_then(|p| p.language_picker) else { return };
        self.cancel_language_picker();
        if let Some(language) = SUPPORTED_LANGUAGES.get(cursor) {
            self.change_language(language.code);
        }
    }

    pub fn change_language(&mut self, code: &str) {
        match self.engine.change_language(code) {
            Err(err) => self.notice = Some(Notice::warning(err.to_string())),
            Ok(load_error) => {
                self.settings.language = self.engine.language().to_string();
                self.write_setting("language", toml::Value::String(self.settings.language.clone()));
                self.notice = Some(match load_error {
                    Some(err) => Notice::error(err.to_string()),
                    None => Notice::info(format!("Language: {}", self.engine.language())),
                });
                if self.panel.as_ref().is_some_and(|p| p.view == View::Favorites) {
                    self.show_favorites();
                } else {
                    self.show_tip_view();
                }
            }
        }
    }

    pub fn dismiss_today(&mut self, now: DateTime<Local>) {
        self.engine.dismiss_for_today(now);
        self.close();
    }

    pub fn dismiss_forever(&mut self) {
        self.engine.dismiss_forever();
        self.settings.enabled = false;
        self.write_setting("enabled", toml::Value::Boolean(false));
        self.close();
    }

    pub fn enable(&mut self) {
        self.engine.enable();
        self.settings.enabled = true;
        self.write_setting("enabled", toml::Value::Boolean(true));
    }

    pub fn report(&mut self, err: &TipError) {
        self.notice = Some(Notice::error(err.to_string()));
    }

    fn write_setting(&self, key: &str, value: toml::Value) {
        if !self.write_back_settings {
            return;
        }
        if let Err(err) = save_user_setting(key, value) {
            warn!(key, error = %err, "could not update user config");
        }
    }
}

fn step(cursor: usize, delta: i32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    if delta < 0 {
        cursor.saturating_sub(delta.unsigned_abs() as usize)
    } else {
        (cursor + delta as usize).min(len - 1)
    }
}
