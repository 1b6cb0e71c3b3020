use chrono::{DateTime, Local, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::error::{Result, TipError};
use crate::loader::TipSource;
use crate::localization;
use crate::models::{Tip, TipCollection, TipId};
use crate::prefs::{KeyValueStore, TipState};
use crate::schedule::{is_new_period, today_local};

/// Owns which tip is showing, the shown history and the favorites.
///
/// `current` is `None` until the first `initialize`; afterwards it is always a
/// valid index into `tips`.
pub struct TipEngine<S> {
    source: Box<dyn TipSource>,
    state: TipState<S>,
    tips: TipCollection,
    language: String,
    current: Option<usize>,
    history: Vec<usize>,
    favorites: Vec<TipId>,
    rng: StdRng,
    /// Local day selections are stamped with.
    today: NaiveDate,
}

impl<S: KeyValueStore> TipEngine<S> {
    pub fn new(source: Box<dyn TipSource>, state: TipState<S>, language: &str) -> Self {
        let favorites = state.favorites();
        Self {
            source,
            state,
            tips: TipCollection::placeholder(language),
            language: language.to_string(),
            current: None,
            history: Vec::new(),
            favorites,
            rng: StdRng::from_os_rng(),
            today: today_local(),
        }
    }

    /// Replaces the random source, for reproducible selection.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Loads the collection for the engine's language and initializes the
    /// selection from the persisted state. A loader failure degrades to the
    /// placeholder tip and is handed back for the caller to report.
    pub fn start(&mut self, today: NaiveDate) -> Option<TipError> {
        let error = self.restore(today);
        self.ensure_current();
        error
    }

    /// Like `start`, but never picks a tip: the persisted selection is resumed
    /// when it was made today, otherwise the engine stays uninitialized until
    /// something selects. Nothing is written.
    pub fn restore(&mut self, today: NaiveDate) -> Option<TipError> {
        self.today = today;
        let language = self.language.clone();
        let (collection, error) = self.load_or_placeholder(&language);
        self.adopt(collection);
        self.current = match self.state.last_index() {
            Some(index) if index < self.tips.len() && !self.is_new_period() => {
                debug!(index, "resuming at restored tip");
                Some(index)
            }
            _ => None,
        };
        error
    }

    /// Selects a fresh tip if none is current yet.
    pub fn ensure_current(&mut self) -> &Tip {
        if self.current.is_none() {
            self.select_random_unshown();
        }
        self.current_or_first()
    }

    /// The day has turned over unless a tip was shown or chosen today.
    fn is_new_period(&self) -> bool {
        is_new_period(self.state.last_shown_date(), self.today)
            && is_new_period(self.state.last_selected_date(), self.today)
    }

    fn load_or_placeholder(&self, language: &str) -> (TipCollection, Option<TipError>) {
        match self.source.load_collection(language) {
            Ok(collection) => (collection, None),
            Err(err) => {
                warn!(language, error = %err, "using placeholder tip");
                (TipCollection::placeholder(language), Some(err))
            }
        }
    }

    /// Resumes at `restored` when it is in range and the day has not turned
    /// over, otherwise picks a fresh tip.
    pub fn initialize(
        &mut self,
        collection: TipCollection,
        restored: Option<usize>,
        is_new_period: bool,
    ) -> &Tip {
        self.adopt(collection);
        let len = self.tips.len();
        match restored {
            Some(index) if index < len && !is_new_period => {
                debug!(index, "resuming at restored tip");
                self.set_current(index);
            }
            _ => {
                self.current = None;
                self.select_random_unshown();
            }
        }
        self.current_or_first()
    }

    fn adopt(&mut self, collection: TipCollection) {
        let len = collection.len();
        self.tips = collection;
        let mut history = self.state.shown_history();
        history.retain(|&i| i < len);
        dedup_keep_first(&mut history);
        self.history = history;
    }

    pub fn collection(&self) -> &TipCollection {
        &self.tips
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_tip(&self) -> Option<&Tip> {
        self.current.and_then(|i| self.tips.get(i))
    }

    pub fn history(&self) -> &[usize] {
        &self.history
    }

    pub fn state(&self) -> &TipState<S> {
        &self.state
    }

    fn current_or_first(&self) -> &Tip {
        self.tips.get_or_first(self.current.unwrap_or(0))
    }

    fn set_current(&mut self, index: usize) {
        self.current = Some(index);
        let result = self.state.set_last_index(index);
        log_failed_write("last tip index", result);
        if self.state.last_selected_date() != Some(self.today) {
            let result = self.state.set_last_selected_date(self.today);
            log_failed_write("last selected date", result);
        }
    }

    /// Circular step forward. Leaves the shown history alone.
    pub fn advance_next(&mut self) -> &Tip {
        let len = self.tips.len();
        let next = match self.current {
            Some(i) => (i + 1) % len,
            None => 0,
        };
        if self.current != Some(next) {
            self.set_current(next);
        }
        self.current_or_first()
    }

    /// Circular step backward.
    pub fn advance_previous(&mut self) -> &Tip {
        let len = self.tips.len();
        let previous = match self.current {
            Some(i) => (i + len - 1) % len,
            None => len - 1,
        };
        if self.current != Some(previous) {
            self.set_current(previous);
        }
        self.current_or_first()
    }

    /// Picks uniformly among the tips not in the shown history. Once every tip
    /// has been shown the history starts over.
    pub fn select_random_unshown(&mut self) -> &Tip {
        let len = self.tips.len();
        if len == 1 {
            if self.current.is_none() {
                self.set_current(0);
            }
            return self.current_or_first();
        }

        let mut available: Vec<usize> = (0..len).filter(|i| !self.history.contains(i)).collect();
        if available.is_empty() {
            info!(shown = self.history.len(), "every tip shown, starting a new round");
            self.history.clear();
            available = (0..len).collect();
        }

        let pick = available[self.rng.random_range(0..available.len())];
        self.history.insert(0, pick);
        let result = self.state.set_shown_history(&self.history);
        log_failed_write("shown history", result);
        self.set_current(pick);
        debug!(index = pick, remaining = available.len() - 1, "selected tip");
        self.current_or_first()
    }

    pub fn is_at_first(&self) -> bool {
        self.current == Some(0)
    }

    pub fn is_at_last(&self) -> bool {
        self.current == Some(self.tips.len() - 1)
    }

    /// Switches to another language. Unsupported codes leave everything as it
    /// was. The displayed tip survives the switch when its stable id exists in
    /// the new collection; otherwise a fresh tip is selected.
    ///
    /// Returns the loader error, if the new collection had to fall back to the
    /// placeholder.
    pub fn change_language(&mut self, code: &str) -> Result<Option<TipError>> {
        let code = localization::resolve(code)?;
        if code == self.language && self.current.is_some() {
            return Ok(None);
        }

        let (collection, error) = self.load_or_placeholder(&code);
        let carried = self
            .current_tip()
            .and_then(|tip| tip.id)
            .and_then(|id| collection.position_of(id));
        info!(from = %self.language, to = %code, tips = collection.len(), "language changed");

        self.tips = collection;
        self.language = code;
        log_failed_write("language", self.state.set_language(&self.language));
        self.history.clear();
        log_failed_write("shown history", self.state.set_shown_history(&[]));

        match carried {
            Some(index) => self.set_current(index),
            None => {
                self.current = None;
                self.select_random_unshown();
            }
        }
        Ok(error)
    }

    /// Returns whether `id` is a favorite after the toggle.
    pub fn toggle_favorite(&mut self, id: TipId) -> bool {
        let now_favorite = if let Some(pos) = self.favorites.iter().position(|&f| f == id) {
            self.favorites.remove(pos);
            false
        } else {
            self.favorites.push(id);
            true
        };
        log_failed_write("favorites", self.state.set_favorites(&self.favorites));
        now_favorite
    }

    pub fn is_favorite(&self, id: TipId) -> bool {
        self.favorites.contains(&id)
    }

    pub fn remove_favorite(&mut self, id: TipId) {
        if self.is_favorite(id) {
            self.toggle_favorite(id);
        }
    }

    /// Favorites resolved against the current collection, in the order they were
    /// added. Ids that no longer resolve are dropped from the stored list.
    pub fn favorite_tips(&mut self) -> Vec<(TipId, Tip)> {
        let before = self.favorites.len();
        let tips = &self.tips;
        self.favorites.retain(|&id| tips.position_of(id).is_some());
        if self.favorites.len() != before {
            info!(pruned = before - self.favorites.len(), "removed favorites that no longer exist");
            log_failed_write("favorites", self.state.set_favorites(&self.favorites));
        }
        self.favorites
            .iter()
            .filter_map(|&id| self.tips.by_id(id).map(|tip| (id, tip.clone())))
            .collect()
    }

    /// Makes the favorite with `id` the current tip. A favorite that no longer
    /// exists is removed and `None` is returned.
    pub fn open_favorite(&mut self, id: TipId) -> Option<&Tip> {
        match self.tips.position_of(id) {
            Some(index) => {
                self.set_current(index);
                self.current_tip()
            }
            None => {
                warn!(id, "favorite no longer available");
                self.remove_favorite(id);
                None
            }
        }
    }

    pub fn record_shown(&mut self, now: DateTime<Local>) {
        log_failed_write("last shown date", self.state.set_last_shown_date(now.date_naive()));
        log_failed_write("last shown timestamp", self.state.set_last_shown_timestamp(now.to_utc()));
    }

    pub fn dismiss_for_today(&mut self, now: DateTime<Local>) {
        info!("dismissed for today");
        self.record_shown(now);
    }

    pub fn dismiss_forever(&mut self) {
        info!("dismissed permanently");
        log_failed_write("disabled flag", self.state.set_disabled(true));
    }

    pub fn enable(&mut self) {
        log_failed_write("disabled flag", self.state.set_disabled(false));
    }

    pub fn is_disabled(&self) -> bool {
        self.state.is_disabled()
    }

    pub fn mark_favorites_opened(&mut self) {
        if !self.state.has_opened_favorites() {
            log_failed_write("favorites opened", self.state.set_has_opened_favorites(true));
        }
    }

    /// Forgets everything persisted; the selection goes back to uninitialized.
    pub fn reset(&mut self) -> Result<()> {
        self.state.clear_state()?;
        self.history.clear();
        self.favorites.clear();
        self.current = None;
        Ok(())
    }
}

fn dedup_keep_first(history: &mut Vec<usize>) {
    let mut seen = Vec::with_capacity(history.len());
    history.retain(|i| {
        if seen.contains(i) {
            false
        } else {
            seen.push(*i);
            true
        }
    });
}

fn log_failed_write(what: &str, result: Result<()>) {
    if let Err(err) = result {
        warn!(error = %err, "could not persist {what}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tip;
    use crate::prefs::MemoryStore;
    use std::collections::HashMap;

    struct FakeSource(HashMap<String, TipCollection>);

    impl TipSource for FakeSource {
        fn load_collection(&self, language: &str) -> Result<TipCollection> {
            self.0.get(language).cloned().ok_or_else(|| TipError::Load {
                language: language.to_string(),
                details: "missing".to_string(),
            })
        }
    }

    fn tips(prefix: &str, ids: &[TipId]) -> Vec<Tip> {
        ids.iter()
            .map(|&id| Tip {
                id: Some(id),
                title: format!("{prefix} {id}"),
                content: format!("{prefix} body {id}"),
                shortcuts: None,
                source: None,
            })
            .collect()
    }

    fn collection(lang: &str, ids: &[TipId]) -> TipCollection {
        TipCollection::new(lang, tips(lang, ids)).unwrap()
    }

    fn engine_with(store: MemoryStore, collections: &[(&str, &[TipId])]) -> TipEngine<MemoryStore> {
        let map = collections
            .iter()
            .map(|(lang, ids)| (lang.to_string(), collection(lang, ids)))
            .collect();
        TipEngine::new(Box::new(FakeSource(map)), TipState::new(store), "en")
            .with_rng(StdRng::seed_from_u64(7))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    #[test]
    fn next_wraps_to_first() {
        let mut engine = engine_with(MemoryStore::new(), &[]);
        engine.initialize(collection("en", &[0, 1, 2]), Some(2), false);
        assert!(engine.is_at_last());
        let tip = engine.advance_next().clone();
        assert_eq!(engine.current_index(), Some(0));
        assert_eq!(tip.title, "en 0");
        assert!(engine.is_at_first());
        assert_eq!(engine.state().last_index(), Some(0));
    }

    #[test]
    fn previous_wraps_to_last() {
        let mut engine = engine_with(MemoryStore::new(), &[]);
        engine.initialize(collection("en", &[0, 1, 2]), Some(0), false);
        engine.advance_previous();
        assert_eq!(engine.current_index(), Some(2));
    }

    #[test]
    fn navigation_does_not_touch_history() {
        let mut engine = engine_with(MemoryStore::new(), &[]);
        engine.initialize(collection("en", &[0, 1, 2, 3]), Some(1), false);
        engine.advance_next();
        engine.advance_previous();
        assert!(engine.history().is_empty());
    }

    #[test]
    fn single_tip_is_a_fixed_point() {
        let mut engine = engine_with(MemoryStore::new(), &[]);
        engine.initialize(collection("en", &[5]), None, true);
        for _ in 0..3 {
            assert_eq!(engine.advance_next().id, Some(5));
            assert_eq!(engine.advance_previous().id, Some(5));
            assert_eq!(engine.select_random_unshown().id, Some(5));
        }
        assert_eq!(engine.current_index(), Some(0));
    }

    #[test]
    fn restored_index_is_used_within_the_same_day() {
        let mut engine = engine_with(MemoryStore::new(), &[]);
        engine.initialize(collection("en", &[0, 1, 2, 3]), Some(3), false);
        assert_eq!(engine.current_index(), Some(3));
        assert!(engine.history().is_empty());
    }

    #[test]
    fn new_day_or_stale_index_selects_fresh() {
        let mut engine = engine_with(MemoryStore::new(), &[]);
        engine.initialize(collection("en", &[0, 1, 2, 3]), Some(3), true);
        assert_eq!(engine.history().len(), 1);

        let mut engine = engine_with(MemoryStore::new(), &[]);
        engine.initialize(collection("en", &[0, 1]), Some(9), false);
        assert!(engine.current_index().is_some_and(|i| i < 2));
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn random_never_repeats_until_exhausted() {
        let mut engine = engine_with(MemoryStore::new(), &[]);
        engine.initialize(collection("en", &[0, 1, 2, 3, 4]), None, true);
        for _ in 0..4 {
            engine.select_random_unshown();
        }
        let mut seen = engine.history().to_vec();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(engine.history()[0], engine.current_index().unwrap());
    }

    #[test]
    fn exhausted_history_rolls_over() {
        let mut store = MemoryStore::new();
        TipState::new(&mut store).set_shown_history(&[0, 1, 2]).unwrap();
        let mut engine = engine_with(store, &[]);
        engine.initialize(collection("en", &[0, 1, 2]), Some(0), false);
        assert_eq!(engine.history(), &[0, 1, 2]);

        engine.select_random_unshown();
        let picked = engine.current_index().unwrap();
        assert!(picked < 3);
        assert_eq!(engine.history(), &[picked]);
        assert_eq!(engine.state().shown_history(), vec![picked]);
    }

    #[test]
    fn stored_history_is_clamped_to_the_collection() {
        let mut store = MemoryStore::new();
        TipState::new(&mut store).set_shown_history(&[7, 1, 1, 0]).unwrap();
        let mut engine = engine_with(store, &[]);
        engine.initialize(collection("en", &[0, 1, 2]), Some(0), false);
        assert_eq!(engine.history(), &[1, 0]);
        engine.select_random_unshown();
        assert_eq!(engine.current_index(), Some(2));
    }

    #[test]
    fn start_falls_back_to_placeholder() {
        let mut engine = engine_with(MemoryStore::new(), &[]);
        let err = engine.start(today());
        assert!(matches!(err, Some(TipError::Load { .. })));
        assert_eq!(engine.collection().len(), 1);
        assert_eq!(engine.current_tip(), Some(&Tip::placeholder()));
    }

    #[test]
    fn start_resumes_same_day() {
        let mut store = MemoryStore::new();
        {
            let mut state = TipState::new(&mut store);
            state.set_last_index(2).unwrap();
            state.set_last_shown_date(today()).unwrap();
        }
        let mut engine = engine_with(store, &[("en", &[10, 11, 12, 13])]);
        assert!(engine.start(today()).is_none());
        assert_eq!(engine.current_index(), Some(2));
    }

    #[test]
    fn restore_leaves_a_new_day_unselected() {
        let mut engine = engine_with(MemoryStore::new(), &[("en", &[1, 2, 3])]);
        assert!(engine.restore(today()).is_none());
        assert_eq!(engine.current_index(), None);
        assert_eq!(engine.state().store().keys().count(), 0);

        engine.ensure_current();
        assert!(engine.current_index().is_some());
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.state().last_selected_date(), Some(today()));
    }

    #[test]
    fn selection_without_show_counts_for_the_day() {
        let mut store = MemoryStore::new();
        {
            let mut state = TipState::new(&mut store);
            state.set_last_index(1).unwrap();
            state.set_last_selected_date(today()).unwrap();
        }
        let mut engine = engine_with(store, &[("en", &[10, 11, 12])]);
        engine.restore(today());
        assert_eq!(engine.current_index(), Some(1));
        assert!(engine.state().shown_history().is_empty());
    }

    #[test]
    fn language_switch_keeps_tip_by_id() {
        let mut engine = engine_with(MemoryStore::new(), &[("en", &[1, 2, 3, 4]), ("es", &[4, 1])]);
        engine.start(today());
        engine.open_favorite(4);
        assert_eq!(engine.change_language("es").unwrap().map(|e| e.to_string()), None);
        assert_eq!(engine.language(), "es");
        assert_eq!(engine.current_index(), Some(0));
        assert_eq!(engine.current_tip().unwrap().title, "es 4");
        assert_eq!(engine.state().language().as_deref(), Some("es"));
    }

    #[test]
    fn language_switch_recomputes_stale_index() {
        let mut engine = engine_with(MemoryStore::new(), &[("en", &[1, 2, 3, 4, 5]), ("es", &[8, 9])]);
        engine.start(today());
        engine.initialize(collection("en", &[1, 2, 3, 4, 5]), Some(4), false);
        engine.change_language("es").unwrap();
        assert!(engine.current_index().is_some_and(|i| i < 2));
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn unsupported_language_changes_nothing() {
        let mut engine = engine_with(MemoryStore::new(), &[("en", &[1, 2, 3])]);
        engine.start(today());
        let before = engine.current_index();
        let err = engine.change_language("klingon").unwrap_err();
        assert!(matches!(err, TipError::UnsupportedLanguage { .. }));
        assert_eq!(engine.language(), "en");
        assert_eq!(engine.current_index(), before);
        assert_eq!(engine.collection().len(), 3);
    }

    #[test]
    fn supported_language_without_tips_uses_placeholder() {
        let mut engine = engine_with(MemoryStore::new(), &[("en", &[1, 2, 3])]);
        engine.start(today());
        let err = engine.change_language("fr").unwrap();
        assert!(err.is_some());
        assert_eq!(engine.language(), "fr");
        assert_eq!(engine.current_tip(), Some(&Tip::placeholder()));
    }

    #[test]
    fn favorites_toggle_twice_restores() {
        let mut engine = engine_with(MemoryStore::new(), &[("en", &[1, 2, 3])]);
        engine.start(today());
        assert!(!engine.is_favorite(2));
        assert!(engine.toggle_favorite(2));
        assert!(engine.is_favorite(2));
        assert!(!engine.toggle_favorite(2));
        assert!(!engine.is_favorite(2));
        assert!(engine.state().favorites().is_empty());
    }

    #[test]
    fn missing_favorites_are_pruned() {
        let mut engine = engine_with(MemoryStore::new(), &[("en", &[1, 2, 3]), ("es", &[1])]);
        engine.start(today());
        engine.toggle_favorite(3);
        engine.toggle_favorite(1);
        engine.change_language("es").unwrap();

        let favorites = engine.favorite_tips();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].0, 1);
        assert_eq!(engine.state().favorites(), vec![1]);
    }

    #[test]
    fn opening_a_missing_favorite_removes_it() {
        let mut engine = engine_with(MemoryStore::new(), &[("en", &[1, 2])]);
        engine.start(today());
        engine.toggle_favorite(40);
        assert!(engine.open_favorite(40).is_none());
        assert!(!engine.is_favorite(40));
        assert_eq!(engine.open_favorite(2).and_then(|t| t.id), Some(2));
        assert_eq!(engine.current_index(), Some(1));
    }

    #[test]
    fn failing_store_does_not_break_navigation() {
        let mut store = MemoryStore::new();
        store.fail_writes = true;
        let mut engine = engine_with(store, &[("en", &[1, 2, 3])]);
        engine.start(today());
        engine.advance_next();
        engine.select_random_unshown();
        engine.toggle_favorite(1);
        assert!(engine.is_favorite(1));
        assert!(engine.current_index().is_some());
        assert_eq!(engine.state().last_index(), None);
    }

    #[test]
    fn dismiss_and_reset() {
        let mut engine = engine_with(MemoryStore::new(), &[("en", &[1, 2])]);
        engine.start(today());
        engine.dismiss_forever();
        assert!(engine.is_disabled());
        engine.enable();
        assert!(!engine.is_disabled());

        let now = Local::now();
        engine.dismiss_for_today(now);
        assert_eq!(engine.state().last_shown_date(), Some(now.date_naive()));
        engine.reset().unwrap();
        assert_eq!(engine.state().last_shown_date(), None);
        assert_eq!(engine.current_index(), None);
    }
}
