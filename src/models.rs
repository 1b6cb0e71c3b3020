use serde::{Deserialize, Serialize};

use crate::error::{Result, TipError};

/// Stable tip identifier, shared by every translation of the same tip.
pub type TipId = u32;

/// Per-OS shortcut text attached to a tip. Only `default` is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcuts {
    pub default: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<String>,
    #[serde(default, rename = "macOS", alias = "macos", skip_serializing_if = "Option::is_none")]
    pub macos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tip {
    pub id: Option<TipId>,
    pub title: String,
    pub content: String,
    pub shortcuts: Option<Shortcuts>,
    /// Contributor attribution, e.g. a GitHub handle.
    pub source: Option<String>,
}

impl Tip {
    pub fn placeholder() -> Self {
        Self {
            id: None,
            title: "Welcome to tipday".to_string(),
            content: "It seems we encountered an issue loading the tips. \
                      Check the tips directory in your configuration and try again."
                .to_string(),
            shortcuts: None,
            source: None,
        }
    }
}

/// Raw record as found in a tips file. Fields are optional so that a missing
/// title or body becomes a validation error instead of a parse error.
#[derive(Debug, Deserialize)]
pub struct RawTip {
    pub id: Option<TipId>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub shortcuts: Option<Shortcuts>,
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TipsFile {
    pub tips: Vec<RawTip>,
}

impl TipsFile {
    pub fn validate(self) -> Result<Vec<Tip>> {
        self.tips
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let title = non_empty(raw.title).ok_or(TipError::Validation { index, field: "title" })?;
                let content =
                    non_empty(raw.content).ok_or(TipError::Validation { index, field: "content" })?;
                Ok(Tip {
                    id: raw.id,
                    title,
                    content,
                    shortcuts: raw.shortcuts,
                    source: raw.source.filter(|s| !s.trim().is_empty()),
                })
            })
            .collect()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Ordered tips for one language. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipCollection {
    language: String,
    tips: Vec<Tip>,
}

impl TipCollection {
    pub fn new(language: impl Into<String>, tips: Vec<Tip>) -> Result<Self> {
        let language = language.into();
        if tips.is_empty() {
            return Err(TipError::EmptyCollection { language });
        }
        Ok(Self { language, tips })
    }

    pub fn placeholder(language: impl Into<String>) -> Self {
        Self { language: language.into(), tips: vec![Tip::placeholder()] }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn len(&self) -> usize {
        self.tips.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.tips.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tip> {
        self.tips.get(index)
    }

    pub fn get_or_first(&self, index: usize) -> &Tip {
        self.tips.get(index).unwrap_or(&self.tips[0])
    }

    pub fn position_of(&self, id: TipId) -> Option<usize> {
        self.tips.iter().position(|t| t.id == Some(id))
    }

    pub fn by_id(&self, id: TipId) -> Option<&Tip> {
        self.position_of(id).and_then(|i| self.tips.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tip> {
        self.tips.iter()
    }
}

/// Which view the panel is showing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Tip,
    Favorites,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// One-line message shown at the bottom of the panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, text: text.into() }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, text: text.into() }
    }
}
