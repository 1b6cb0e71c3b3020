use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, TipError};
use crate::localization::{fallback_chain, DEFAULT_LANGUAGE};
use crate::models::{TipCollection, TipsFile};

const BUILTIN_EN: &str = include_str!("../data/tips.json");
const BUILTIN_ES: &str = include_str!("../data/tips.es.json");

/// Anything that can produce the tip collection for a language.
pub trait TipSource {
    fn load_collection(&self, language: &str) -> Result<TipCollection>;
}

/// Loads tips from an optional directory of `tips.<code>.json` files, falling
/// back to the tips compiled into the binary.
#[derive(Debug, Clone, Default)]
pub struct TipLoader {
    tips_dir: Option<PathBuf>,
}

impl TipLoader {
    pub fn new(tips_dir: Option<PathBuf>) -> Self {
        Self { tips_dir }
    }

    pub fn tips_dir(&self) -> Option<&Path> {
        self.tips_dir.as_deref()
    }

    fn file_name(code: &str) -> String {
        if code == DEFAULT_LANGUAGE {
            "tips.json".to_string()
        } else {
            format!("tips.{code}.json")
        }
    }

    fn builtin(code: &str) -> Option<&'static str> {
        match code {
            "en" => Some(BUILTIN_EN),
            "es" => Some(BUILTIN_ES),
            _ => None,
        }
    }

    fn read_from_dir(&self, code: &str) -> Option<Result<String>> {
        let path = self.tips_dir.as_ref()?.join(Self::file_name(code));
        if !path.exists() {
            return None;
        }
        debug!(path = %path.display(), "reading tips file");
        Some(fs::read_to_string(&path).map_err(|e| TipError::Load {
            language: code.to_string(),
            details: format!("{}: {e}", path.display()),
        }))
    }
}

pub fn parse_collection(code: &str, json: &str) -> Result<TipCollection> {
    let file: TipsFile = serde_json::from_str(json).map_err(|e| TipError::Load {
        language: code.to_string(),
        details: format!("invalid tips file format: {e}"),
    })?;
    if file.tips.is_empty() {
        return Err(TipError::Load {
            language: code.to_string(),
            details: "tips file contains no tips".to_string(),
        });
    }
    TipCollection::new(code, file.validate()?)
}

impl TipSource for TipLoader {
    fn load_collection(&self, language: &str) -> Result<TipCollection> {
        for code in fallback_chain(language) {
            let content = match self.read_from_dir(&code) {
                Some(content) => content?,
                None => match Self::builtin(&code) {
                    Some(builtin) => builtin.to_string(),
                    None => continue,
                },
            };
            if code != language {
                warn!(requested = language, resolved = %code, "falling back to another locale");
            }
            return parse_collection(&code, &content);
        }
        Err(TipError::Load {
            language: language.to_string(),
            details: "no tips file for this language or any fallback".to_string(),
        })
    }
}
