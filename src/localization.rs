use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, TipError};

pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
    pub native_name: &'static str,
}

pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language { code: "en", name: "English", native_name: "English" },
    Language { code: "zh", name: "Chinese (Mandarin)", native_name: "中文" },
    Language { code: "hi", name: "Hindi", native_name: "हिन्दी" },
    Language { code: "es", name: "Spanish", native_name: "Español" },
    Language { code: "fr", name: "French", native_name: "Français" },
    Language { code: "ar", name: "Arabic", native_name: "العربية" },
    Language { code: "bn", name: "Bengali", native_name: "বাংলা" },
    Language { code: "pt", name: "Portuguese", native_name: "Português" },
    Language { code: "ru", name: "Russian", native_name: "Русский" },
    Language { code: "ja", name: "Japanese", native_name: "日本語" },
    Language { code: "he", name: "Hebrew", native_name: "עברית" },
];

// Language codes end up in file names, so keep them to a strict shape.
static CODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2,3}(-[A-Za-z0-9]{2,8})?$").expect("valid language regex"));

/// Normalizes `pt_BR` / `PT-br` to `pt-BR` and checks the result has a sane shape.
pub fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim().replace('_', "-");
    let mut parts = code.splitn(2, '-');
    let primary = parts.next()?.to_ascii_lowercase();
    let normalized = match parts.next() {
        Some(region) if region.len() == 2 => format!("{primary}-{}", region.to_ascii_uppercase()),
        Some(region) => format!("{primary}-{region}"),
        None => primary,
    };
    CODE_REGEX.is_match(&normalized).then_some(normalized)
}

pub fn find_language(code: &str) -> Option<&'static Language> {
    let code = normalize_code(code)?;
    let primary = code.split('-').next()?;
    SUPPORTED_LANGUAGES.iter().find(|l| l.code == primary)
}

/// Resolves a user supplied code to its normalized form, or fails with
/// `UnsupportedLanguage` when the primary subtag is not in the table.
pub fn resolve(code: &str) -> Result<String> {
    match (normalize_code(code), find_language(code)) {
        (Some(normalized), Some(_)) => Ok(normalized),
        _ => Err(TipError::UnsupportedLanguage { code: code.to_string() }),
    }
}

/// Locale fallback chain: `pt-BR` → `pt` → `en`.
pub fn fallback_chain(code: &str) -> Vec<String> {
    let mut chain = Vec::new();
    if let Some(code) = normalize_code(code) {
        if let Some((primary, _)) = code.split_once('-') {
            chain.push(code.clone());
            chain.push(primary.to_string());
        } else {
            chain.push(code);
        }
    }
    if !chain.iter().any(|c| c == DEFAULT_LANGUAGE) {
        chain.push(DEFAULT_LANGUAGE.to_string());
    }
    chain
}
