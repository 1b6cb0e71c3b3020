pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod loader;
pub mod localization;
pub mod models;
pub mod prefs;
pub mod schedule;
pub mod theme;
pub mod ui;

pub use engine::TipEngine;
pub use error::{Result, TipError};
