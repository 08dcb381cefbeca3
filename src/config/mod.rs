//! Configuration module for kakeibo
//!
//! Handles loading and managing application settings from TOML files.

mod settings;

pub use settings::{
    AnalyzerSettings, CloudSettings, GeneralSettings, GraphSettings, LlmSettings, MailSettings,
    Settings,
};
