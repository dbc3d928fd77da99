use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use client_core::{Capabilities, ConsoleConfig};
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "qrac.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub enable_import: bool,
    pub enable_resend: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3000".into(),
            enable_import: true,
            enable_resend: true,
        }
    }
}

impl Settings {
    pub fn console_config(&self) -> ConsoleConfig {
        ConsoleConfig {
            base_url: self.api_url.clone(),
            capabilities: Capabilities {
                import: self.enable_import,
                resend: self.enable_resend,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    api_url: Option<String>,
    enable_import: Option<bool>,
    enable_resend: Option<bool>,
}

/// Defaults, then the config file, then the environment. An explicit `path` must exist; the
/// default `qrac.toml` is optional.
pub fn load_settings(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(file_cfg) = read_file_settings(path)? {
        if let Some(v) = file_cfg.api_url {
            settings.api_url = v;
        }
        if let Some(v) = file_cfg.enable_import {
            settings.enable_import = v;
        }
        if let Some(v) = file_cfg.enable_resend {
            settings.enable_resend = v;
        }
    }

    if let Some(v) = env("QRAC_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env_flag(&env, "QRAC_ENABLE_IMPORT") {
        settings.enable_import = v;
    }
    if let Some(v) = env_flag(&env, "QRAC_ENABLE_RESEND") {
        settings.enable_resend = v;
    }

    Ok(settings)
}

fn read_file_settings(path: Option<&Path>) -> anyhow::Result<Option<FileSettings>> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound && !required => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    };

    toml::from_str(&raw)
        .map(Some)
        .with_context(|| format!("failed to parse config file '{}'", path.display()))
}

fn env_flag(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = env(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(key, value = %raw, "ignoring unparseable boolean");
            None
        }
    }
}
