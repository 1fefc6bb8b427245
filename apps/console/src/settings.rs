use std::{fs, io, path::Path, time::Duration};

use anyhow::Context;
use list_query::ControllerConfig;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub bearer_token: Option<String>,
    pub controller: ControllerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".into(),
            bearer_token: None,
            controller: ControllerConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    token: Option<String>,
    controller: Option<ControllerConfig>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new("console.toml"), |name| std::env::var(name).ok())
}

/// Defaults, then `path` if it exists, then the environment.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse '{}'", path.display()))?;
            if let Some(v) = file_cfg.api_url {
                settings.api_url = v;
            }
            if let Some(v) = file_cfg.token {
                settings.bearer_token = Some(v);
            }
            if let Some(v) = file_cfg.controller {
                settings.controller = v;
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
    }

    if let Some(v) = env("LMS_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = env("APP__TOKEN") {
        settings.bearer_token = Some(v);
    }

    if let Some(v) = env("APP__QUIET_PERIOD_MS") {
        let millis: u64 = v
            .parse()
            .with_context(|| format!("APP__QUIET_PERIOD_MS must be milliseconds, got '{v}'"))?;
        settings.controller.quiet_period = Duration::from_millis(millis);
    }
    if let Some(v) = env("APP__PREFETCH_DEPTH") {
        settings.controller.prefetch_depth = v
            .parse()
            .with_context(|| format!("APP__PREFETCH_DEPTH must be a number, got '{v}'"))?;
    }

    Ok(settings)
}
