//! Configuration loading from `.env` files.

use std::{env, path::PathBuf};

use anyhow::{Context, Result};

/// Runtime settings derived from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root directory for all storage.
    pub store_root: PathBuf,
    /// HTTP bind address, e.g. `127.0.0.1:8090`.
    pub bind_http: String,
    /// WebSocket bind address, e.g. `127.0.0.1:8091`.
    pub bind_ws: String,
    /// The site's own host, used to recognize internal links when scoring.
    pub site_domain: String,
    /// Bearer token protecting the admin routes; unset disables them.
    pub admin_token: Option<String>,
    /// Chat-completions style endpoint for the text generator.
    pub ai_api_url: Option<String>,
    /// API key for the text generator.
    pub ai_api_key: Option<String>,
    /// Model name sent with every generation request.
    pub ai_model: String,
}

impl Settings {
    /// Load settings from the specified `.env` file.
    pub fn from_env(path: &str) -> Result<Self> {
        dotenvy::from_filename(path).context("reading env file")?;
        let store_root = PathBuf::from(env::var("STORE_ROOT")?);
        let bind_http = env::var("BIND_HTTP")?;
        let bind_ws = env::var("BIND_WS")?;
        let site_domain = env::var("SITE_DOMAIN").unwrap_or_default();
        let admin_token = non_empty(env::var("ADMIN_TOKEN").ok());
        let ai_api_url = non_empty(env::var("AI_API_URL").ok());
        let ai_api_key = non_empty(env::var("AI_API_KEY").ok());
        let ai_model =
            non_empty(env::var("AI_MODEL").ok()).unwrap_or_else(|| "gpt-4o-mini".into());
        Ok(Self {
            store_root,
            bind_http,
            bind_ws,
            site_domain,
            admin_token,
            ai_api_url,
            ai_api_key,
            ai_model,
        })
    }
}

/// Treat empty environment values as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Serializes tests that touch process environment variables.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
