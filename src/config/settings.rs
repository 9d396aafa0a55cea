//! Settings read once from the process environment (and `.env`, if present).

use crate::client::ClientConfig;
use crate::service::upload::UploadConfig;
use std::path::PathBuf;

pub const API_BASE_URL_VAR: &str = "API_BASE_URL";
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
pub const UPLOAD_FOLDER_VAR: &str = "TRENCHER_UPLOAD_FOLDER";

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_UPLOAD_FOLDER: &str = "public/uploads";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrencherConfig {
    /// Base URL prepended to client routes. `None` yields root-relative URLs.
    pub api_base_url: Option<String>,
    /// `EnvFilter` directive, e.g. `info` or `trencher=debug`.
    pub log_level: String,
    pub upload_folder: PathBuf,
}

impl Default for TrencherConfig {
    fn default() -> Self {
        TrencherConfig {
            api_base_url: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            upload_folder: PathBuf::from(DEFAULT_UPLOAD_FOLDER),
        }
    }
}

impl TrencherConfig {
    /// Loads `.env` (missing file is fine) and reads the Trencher variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = TrencherConfig::default();
        TrencherConfig {
            api_base_url: read(API_BASE_URL_VAR),
            log_level: read(LOG_LEVEL_VAR).unwrap_or(defaults.log_level),
            upload_folder: read(UPLOAD_FOLDER_VAR).map(PathBuf::from).unwrap_or(defaults.upload_folder),
        }
    }

    /// Upload config rooted at the configured folder, with no accepted fields yet.
    pub fn upload(&self) -> UploadConfig {
        UploadConfig::new(self.upload_folder.clone())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_base_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = TrencherConfig::from_lookup(lookup(&[]));
        assert_eq!(config, TrencherConfig::default());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.upload_folder, PathBuf::from("public/uploads"));
    }

    #[test]
    fn reads_variables_and_ignores_blank_values() {
        let config = TrencherConfig::from_lookup(lookup(&[
            (API_BASE_URL_VAR, "https://api.example.com"),
            (LOG_LEVEL_VAR, "  "),
            (UPLOAD_FOLDER_VAR, "/srv/uploads"),
        ]));
        assert_eq!(config.api_base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.upload().folder, PathBuf::from("/srv/uploads"));
        assert_eq!(config.client_config().base_url.as_deref(), Some("https://api.example.com"));
    }
}
