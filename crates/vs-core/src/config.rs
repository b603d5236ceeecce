//! Service configuration
//!
//! Assembled once at startup and passed explicitly to every component, so
//! tests can inject their own host lists.

use std::collections::HashSet;

use serde::Deserialize;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("At least one player host is required")]
    NoPlayerHosts,
    #[error("Duplicate host: {0}")]
    DuplicateHost(String),
    #[error("Player path must start with '/': {0}")]
    InvalidPlayerPath(String),
    #[error("Media extension must not be empty")]
    EmptyExtension,
    #[error("Invalid path segment for {field}: {value:?}")]
    InvalidSegment { field: &'static str, value: String },
}

/// Immutable configuration of the resolution pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Hosts serving the player entry point
    pub player_hosts: Vec<String>,
    /// Hosts serving raw media files
    pub media_hosts: Vec<String>,
    /// Player entry-point path (exact match)
    pub player_path: String,
    /// Query parameter carrying the embedded media path
    pub path_param: String,
    /// First segment of the canonical media path
    pub media_namespace: String,
    /// Second segment of the canonical media path
    pub media_segment: String,
    /// Target media extension, without the dot
    pub media_extension: String,
    /// URL schemes of the extension's own pages
    pub extension_schemes: Vec<String>,
    /// Internal resolution page, relative to the extension root
    pub resolution_page: String,
    /// Also block media files requested by player pages
    pub block_media_from_initiators: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            player_hosts: vec!["god-ys.com".to_string(), "sdys123.xyz".to_string()],
            media_hosts: vec![
                "gdtelecom-jxncfy-gd-person.shusheng1.mini189.cn".to_string(),
                "media-qhxn-fj-person.qh6oss.ctyunxs.cn".to_string(),
                "cloudcube.wuxi.cn".to_string(),
            ],
            player_path: "/artplayer/index.html".to_string(),
            path_param: "url".to_string(),
            media_namespace: "vcloud".to_string(),
            media_segment: "f".to_string(),
            media_extension: "mp4".to_string(),
            extension_schemes: vec!["chrome-extension".to_string(), "moz-extension".to_string()],
            resolution_page: "download.html".to_string(),
            block_media_from_initiators: true,
        }
    }
}

impl Config {
    /// Parse a JSON config, normalise it and validate it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.normalized().validated()
    }

    /// Lower-case hosts and schemes, strip a leading dot from the extension.
    pub fn normalized(mut self) -> Self {
        for host in self.player_hosts.iter_mut().chain(self.media_hosts.iter_mut()) {
            *host = host.trim().to_ascii_lowercase();
        }
        for scheme in &mut self.extension_schemes {
            *scheme = scheme.trim().trim_end_matches(':').to_ascii_lowercase();
        }
        self.media_extension = self.media_extension.trim_start_matches('.').to_string();
        self
    }

    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.player_hosts.is_empty() {
            return Err(ConfigError::NoPlayerHosts);
        }

        let mut seen = HashSet::new();
        for host in self.player_hosts.iter().chain(&self.media_hosts) {
            if !seen.insert(host.as_str()) {
                return Err(ConfigError::DuplicateHost(host.clone()));
            }
        }

        if !self.player_path.starts_with('/') {
            return Err(ConfigError::InvalidPlayerPath(self.player_path.clone()));
        }
        if self.media_extension.is_empty() {
            return Err(ConfigError::EmptyExtension);
        }

        for (field, value) in [
            ("mediaNamespace", &self.media_namespace),
            ("mediaSegment", &self.media_segment),
        ] {
            if value.is_empty() || value.contains('/') {
                return Err(ConfigError::InvalidSegment { field, value: value.clone() });
            }
        }

        Ok(())
    }

    /// Every host the listeners need to see traffic for.
    pub fn observed_hosts(&self) -> impl Iterator<Item = &str> {
        self.player_hosts.iter().chain(&self.media_hosts).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = Config::from_json("{}").expect("defaults should validate");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn normalizes_hosts_and_extension() {
        let config = Config::from_json(
            r#"{"playerHosts":["Player.Example "],"mediaHosts":[],"mediaExtension":".MP4"}"#,
        )
        .unwrap();
        assert_eq!(config.player_hosts, vec!["player.example"]);
        assert_eq!(config.media_extension, "MP4");
    }

    #[test]
    fn rejects_invalid_configs() {
        assert!(matches!(
            Config::from_json(r#"{"playerHosts":[]}"#),
            Err(ConfigError::NoPlayerHosts)
        ));
        assert!(matches!(
            Config::from_json(r#"{"playerHosts":["a.example"],"mediaHosts":["A.example"]}"#),
            Err(ConfigError::DuplicateHost(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"playerPath":"artplayer"}"#),
            Err(ConfigError::InvalidPlayerPath(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"mediaSegment":"a/b"}"#),
            Err(ConfigError::InvalidSegment { field: "mediaSegment", .. })
        ));
        assert!(matches!(Config::from_json("[1]"), Err(ConfigError::Json(_))));
    }
}
