//! URL Classifier
//!
//! Pure predicates over URL strings, bound to a [`Config`]. Nothing here
//! allocates on the negative path and nothing here fails: malformed input
//! simply does not match.

use url::Url;

use crate::config::Config;
use crate::url::{extract_host, extract_path, extract_scheme, host_in, path_has_extension};

/// Query parameter carrying the media URL on the resolution page.
pub const RESOLUTION_PARAM: &str = "url";

/// Classifies and normalises URLs seen by the pipeline.
#[derive(Debug, Clone)]
pub struct Classifier {
    config: Config,
}

impl Classifier {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// True iff the path ends in the media extension, with or without a
    /// trailing query string.
    pub fn is_media_file_url(&self, url: &str) -> bool {
        extract_host(url).is_some() && path_has_extension(extract_path(url), &self.config.media_extension)
    }

    /// True iff the host is an allow-listed player host and the path is the
    /// player entry point.
    pub fn is_player_page_url(&self, url: &str) -> bool {
        host_in(url, &self.config.player_hosts) && extract_path(url) == self.config.player_path
    }

    pub fn is_media_host_url(&self, url: &str) -> bool {
        host_in(url, &self.config.media_hosts)
    }

    pub fn is_player_host_url(&self, url: &str) -> bool {
        host_in(url, &self.config.player_hosts)
    }

    /// True iff the scheme belongs to the extension itself.
    pub fn is_extension_internal_url(&self, url: &str) -> bool {
        match extract_scheme(url) {
            Some(scheme) => self
                .config
                .extension_schemes
                .iter()
                .any(|s| s.eq_ignore_ascii_case(scheme)),
            None => false,
        }
    }

    /// True iff the URL is the extension's own resolution page.
    pub fn is_resolution_page_url(&self, url: &str) -> bool {
        if !self.is_extension_internal_url(url) {
            return false;
        }
        let path = extract_path(url);
        path.strip_suffix(self.config.resolution_page.as_str())
            .is_some_and(|rest| rest.ends_with('/'))
    }

    /// True iff the URL's path has the canonical `/<ns>/<seg>/<id>/<id2>/` shape.
    pub fn is_canonical_media_url(&self, url: &str) -> bool {
        extract_host(url).is_some() && self.match_media_path(extract_path(url)).is_some()
    }

    /// Anything the per-tab store may hold.
    pub fn is_media_locator(&self, url: &str) -> bool {
        self.is_media_file_url(url) || self.is_canonical_media_url(url)
    }

    /// Recover the canonical media URL from a player page URL.
    ///
    /// The path parameter may hold a relative path or an absolute URL; only
    /// its path is kept. The result is always an `https` URL on the player
    /// page's host, without credentials or port, and always carries a
    /// trailing slash.
    pub fn extract_canonical_media_path(&self, player_url: &str) -> Option<String> {
        let page = Url::parse(player_url).ok()?;
        let host = page.host_str()?;

        let embedded = page
            .query_pairs()
            .find(|(key, _)| key == self.config.path_param.as_str())
            .map(|(_, value)| value.into_owned())?;
        if embedded.is_empty() {
            return None;
        }

        let resolved = page.join(&embedded).ok()?;
        let (id, id2) = self.match_media_path(resolved.path())?;

        Some(format!(
            "https://{}/{}/{}/{}/{}/",
            host, self.config.media_namespace, self.config.media_segment, id, id2
        ))
    }

    /// Build the resolution page URL for a media URL.
    pub fn resolution_page_url(&self, extension_base: &Url, media_url: &str) -> Option<String> {
        let mut page = extension_base.join(&self.config.resolution_page).ok()?;
        page.query_pairs_mut().clear().append_pair(RESOLUTION_PARAM, media_url);
        Some(page.into())
    }

    /// Split a path of the canonical shape into its two id segments.
    fn match_media_path<'p>(&self, path: &'p str) -> Option<(&'p str, &'p str)> {
        let trimmed = path.strip_prefix('/')?;
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

        let mut segments = trimmed.split('/');
        let namespace = segments.next()?;
        let segment = segments.next()?;
        let id = segments.next()?;
        let id2 = segments.next()?;
        if segments.next().is_some() {
            return None;
        }

        if namespace != self.config.media_namespace || segment != self.config.media_segment {
            return None;
        }
        if id.is_empty() || id2.is_empty() {
            return None;
        }

        Some((id, id2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(Config {
            player_hosts: vec!["player.example".to_string(), "mirror.example".to_string()],
            media_hosts: vec!["cdn.example".to_string()],
            ..Config::default()
        })
    }

    #[test]
    fn extracts_canonical_path_from_encoded_param() {
        let c = classifier();
        assert_eq!(
            c.extract_canonical_media_path(
                "https://player.example/artplayer/index.html?url=%2Fvcloud%2Ff%2FabcDEF%2F123456%2F"
            )
            .as_deref(),
            Some("https://player.example/vcloud/f/abcDEF/123456/")
        );
    }

    #[test]
    fn enforces_trailing_slash() {
        let c = classifier();
        assert_eq!(
            c.extract_canonical_media_path(
                "https://player.example/artplayer/index.html?url=/vcloud/f/abc/123"
            )
            .as_deref(),
            Some("https://player.example/vcloud/f/abc/123/")
        );
    }

    #[test]
    fn output_host_follows_requesting_mirror() {
        let c = classifier();
        let url = "https://mirror.example/artplayer/index.html?autoplay=1&url=%2Fvcloud%2Ff%2Fx%2Fy";
        assert_eq!(
            c.extract_canonical_media_path(url).as_deref(),
            Some("https://mirror.example/vcloud/f/x/y/")
        );
    }

    #[test]
    fn absolute_embedded_url_contributes_only_its_path() {
        let c = classifier();
        let url = "https://player.example/artplayer/index.html?url=https%3A%2F%2Fother.host%2Fvcloud%2Ff%2Fa%2Fb%2F%3Fx%3D1";
        assert_eq!(
            c.extract_canonical_media_path(url).as_deref(),
            Some("https://player.example/vcloud/f/a/b/")
        );
    }

    #[test]
    fn canonical_url_drops_scheme_credentials_and_port() {
        let c = classifier();
        let query = "artplayer/index.html?url=%2Fvcloud%2Ff%2Fa%2Fb";
        for page in [
            format!("http://player.example/{query}"),
            format!("https://user:pw@player.example:8443/{query}"),
        ] {
            assert_eq!(
                c.extract_canonical_media_path(&page).as_deref(),
                Some("https://player.example/vcloud/f/a/b/")
            );
        }
    }

    #[test]
    fn extraction_rejects_bad_input() {
        let c = classifier();
        let base = "https://player.example/artplayer/index.html";
        let cases = [
            "not a url".to_string(),
            base.to_string(),
            format!("{base}?url="),
            format!("{base}?other=%2Fvcloud%2Ff%2Fa%2Fb"),
            format!("{base}?url=http%3A%2F%2F%5B%3A%3A1"),
            format!("{base}?url=%2Fvcloud%2Ff%2Fa"),
            format!("{base}?url=%2Fvcloud%2Ff%2Fa%2Fb%2Fc"),
            format!("{base}?url=%2Fvcloud%2Ff%2F%2Fb"),
            format!("{base}?url=%2Fother%2Ff%2Fa%2Fb"),
            format!("{base}?url=%2Fvcloud%2Fg%2Fa%2Fb"),
            "data:text/plain,hello".to_string(),
        ];
        for case in &cases {
            assert_eq!(c.extract_canonical_media_path(case), None, "{case}");
        }
    }

    #[test]
    fn media_file_truth_table() {
        let c = classifier();
        assert!(c.is_media_file_url("https://cdn.example/video.mp4"));
        assert!(c.is_media_file_url("https://cdn.example/video.mp4?sig=x"));
        assert!(c.is_media_file_url("https://cdn.example/Video.MP4"));
        assert!(!c.is_media_file_url("https://cdn.example/video.mp4x"));
        assert!(!c.is_media_file_url("https://cdn.example/video.mp4/part"));
        assert!(!c.is_media_file_url("https://cdn.example/video.mkv"));
        assert!(!c.is_media_file_url("https://cdn.example/page?file=video.mp4"));
        assert!(!c.is_media_file_url("video.mp4"));
    }

    #[test]
    fn player_page_requires_host_and_exact_path() {
        let c = classifier();
        assert!(c.is_player_page_url("https://player.example/artplayer/index.html?url=x"));
        assert!(!c.is_player_page_url("https://evil.example/artplayer/index.html?url=x"));
        assert!(!c.is_player_page_url("https://player.example/artplayer/index.html/extra"));
        assert!(!c.is_player_page_url("https://player.example/artplayer/"));
    }

    #[test]
    fn recognizes_extension_pages() {
        let c = classifier();
        assert!(c.is_extension_internal_url("chrome-extension://abcdef/download.html"));
        assert!(c.is_extension_internal_url("moz-extension://abcdef/options.html"));
        assert!(!c.is_extension_internal_url("https://player.example/"));

        assert!(c.is_resolution_page_url("chrome-extension://abcdef/download.html?url=x"));
        assert!(!c.is_resolution_page_url("chrome-extension://abcdef/options.html"));
        assert!(!c.is_resolution_page_url("chrome-extension://abcdef/mydownload.html"));
        assert!(!c.is_resolution_page_url("https://player.example/download.html"));
    }

    #[test]
    fn locators_exclude_player_pages() {
        let c = classifier();
        assert!(c.is_media_locator("https://player.example/vcloud/f/a/b/"));
        assert!(c.is_media_locator("https://cdn.example/v.mp4"));
        assert!(!c.is_media_locator("https://player.example/artplayer/index.html?url=%2Fvcloud%2Ff%2Fa%2Fb"));
    }

    #[test]
    fn builds_resolution_page_url() {
        let c = classifier();
        let base = Url::parse("chrome-extension://abcdef/").unwrap();
        let page = c
            .resolution_page_url(&base, "https://cdn.example/v.mp4?sig=a&b=c")
            .unwrap();
        assert_eq!(
            page,
            "chrome-extension://abcdef/download.html?url=https%3A%2F%2Fcdn.example%2Fv.mp4%3Fsig%3Da%26b%3Dc"
        );
        assert!(c.is_resolution_page_url(&page));
    }
}
