//! Validity filter and short-link rewriting for asset URLs.

use reqwest::Url;

/// Image extensions accepted by default.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Media hosts whose URLs are accepted even without a file extension.
pub const DEFAULT_TRUSTED_HOSTS: &[&str] = &[
    "i.redd.it",
    "preview.redd.it",
    "external-preview.redd.it",
    "i.imgur.com",
    "media.giphy.com",
    "pbs.twimg.com",
];

/// Rule set deciding whether a URL may be served as media.
///
/// A URL passes when it is http(s), its path ends in a known image extension
/// or its host is trusted, and (when dimensions are known) it meets the
/// minimum size.
///
/// ```rust
/// # use huginn::normalize::ValidityFilter;
/// let filter = ValidityFilter::new().min_dimensions(400, 300);
/// assert!(filter.accepts("https://example.com/cat.jpg", Some((800, 600))));
/// assert!(!filter.accepts("https://example.com/cat.jpg", Some((200, 200))));
/// assert!(!filter.accepts("https://example.com/page.html", None));
/// ```
#[derive(Debug, Clone)]
pub struct ValidityFilter {
    /// Minimum width in pixels. Default: 400.
    pub min_width: u32,
    /// Minimum height in pixels. Default: 300.
    pub min_height: u32,
    /// Accepted file extensions, lowercase without the dot.
    pub extensions: Vec<String>,
    /// Trusted hosts; subdomains of a trusted host are trusted too.
    pub trusted_hosts: Vec<String>,
}

impl Default for ValidityFilter {
    fn default() -> Self {
        Self {
            min_width: 400,
            min_height: 300,
            extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            trusted_hosts: DEFAULT_TRUSTED_HOSTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ValidityFilter {
    /// Create a filter with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum accepted dimensions.
    pub fn min_dimensions(mut self, width: u32, height: u32) -> Self {
        self.min_width = width;
        self.min_height = height;
        self
    }

    /// Trust an additional media host.
    pub fn trusted_host(mut self, host: impl Into<String>) -> Self {
        self.trusted_hosts.push(host.into().to_ascii_lowercase());
        self
    }

    /// Check a URL, with its dimensions when known.
    pub fn accepts(&self, url: &str, dimensions: Option<(u32, u32)>) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        if let Some((w, h)) = dimensions
            && (w < self.min_width || h < self.min_height)
        {
            return false;
        }
        self.has_media_extension(&parsed) || self.is_trusted_host(&parsed)
    }

    fn has_media_extension(&self, url: &Url) -> bool {
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|last| last.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }

    fn is_trusted_host(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.trusted_hosts
            .iter()
            .any(|t| host == *t || host.ends_with(&format!(".{t}")))
    }
}

/// Rewrite known short-link media hosts to their direct-media URL.
///
/// Unrecognized URLs are returned unchanged.
pub fn canonical_media_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match (host.as_str(), segments.as_slice()) {
        ("imgur.com" | "www.imgur.com" | "m.imgur.com", [id])
            if !matches!(*id, "a" | "gallery" | "t" | "user") =>
        {
            if id.contains('.') {
                format!("https://i.imgur.com/{}", gifv_to_gif(id))
            } else {
                format!("https://i.imgur.com/{id}.jpg")
            }
        }
        ("giphy.com" | "www.giphy.com", ["gifs", slug]) => {
            let id = slug.rsplit('-').next().unwrap_or(*slug);
            format!("https://media.giphy.com/media/{id}/giphy.gif")
        }
        _ if parsed.path().to_ascii_lowercase().ends_with(".gifv") => {
            let mut rewritten = parsed.clone();
            rewritten.set_path(&gifv_to_gif(parsed.path()));
            rewritten.to_string()
        }
        _ => url.to_string(),
    }
}

fn gifv_to_gif(path: &str) -> String {
    match path.len().checked_sub(5) {
        Some(cut) if path[cut..].eq_ignore_ascii_case(".gifv") => format!("{}.gif", &path[..cut]),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_ignores_query_and_case() {
        let filter = ValidityFilter::new();
        assert!(filter.accepts("https://example.com/a/B.JPG?width=640&s=abc", None));
        assert!(!filter.accepts("https://example.com/a/b.bmp", None));
    }

    #[test]
    fn trusted_host_needs_no_extension() {
        let filter = ValidityFilter::new();
        assert!(filter.accepts("https://i.redd.it/abcdef", None));
        assert!(filter.accepts("https://sub.pbs.twimg.com/media/x", None));
        assert!(!filter.accepts("https://evil-i.redd.it.example.com/x", None));
    }

    #[test]
    fn rejects_non_http_and_garbage() {
        let filter = ValidityFilter::new();
        assert!(!filter.accepts("ftp://example.com/a.jpg", None));
        assert!(!filter.accepts("self", None));
        assert!(!filter.accepts("", None));
    }

    #[test]
    fn minimum_dimensions_apply_only_when_known() {
        let filter = ValidityFilter::new();
        assert!(filter.accepts("https://example.com/a.png", Some((400, 300))));
        assert!(!filter.accepts("https://example.com/a.png", Some((399, 300))));
        assert!(!filter.accepts("https://example.com/a.png", Some((400, 299))));
        assert!(filter.accepts("https://example.com/a.png", None));
    }

    #[test]
    fn rewrites_imgur_short_links() {
        assert_eq!(
            canonical_media_url("https://imgur.com/AbC123"),
            "https://i.imgur.com/AbC123.jpg"
        );
        assert_eq!(
            canonical_media_url("https://imgur.com/AbC123.gifv"),
            "https://i.imgur.com/AbC123.gif"
        );
        // Albums have no single direct asset
        assert_eq!(
            canonical_media_url("https://imgur.com/a/AbC123"),
            "https://imgur.com/a/AbC123"
        );
    }

    #[test]
    fn rewrites_gifv_on_any_host() {
        assert_eq!(
            canonical_media_url("https://i.imgur.com/xyz.gifv"),
            "https://i.imgur.com/xyz.gif"
        );
    }

    #[test]
    fn rewrites_giphy_pages() {
        assert_eq!(
            canonical_media_url("https://giphy.com/gifs/funny-cat-l0HlBO7eyXzSZkJri"),
            "https://media.giphy.com/media/l0HlBO7eyXzSZkJri/giphy.gif"
        );
    }

    #[test]
    fn unknown_hosts_pass_through() {
        let url = "https://example.com/some/page?x=1";
        assert_eq!(canonical_media_url(url), url);
        assert_eq!(canonical_media_url("not a url"), "not a url");
    }
}
