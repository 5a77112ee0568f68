//! Image URL normalization.
//!
//! Archived images always point at the canonical media host. Sticker
//! (dccon) assets are not archived at all.

use url::Url;

pub const DEFAULT_IMAGE_HOST: &str = "images.dcinside.com";

/// Path fragments that mark non-archivable assets.
pub const DEFAULT_SKIP_MARKERS: &[&str] = &["dccon.php"];

/// Rewrites media links onto a single host.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    canonical_host: String,
    skip_markers: Vec<String>,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_HOST)
    }
}

impl ImageNormalizer {
    pub fn new(canonical_host: impl Into<String>) -> Self {
        Self {
            canonical_host: canonical_host.into(),
            skip_markers: DEFAULT_SKIP_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn with_skip_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn canonical_host(&self) -> &str {
        &self.canonical_host
    }

    /// Returns the URL with its authority replaced by the canonical host, or
    /// `None` when the URL must not be archived.
    ///
    /// Scheme, path, query and fragment are kept as-is. Port and credentials
    /// belong to the old authority and are dropped with it. Protocol-relative
    /// links (`//host/path`) are read as `https:`.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if self.skip_markers.iter().any(|m| raw.contains(m.as_str())) {
            return None;
        }

        let mut url = match raw.strip_prefix("//") {
            Some(rest) => Url::parse(&format!("https://{rest}")).ok()?,
            None => Url::parse(raw).ok()?,
        };
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return None;
        }

        url.set_host(Some(&self.canonical_host)).ok()?;
        url.set_port(None).ok()?;
        url.set_username("").ok()?;
        url.set_password(None).ok()?;
        Some(url.into())
    }

    /// Normalizes every URL, dropping skipped ones and keeping order.
    pub fn normalize_all<'a, I>(&self, raw: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        raw.into_iter().filter_map(|u| self.normalize(u)).collect()
    }
}
