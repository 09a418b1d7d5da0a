//! Site-wide settings shared by the marketing plugins.

use serde::{Deserialize, Serialize};

/// Public site identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site display name, appended to page titles.
    #[serde(default = "default_site_name")]
    pub name: String,
    /// Canonical base URL without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Default language tag for generated documents.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            base_url: default_base_url(),
            language: default_language(),
        }
    }
}

impl SiteConfig {
    /// Joins a site-relative path onto the base URL.
    pub fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() || path == "/" {
            format!("{base}/")
        } else {
            format!("{base}/{}", path.trim_start_matches('/'))
        }
    }
}

fn default_site_name() -> String {
    "Siteplug".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url_joins_paths() {
        let site = SiteConfig {
            base_url: "https://example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(site.absolute_url("/about"), "https://example.com/about");
        assert_eq!(site.absolute_url("pricing"), "https://example.com/pricing");
        assert_eq!(site.absolute_url("/"), "https://example.com/");
        assert_eq!(
            site.absolute_url("https://cdn.example.com/x"),
            "https://cdn.example.com/x"
        );
    }
}
