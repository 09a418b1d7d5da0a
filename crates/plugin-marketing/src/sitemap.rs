//! sitemap.xml and robots.txt generation.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use siteplug_core::error::AppError;
use siteplug_core::result::AppResult;
use siteplug_core::types::id::SubscriptionId;
use siteplug_plugin::api::context::PluginContext;
use siteplug_plugin::hooks::registry::HookRegistry;
use siteplug_plugin::traits::{LoadGuard, Plugin, PluginMetadata};

use crate::document::escape_html;
use crate::hooks;

pub const PLUGIN_NAME: &str = "sitemap-generator";

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const CHANGE_FREQUENCIES: &[&str] = &[
    "always", "hourly", "daily", "weekly", "monthly", "yearly", "never",
];

/// One `<url>` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapUrl {
    /// Absolute URL or a site-relative path starting with `/`.
    pub loc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f32>,
}

impl SitemapUrl {
    pub fn new(loc: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            lastmod: None,
            changefreq: None,
            priority: None,
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.loc.trim().is_empty() {
            return Err(AppError::validation("Sitemap URL must not be empty"));
        }
        if let Some(freq) = &self.changefreq {
            if !CHANGE_FREQUENCIES.contains(&freq.as_str()) {
                return Err(AppError::validation(format!(
                    "Invalid changefreq '{}'",
                    freq
                )));
            }
        }
        if let Some(priority) = self.priority {
            if !(0.0..=1.0).contains(&priority) {
                return Err(AppError::validation(format!(
                    "Sitemap priority {} is outside 0.0..=1.0",
                    priority
                )));
            }
        }
        Ok(())
    }
}

/// Settings stored in the plugin record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SitemapSettings {
    /// Site origin that relative locations are resolved against.
    pub base_url: String,
    pub urls: Vec<SitemapUrl>,
    pub user_agent: String,
    pub disallow: Vec<String>,
    /// Seconds between crawler requests, emitted as `Crawl-delay`.
    pub crawl_delay: Option<u32>,
}

impl Default for SitemapSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            urls: Vec::new(),
            user_agent: "*".into(),
            disallow: Vec::new(),
            crawl_delay: None,
        }
    }
}

/// Keeps the URL list and renders sitemap.xml / robots.txt on demand.
#[derive(Debug)]
pub struct SitemapGeneratorPlugin {
    settings: SitemapSettings,
    urls: Arc<RwLock<Vec<SitemapUrl>>>,
    hooks: Mutex<Option<Arc<HookRegistry>>>,
    subscription: Mutex<Option<SubscriptionId>>,
    guard: LoadGuard,
}

impl SitemapGeneratorPlugin {
    /// Creates the plugin. Invalid configured URLs are logged and skipped.
    pub fn new(settings: SitemapSettings) -> Self {
        let urls = settings
            .urls
            .iter()
            .filter(|url| match url.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(loc = %url.loc, error = %e, "Skipping configured sitemap URL");
                    false
                }
            })
            .cloned()
            .collect();
        Self {
            settings,
            urls: Arc::new(RwLock::new(urls)),
            hooks: Mutex::new(None),
            subscription: Mutex::new(None),
            guard: LoadGuard::new(),
        }
    }

    /// Adds an entry, replacing any entry with the same location.
    pub fn add_url(&self, url: SitemapUrl) -> AppResult<()> {
        url.validate()?;
        upsert(&mut self.urls.write(), url);
        Ok(())
    }

    /// Removes the entry for `loc`. Returns whether one existed.
    pub fn remove_url(&self, loc: &str) -> bool {
        let mut urls = self.urls.write();
        let before = urls.len();
        urls.retain(|u| u.loc != loc);
        before != urls.len()
    }

    pub fn urls(&self) -> Vec<SitemapUrl> {
        self.urls.read().clone()
    }

    fn absolute(&self, loc: &str) -> String {
        if loc.starts_with('/') && !self.settings.base_url.is_empty() {
            format!("{}{}", self.settings.base_url.trim_end_matches('/'), loc)
        } else {
            loc.to_string()
        }
    }

    /// Entries after the `sitemap:urls` filter, when loaded.
    fn filtered_urls(&self) -> Vec<SitemapUrl> {
        let urls = self.urls();
        let Some(hooks) = self.hooks.lock().clone() else {
            return urls;
        };
        let initial = match serde_json::to_value(&urls) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Could not serialize sitemap URLs for filtering");
                return urls;
            }
        };
        let filtered = hooks.apply_filters(hooks::SITEMAP_URLS, initial, &[]);
        serde_json::from_value(filtered).unwrap_or_else(|e| {
            warn!(error = %e, "sitemap:urls filter returned an invalid list");
            urls
        })
    }

    /// Renders sitemap.xml.
    pub fn render_sitemap(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(xml, "<urlset xmlns=\"{}\">", SITEMAP_NS);
        for url in self.filtered_urls() {
            xml.push_str("  <url>\n");
            let _ = writeln!(xml, "    <loc>{}</loc>", escape_html(&self.absolute(&url.loc)));
            if let Some(lastmod) = &url.lastmod {
                let _ = writeln!(xml, "    <lastmod>{}</lastmod>", escape_html(lastmod));
            }
            if let Some(freq) = &url.changefreq {
                let _ = writeln!(xml, "    <changefreq>{}</changefreq>", escape_html(freq));
            }
            if let Some(priority) = url.priority {
                let _ = writeln!(xml, "    <priority>{:.1}</priority>", priority);
            }
            xml.push_str("  </url>\n");
        }
        xml.push_str("</urlset>\n");
        xml
    }

    /// Renders robots.txt.
    pub fn render_robots(&self) -> String {
        let mut out = String::new();
        let user_agent = if self.settings.user_agent.is_empty() {
            "*"
        } else {
            self.settings.user_agent.as_str()
        };
        let _ = writeln!(out, "User-agent: {}", user_agent);
        if self.settings.disallow.is_empty() {
            out.push_str("Disallow:\n");
        }
        for path in &self.settings.disallow {
            let _ = writeln!(out, "Disallow: {}", path);
        }
        if let Some(delay) = self.settings.crawl_delay {
            let _ = writeln!(out, "Crawl-delay: {}", delay);
        }
        if !self.settings.base_url.is_empty() {
            let _ = writeln!(out, "\nSitemap: {}", self.absolute("/sitemap.xml"));
        }
        out
    }
}

fn upsert(urls: &mut Vec<SitemapUrl>, url: SitemapUrl) {
    match urls.iter_mut().find(|u| u.loc == url.loc) {
        Some(existing) => *existing = url,
        None => urls.push(url),
    }
}

#[async_trait]
impl Plugin for SitemapGeneratorPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(PLUGIN_NAME, "1.0.0")
            .with_description("sitemap.xml and robots.txt generation")
            .with_capabilities(["sitemap", "robots"])
    }

    async fn load(&self, ctx: &PluginContext) -> AppResult<()> {
        if self.guard.is_loaded() {
            return Ok(());
        }

        let urls = self.urls.clone();
        let id = ctx.subscribe(hooks::PAGE_PUBLISHED, move |data: &Value| {
            let url: SitemapUrl = serde_json::from_value(serde_json::json!({
                "loc": data.get("path").cloned().unwrap_or(Value::Null),
                "lastmod": data.get("lastmod").cloned().unwrap_or(Value::Null),
            }))?;
            url.validate()?;
            upsert(&mut urls.write(), url);
            Ok(Value::Bool(true))
        });
        *self.subscription.lock() = Some(id);
        *self.hooks.lock() = Some(ctx.hooks().clone());

        self.guard.mark_loaded();
        info!(urls = self.urls.read().len(), "Sitemap generator ready");
        Ok(())
    }

    async fn unload(&self, ctx: &PluginContext) -> AppResult<()> {
        if !self.guard.is_loaded() {
            return Ok(());
        }
        if let Some(id) = self.subscription.lock().take() {
            ctx.bus().unsubscribe(hooks::PAGE_PUBLISHED, id);
        }
        self.hooks.lock().take();
        self.guard.mark_unloaded();
        debug!("Sitemap generator stopped");
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.guard.is_loaded()
    }
}
