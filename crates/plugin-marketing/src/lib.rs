//! # plugin-marketing
//!
//! Marketing plugins for Siteplug, each implementing
//! [`siteplug_plugin::Plugin`]:
//!
//! | Name | Capabilities | Depends on |
//! |------|--------------|------------|
//! | `google-analytics` | analytics, tracking | |
//! | `seo-tools` | seo, meta-tags | |
//! | `sitemap-generator` | sitemap, robots | |
//! | `rich-snippets` | structured-data, json-ld | `seo-tools` |
//! | `keyword-tagging` | keywords, content-analysis | `seo-tools` |
//! | `local-business` | local, maps | |
//!
//! Plugins write into a shared [`document::PageDocument`].

pub mod analytics;
pub mod document;
pub mod hooks;
pub mod keyword;
pub mod local_business;
pub mod rich_snippet;
pub mod seo;
pub mod sitemap;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use siteplug_core::config::site::SiteConfig;
use siteplug_core::error::{AppError, ErrorKind};
use siteplug_core::result::AppResult;
use siteplug_core::types::plugin_record::PluginRecord;
use siteplug_plugin::traits::Plugin;

pub use analytics::GoogleAnalyticsPlugin;
pub use document::{PageDocument, SharedDocument};
pub use keyword::KeywordTaggingPlugin;
pub use local_business::LocalBusinessPlugin;
pub use rich_snippet::RichSnippetsPlugin;
pub use seo::SeoToolsPlugin;
pub use sitemap::SitemapGeneratorPlugin;

/// Every plugin name [`build_plugin`] knows.
pub const PLUGIN_NAMES: &[&str] = &[
    analytics::PLUGIN_NAME,
    seo::PLUGIN_NAME,
    sitemap::PLUGIN_NAME,
    rich_snippet::PLUGIN_NAME,
    keyword::PLUGIN_NAME,
    local_business::PLUGIN_NAME,
];

/// Deserializes a record's settings; `null` means all defaults.
pub fn parse_settings<T: DeserializeOwned + Default>(record: &PluginRecord) -> AppResult<T> {
    if record.settings.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(record.settings.clone()).map_err(|e| {
        AppError::with_source(
            ErrorKind::Validation,
            format!("Invalid settings for plugin '{}': {}", record.name, e),
            e,
        )
    })
}

fn or_site(value: &mut String, fallback: &str) {
    if value.trim().is_empty() {
        *value = fallback.to_string();
    }
}

/// Sitemap plugin for `record`, with the site URL filled in.
pub fn build_sitemap(record: &PluginRecord, site: &SiteConfig) -> AppResult<SitemapGeneratorPlugin> {
    let mut settings: sitemap::SitemapSettings = parse_settings(record)?;
    or_site(&mut settings.base_url, &site.base_url);
    Ok(SitemapGeneratorPlugin::new(settings))
}

/// Builds the plugin named by `record`.
///
/// Site identity fills settings the record leaves empty. Unknown names
/// fail with `NotFound`.
pub fn build_plugin(
    record: &PluginRecord,
    document: SharedDocument,
    site: &SiteConfig,
) -> AppResult<Arc<dyn Plugin>> {
    debug!(plugin = %record.name, "Building plugin from record");

    let plugin: Arc<dyn Plugin> = match record.name.as_str() {
        analytics::PLUGIN_NAME => Arc::new(GoogleAnalyticsPlugin::new(
            parse_settings(record)?,
            document,
        )),
        seo::PLUGIN_NAME => {
            let mut settings: seo::SeoSettings = parse_settings(record)?;
            or_site(&mut settings.site_name, &site.name);
            or_site(&mut settings.base_url, &site.base_url);
            Arc::new(SeoToolsPlugin::new(settings, document))
        }
        sitemap::PLUGIN_NAME => Arc::new(build_sitemap(record, site)?),
        rich_snippet::PLUGIN_NAME => {
            let mut settings: rich_snippet::RichSnippetSettings = parse_settings(record)?;
            or_site(&mut settings.organization.name, &site.name);
            or_site(&mut settings.organization.url, &site.base_url);
            or_site(&mut settings.website.name, &site.name);
            or_site(&mut settings.website.url, &site.base_url);
            Arc::new(RichSnippetsPlugin::new(settings, document))
        }
        keyword::PLUGIN_NAME => Arc::new(KeywordTaggingPlugin::new(
            parse_settings(record)?,
            document,
        )),
        local_business::PLUGIN_NAME => Arc::new(LocalBusinessPlugin::new(
            parse_settings(record)?,
            document,
        )),
        other => {
            return Err(AppError::not_found(format!(
                "No plugin implementation named '{}'",
                other
            )));
        }
    };
    Ok(plugin)
}

/// Builds every active record, in file order.
pub fn build_active_plugins(
    records: &[PluginRecord],
    document: &SharedDocument,
    site: &SiteConfig,
) -> AppResult<Vec<Arc<dyn Plugin>>> {
    records
        .iter()
        .filter(|r| r.is_active)
        .map(|r| build_plugin(r, document.clone(), site))
        .collect()
}

/// Settings value with every default filled in, for documentation output.
pub fn default_settings(name: &str) -> Option<Value> {
    let value = match name {
        analytics::PLUGIN_NAME => serde_json::to_value(analytics::AnalyticsSettings::default()),
        seo::PLUGIN_NAME => serde_json::to_value(seo::SeoSettings::default()),
        sitemap::PLUGIN_NAME => serde_json::to_value(sitemap::SitemapSettings::default()),
        rich_snippet::PLUGIN_NAME => {
            serde_json::to_value(rich_snippet::RichSnippetSettings::default())
        }
        keyword::PLUGIN_NAME => serde_json::to_value(keyword::KeywordSettings::default()),
        local_business::PLUGIN_NAME => {
            serde_json::to_value(local_business::LocalBusinessSettings::default())
        }
        _ => return None,
    };
    value.ok()
}
