//! SEO meta tags: title, description, keywords, canonical, robots,
//! Open Graph and Twitter cards.
//!
//! Owns the `seo:*` hooks. Other plugins extend the title and keyword list
//! through the filters and ask for a rewrite with the `seo:refresh` action.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use siteplug_core::error::AppError;
use siteplug_core::result::AppResult;
use siteplug_plugin::api::context::PluginContext;
use siteplug_plugin::hooks::definitions::DEFAULT_PRIORITY;
use siteplug_plugin::hooks::registry::HookRegistry;
use siteplug_plugin::traits::{LoadGuard, Plugin, PluginMetadata};

use crate::document::{PageDocument, SharedDocument};
use crate::hooks;

pub const PLUGIN_NAME: &str = "seo-tools";

/// Settings stored in the plugin record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeoSettings {
    /// Appended to page titles as ` | <site name>`.
    pub site_name: String,
    /// Absolute site URL used for canonical and `og:url`.
    pub base_url: String,
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    /// Robots directive; `index, follow` when empty.
    pub robots: String,
    pub og_image: Option<String>,
    /// `website` when empty.
    pub og_type: String,
    /// Twitter `@handle` for `twitter:site`.
    pub twitter_handle: Option<String>,
}

/// Tags the plugin writes, so unload removes exactly these.
const NAME_TAGS: &[&str] = &[
    "description",
    "keywords",
    "robots",
    "twitter:card",
    "twitter:title",
    "twitter:description",
    "twitter:image",
    "twitter:site",
];
const PROPERTY_TAGS: &[&str] = &[
    "og:title",
    "og:description",
    "og:type",
    "og:url",
    "og:image",
    "og:site_name",
];

/// Appends ` | <site name>` unless the title is empty or already carries it.
pub fn append_site_name(title: &str, site_name: &str) -> String {
    let suffix = format!(" | {}", site_name);
    if site_name.is_empty() || title.is_empty() || title.ends_with(&suffix) || title == site_name {
        return title.to_string();
    }
    format!("{}{}", title, suffix)
}

/// Manages SEO meta tags on the shared document.
#[derive(Debug)]
pub struct SeoToolsPlugin {
    settings: Arc<SeoSettings>,
    document: SharedDocument,
    guard: LoadGuard,
    previous_title: Mutex<Option<String>>,
}

impl SeoToolsPlugin {
    pub fn new(settings: SeoSettings, document: SharedDocument) -> Self {
        Self {
            settings: Arc::new(settings),
            document,
            guard: LoadGuard::new(),
            previous_title: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &SeoSettings {
        &self.settings
    }

    /// Writes every tag, running the title and keywords through their filters.
    fn apply(settings: &SeoSettings, hooks: &HookRegistry, doc: &mut PageDocument) {
        let base_title = if settings.title.is_empty() {
            doc.title().to_string()
        } else {
            settings.title.clone()
        };
        let title = hooks
            .apply_filters(hooks::SEO_TITLE, Value::String(base_title.clone()), &[])
            .as_str()
            .map(str::to_string)
            .unwrap_or(base_title);
        doc.set_title(title.clone());

        let keywords = hooks.apply_filters(hooks::SEO_KEYWORDS, json!(settings.keywords), &[]);
        let keywords: Vec<String> = serde_json::from_value(keywords).unwrap_or_else(|e| {
            warn!(error = %e, "Keyword filter returned a non-list value");
            settings.keywords.clone()
        });
        if keywords.is_empty() {
            doc.remove_meta("keywords");
        } else {
            doc.set_meta_name("keywords", keywords.join(", "));
        }

        let robots = if settings.robots.is_empty() {
            "index, follow"
        } else {
            settings.robots.as_str()
        };
        doc.set_meta_name("robots", robots);

        if !settings.description.is_empty() {
            doc.set_meta_name("description", settings.description.clone());
            doc.set_meta_property("og:description", settings.description.clone());
            doc.set_meta_name("twitter:description", settings.description.clone());
        }

        let og_type = if settings.og_type.is_empty() {
            "website"
        } else {
            settings.og_type.as_str()
        };
        doc.set_meta_property("og:title", title.clone());
        doc.set_meta_property("og:type", og_type);
        if !settings.site_name.is_empty() {
            doc.set_meta_property("og:site_name", settings.site_name.clone());
        }

        if !settings.base_url.is_empty() {
            let url = format!("{}{}", settings.base_url.trim_end_matches('/'), doc.path());
            doc.set_canonical(Some(url.clone()));
            doc.set_meta_property("og:url", url);
        }

        let card = if settings.og_image.is_some() {
            "summary_large_image"
        } else {
            "summary"
        };
        doc.set_meta_name("twitter:card", card);
        doc.set_meta_name("twitter:title", title);
        if let Some(image) = &settings.og_image {
            doc.set_meta_property("og:image", image.clone());
            doc.set_meta_name("twitter:image", image.clone());
        }
        if let Some(handle) = &settings.twitter_handle {
            doc.set_meta_name("twitter:site", handle.clone());
        }
    }

    /// Handles the `seo:meta` action argument.
    fn set_meta_from(doc: &mut PageDocument, arg: &Value) -> AppResult<()> {
        let content = arg
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::validation("seo:meta requires a string 'content'"))?;
        if let Some(name) = arg.get("name").and_then(Value::as_str) {
            doc.set_meta_name(name, content);
        } else if let Some(property) = arg.get("property").and_then(Value::as_str) {
            doc.set_meta_property(property, content);
        } else {
            return Err(AppError::validation("seo:meta requires 'name' or 'property'"));
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for SeoToolsPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(PLUGIN_NAME, "1.0.0")
            .with_description("Title, meta description, Open Graph and Twitter tags")
            .with_capabilities(["seo", "meta-tags"])
    }

    async fn load(&self, ctx: &PluginContext) -> AppResult<()> {
        if self.guard.is_loaded() {
            return Ok(());
        }

        let site_name = self.settings.site_name.clone();
        ctx.add_filter(hooks::SEO_TITLE, DEFAULT_PRIORITY, move |value, _| {
            let title = value
                .as_str()
                .ok_or_else(|| AppError::validation("seo:title expects a string"))?;
            Ok(Value::String(append_site_name(title, &site_name)))
        });

        let document = self.document.clone();
        ctx.add_action(hooks::SEO_META, DEFAULT_PRIORITY, move |args| {
            let arg = args
                .first()
                .ok_or_else(|| AppError::validation("seo:meta requires an argument"))?;
            Self::set_meta_from(&mut document.write(), arg)
        });

        let document = self.document.clone();
        let settings = self.settings.clone();
        let registry = ctx.hooks().clone();
        ctx.add_action(hooks::SEO_REFRESH, DEFAULT_PRIORITY, move |_| {
            Self::apply(&settings, &registry, &mut document.write());
            Ok(())
        });

        {
            let mut doc = self.document.write();
            *self.previous_title.lock() = Some(doc.title().to_string());
            Self::apply(&self.settings, ctx.hooks(), &mut doc);
        }

        self.guard.mark_loaded();
        info!(title = %self.document.read().title(), "SEO tags applied");
        Ok(())
    }

    async fn unload(&self, ctx: &PluginContext) -> AppResult<()> {
        if !self.guard.is_loaded() {
            return Ok(());
        }

        ctx.remove_own_hooks();
        {
            let mut doc = self.document.write();
            for key in NAME_TAGS.iter().chain(PROPERTY_TAGS) {
                doc.remove_meta(key);
            }
            doc.set_canonical(None);
            if let Some(title) = self.previous_title.lock().take() {
                doc.set_title(title);
            }
        }

        self.guard.mark_unloaded();
        debug!("SEO tags removed");
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.guard.is_loaded()
    }
}
