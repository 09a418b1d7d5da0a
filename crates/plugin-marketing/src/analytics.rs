//! Google Analytics (gtag.js) injection and hit tracking.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use siteplug_core::error::AppError;
use siteplug_core::result::AppResult;
use siteplug_core::types::id::SubscriptionId;
use siteplug_plugin::api::context::PluginContext;
use siteplug_plugin::traits::{LoadGuard, Plugin, PluginMetadata};

use crate::document::{SharedDocument, encode_component};
use crate::hooks;

pub const PLUGIN_NAME: &str = "google-analytics";

const GTAG_SCRIPT_ID: &str = "ga-gtag";
const CONFIG_SCRIPT_ID: &str = "ga-config";
const GTAG_URL: &str = "https://www.googletagmanager.com/gtag/js";

/// Settings stored in the plugin record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsSettings {
    /// `G-XXXX` (GA4) or `UA-XXXX` (Universal Analytics) id.
    pub measurement_id: String,
    pub anonymize_ip: bool,
    pub debug_mode: bool,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            measurement_id: String::new(),
            anonymize_ip: true,
            debug_mode: false,
        }
    }
}

impl AnalyticsSettings {
    /// Checks the measurement id format.
    pub fn validate(&self) -> AppResult<()> {
        let id = self.measurement_id.trim();
        if id.is_empty() {
            return Err(AppError::validation("Google Analytics measurement id is required"));
        }
        let valid_prefix = id.starts_with("G-") || id.starts_with("UA-");
        let valid_chars = id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid_prefix || !valid_chars {
            return Err(AppError::validation(format!(
                "Invalid measurement id '{}': expected a G- or UA- id",
                id
            )));
        }
        Ok(())
    }
}

/// A page view or custom event seen on the bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedHit {
    pub kind: HitKind,
    pub name: String,
    pub params: Value,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    PageView,
    Event,
}

/// Injects gtag.js and records hits emitted on the bus.
#[derive(Debug)]
pub struct GoogleAnalyticsPlugin {
    settings: AnalyticsSettings,
    document: SharedDocument,
    guard: LoadGuard,
    hits: Arc<Mutex<Vec<TrackedHit>>>,
    subscriptions: Mutex<Vec<(&'static str, SubscriptionId)>>,
}

impl GoogleAnalyticsPlugin {
    pub fn new(settings: AnalyticsSettings, document: SharedDocument) -> Self {
        Self {
            settings,
            document,
            guard: LoadGuard::new(),
            hits: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Hits recorded since load, oldest first.
    pub fn tracked_events(&self) -> Vec<TrackedHit> {
        self.hits.lock().clone()
    }

    /// gtag.js loader URL for the configured id.
    pub fn script_url(&self) -> String {
        format!(
            "{}?id={}",
            GTAG_URL,
            encode_component(self.settings.measurement_id.trim())
        )
    }

    /// Inline bootstrap that configures gtag.
    pub fn config_script(&self) -> String {
        let mut options = serde_json::Map::new();
        if self.settings.anonymize_ip {
            options.insert("anonymize_ip".into(), Value::Bool(true));
        }
        if self.settings.debug_mode {
            options.insert("debug_mode".into(), Value::Bool(true));
        }
        format!(
            "window.dataLayer = window.dataLayer || [];\n\
             function gtag(){{dataLayer.push(arguments);}}\n\
             gtag('js', new Date());\n\
             gtag('config', {}, {});",
            Value::String(self.settings.measurement_id.trim().to_string()),
            Value::Object(options)
        )
    }

    fn record(hits: &Mutex<Vec<TrackedHit>>, kind: HitKind, data: &Value) -> AppResult<Value> {
        let name = match kind {
            HitKind::PageView => data.get("path").and_then(Value::as_str).unwrap_or("/"),
            HitKind::Event => data
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| AppError::validation("analytics event requires a name"))?,
        };
        let params = match kind {
            HitKind::PageView => data.clone(),
            HitKind::Event => data.get("params").cloned().unwrap_or(Value::Null),
        };
        hits.lock().push(TrackedHit {
            kind,
            name: name.to_string(),
            params,
            at: Utc::now(),
        });
        Ok(json!({ "tracked": name }))
    }
}

#[async_trait]
impl Plugin for GoogleAnalyticsPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(PLUGIN_NAME, "1.0.0")
            .with_description("Google Analytics tracking via gtag.js")
            .with_capabilities(["analytics", "tracking"])
    }

    async fn load(&self, ctx: &PluginContext) -> AppResult<()> {
        if self.guard.is_loaded() {
            return Ok(());
        }
        self.settings.validate()?;

        {
            let mut doc = self.document.write();
            doc.add_script(GTAG_SCRIPT_ID, self.script_url());
            doc.set_inline_script(CONFIG_SCRIPT_ID, self.config_script());
        }

        let mut subscriptions = self.subscriptions.lock();
        let hits = self.hits.clone();
        subscriptions.push((
            hooks::PAGE_VIEW,
            ctx.subscribe(hooks::PAGE_VIEW, move |data| {
                Self::record(&hits, HitKind::PageView, data)
            }),
        ));
        let hits = self.hits.clone();
        subscriptions.push((
            hooks::ANALYTICS_EVENT,
            ctx.subscribe(hooks::ANALYTICS_EVENT, move |data| {
                Self::record(&hits, HitKind::Event, data)
            }),
        ));

        self.guard.mark_loaded();
        info!(measurement_id = %self.settings.measurement_id, "Google Analytics injected");
        Ok(())
    }

    async fn unload(&self, ctx: &PluginContext) -> AppResult<()> {
        if !self.guard.is_loaded() {
            return Ok(());
        }

        for (event, id) in self.subscriptions.lock().drain(..) {
            ctx.bus().unsubscribe(event, id);
        }
        {
            let mut doc = self.document.write();
            doc.remove_script(GTAG_SCRIPT_ID);
            doc.remove_inline_script(CONFIG_SCRIPT_ID);
        }
        self.hits.lock().clear();

        self.guard.mark_unloaded();
        debug!("Google Analytics removed");
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.guard.is_loaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageDocument;
    use siteplug_core::error::ErrorKind;
    use siteplug_plugin::events::bus::EventBus;
    use siteplug_plugin::hooks::registry::HookRegistry;

    fn settings(id: &str) -> AnalyticsSettings {
        AnalyticsSettings {
            measurement_id: id.to_string(),
            ..AnalyticsSettings::default()
        }
    }

    fn context() -> PluginContext {
        PluginContext::new(
            PLUGIN_NAME,
            Arc::new(EventBus::default()),
            Arc::new(HookRegistry::new(10)),
        )
    }

    #[test]
    fn test_measurement_id_validation() {
        assert!(settings("G-ABC123").validate().is_ok());
        assert!(settings("UA-1234-1").validate().is_ok());
        assert_eq!(settings("").validate().unwrap_err().kind, ErrorKind::Validation);
        assert!(settings("GTM-XXXX").validate().is_err());
        assert!(settings("G-<script>").validate().is_err());
    }

    #[tokio::test]
    async fn test_load_injects_scripts_and_tracks_hits() {
        let document = PageDocument::new("/").shared();
        let plugin = GoogleAnalyticsPlugin::new(settings("G-TEST1"), document.clone());
        let ctx = context();

        plugin.load(&ctx).await.unwrap();
        {
            let doc = document.read();
            assert_eq!(
                doc.script(GTAG_SCRIPT_ID).map(|s| s.src.as_str()),
                Some("https://www.googletagmanager.com/gtag/js?id=G-TEST1")
            );
            let config = doc.inline_script(CONFIG_SCRIPT_ID).unwrap();
            assert!(config.contains("gtag('config', \"G-TEST1\", {\"anonymize_ip\":true});"));
        }

        ctx.emit(hooks::PAGE_VIEW, json!({ "path": "/pricing" }));
        ctx.emit(hooks::ANALYTICS_EVENT, json!({ "name": "signup", "params": { "plan": "pro" } }));
        ctx.emit(hooks::ANALYTICS_EVENT, json!({ "params": {} }));

        let hits = plugin.tracked_events();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].kind, HitKind::PageView);
        assert_eq!(hits[0].name, "/pricing");
        assert_eq!(hits[1].params, json!({ "plan": "pro" }));
    }

    #[tokio::test]
    async fn test_unload_removes_everything_it_added() {
        let document = PageDocument::new("/").shared();
        let plugin = GoogleAnalyticsPlugin::new(settings("G-TEST1"), document.clone());
        let ctx = context();

        plugin.load(&ctx).await.unwrap();
        plugin.load(&ctx).await.unwrap();
        assert_eq!(ctx.bus().listener_count(hooks::PAGE_VIEW), 1);

        plugin.unload(&ctx).await.unwrap();
        assert!(!plugin.is_loaded());
        assert_eq!(ctx.bus().total_listener_count(), 0);
        assert!(document.read().script(GTAG_SCRIPT_ID).is_none());
        assert!(document.read().inline_script(CONFIG_SCRIPT_ID).is_none());

        ctx.emit(hooks::PAGE_VIEW, json!({ "path": "/" }));
        assert!(plugin.tracked_events().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_id_fails_load_without_side_effects() {
        let document = PageDocument::new("/").shared();
        let plugin = GoogleAnalyticsPlugin::new(settings("bogus"), document.clone());
        assert!(plugin.load(&context()).await.is_err());
        assert!(!plugin.is_loaded());
        assert!(document.read().script(GTAG_SCRIPT_ID).is_none());
    }
}
