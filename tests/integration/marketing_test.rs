//! Integration tests for the marketing plugins running on a real manager.

use std::sync::Arc;

use serde_json::{Value, json};

use plugin_marketing::analytics::{AnalyticsSettings, HitKind};
use plugin_marketing::document::{PageDocument, SharedDocument};
use plugin_marketing::{GoogleAnalyticsPlugin, hooks};
use siteplug_core::config::site::SiteConfig;
use siteplug_core::error::ErrorKind;
use siteplug_core::types::plugin_record::PluginRecord;
use siteplug_plugin::manager::PluginManager;

use crate::helpers;

const BODY: &str = "Rust plugins make marketing sites fast. Marketing teams love fast \
    sites. Rust keeps plugins safe and marketing pages quick.";

fn site() -> SiteConfig {
    SiteConfig {
        name: "Acme".into(),
        base_url: "https://acme.test".into(),
        ..Default::default()
    }
}

fn document() -> SharedDocument {
    let mut doc = PageDocument::new("/pricing");
    doc.set_title("Pricing");
    doc.set_body_text(BODY);
    doc.shared()
}

fn records() -> Vec<PluginRecord> {
    vec![
        PluginRecord::new("keyword-tagging").with_settings(json!({ "maxKeywords": 3 })),
        PluginRecord::new("rich-snippets"),
        PluginRecord::new("seo-tools").with_settings(json!({
            "description": "Plans for every team",
            "keywords": ["pricing"]
        })),
        PluginRecord::new("sitemap-generator").with_settings(json!({
            "urls": [{ "loc": "/" }, { "loc": "/pricing" }]
        })),
    ]
}

/// Registers every record, then loads each in record order.
async fn load_stack(manager: &PluginManager, doc: &SharedDocument) {
    let records = records();
    for record in &records {
        let plugin = plugin_marketing::build_plugin(record, doc.clone(), &site()).expect("build");
        manager.register_plugin(plugin).await.expect("register");
    }
    for record in &records {
        manager.load_registered(&record.name).await.expect("load");
    }
}

#[tokio::test]
async fn test_full_stack_loads_dependencies_first() {
    let manager = helpers::manager();
    let doc = document();
    load_stack(&manager, &doc).await;

    let order = manager.activation_order().await;
    let index = |name: &str| order.iter().position(|n| n == name).expect("active");
    assert_eq!(order.len(), 4);
    assert!(index("seo-tools") < index("keyword-tagging"));
    assert!(index("seo-tools") < index("rich-snippets"));

    let doc = doc.read();
    assert_eq!(doc.title(), "Pricing | Acme");
    assert_eq!(doc.canonical(), Some("https://acme.test/pricing"));
    assert_eq!(doc.meta("description"), Some("Plans for every team"));
    assert!(doc.json_ld("ld-organization").is_some());
    assert!(doc.json_ld("ld-website").is_some());

    let keywords = doc.meta("keywords").expect("keywords tag");
    assert!(keywords.starts_with("pricing"));
    assert!(keywords.contains("marketing"));
}

#[tokio::test]
async fn test_stack_emits_content_analysis() {
    let manager = helpers::manager();
    let doc = document();
    load_stack(&manager, &doc).await;

    let analyzed = manager.bus().history_for(hooks::CONTENT_ANALYZED);
    assert_eq!(analyzed.len(), 1);
    assert_eq!(analyzed[0].source, "keyword-tagging");
    assert_eq!(analyzed[0].data["path"], json!("/pricing"));
    assert!(analyzed[0].data["wordCount"].as_u64().unwrap_or_default() > 10);
}

#[tokio::test]
async fn test_unloading_keyword_plugin_restores_keywords() {
    let manager = helpers::manager();
    let doc = document();
    load_stack(&manager, &doc).await;

    manager.unload_plugin("keyword-tagging").await.expect("unload");

    assert_eq!(doc.read().meta("keywords"), Some("pricing"));
    assert_eq!(manager.hooks().owner_hook_count("keyword-tagging"), 0);
    assert!(manager.is_active("seo-tools").await);
}

#[tokio::test]
async fn test_seo_tools_blocked_while_dependents_registered() {
    let manager = helpers::manager();
    let doc = document();
    load_stack(&manager, &doc).await;

    let err = manager
        .unload_plugin("seo-tools")
        .await
        .expect_err("rich-snippets and keyword-tagging depend on seo-tools");
    assert!(err.is(ErrorKind::Dependency));

    manager.unload_plugin("rich-snippets").await.expect("unload");
    manager.unload_plugin("keyword-tagging").await.expect("unload");
    manager.unload_plugin("seo-tools").await.expect("unload");

    let doc = doc.read();
    assert_eq!(doc.title(), "Pricing");
    assert_eq!(doc.canonical(), None);
    assert!(doc.json_ld_ids().is_empty());
    assert_eq!(doc.meta("description"), None);
}

#[tokio::test]
async fn test_page_view_bridge_refreshes_and_tracks() {
    let manager = helpers::manager();
    let doc = document();
    load_stack(&manager, &doc).await;

    let analytics = Arc::new(GoogleAnalyticsPlugin::new(
        AnalyticsSettings {
            measurement_id: "G-TEST123".into(),
            ..Default::default()
        },
        doc.clone(),
    ));
    manager.load_plugin(analytics.clone()).await.expect("load analytics");
    manager.create_event_hook_bridge(hooks::PAGE_VIEW, hooks::SEO_REFRESH);

    doc.write().set_title("Tampered");
    manager.bus().emit(hooks::PAGE_VIEW, json!({ "path": "/pricing" }));
    manager.bus().emit(
        hooks::ANALYTICS_EVENT,
        json!({ "name": "signup", "params": { "plan": "pro" } }),
    );

    assert_eq!(doc.read().title(), "Tampered | Acme");
    let hits = analytics.tracked_events();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].kind, HitKind::PageView);
    assert_eq!(hits[0].name, "/pricing");
    assert_eq!(hits[1].kind, HitKind::Event);
    assert_eq!(hits[1].params, json!({ "plan": "pro" }));
    assert!(doc.read().script("ga-gtag").is_some());
}

#[tokio::test]
async fn test_published_page_lands_in_sitemap() {
    let manager = helpers::manager();
    let record = PluginRecord::new("sitemap-generator");
    let sitemap = Arc::new(plugin_marketing::build_sitemap(&record, &site()).expect("build"));
    manager.load_plugin(sitemap.clone()).await.expect("load");

    manager.hooks().add_filter(hooks::SITEMAP_URLS, "test", 10, |urls, _| {
        let mut list = urls.as_array().cloned().unwrap_or_default();
        list.push(json!({ "loc": "/injected" }));
        Ok(Value::Array(list))
    });
    manager.bus().emit(
        hooks::PAGE_PUBLISHED,
        json!({ "path": "/blog/launch", "lastmod": "2024-05-01" }),
    );

    let xml = sitemap.render_sitemap();
    assert!(xml.contains("<loc>https://acme.test/blog/launch</loc>"));
    assert!(xml.contains("<lastmod>2024-05-01</lastmod>"));
    assert!(xml.contains("<loc>https://acme.test/injected</loc>"));

    manager.unload_plugin("sitemap-generator").await.expect("unload");
    assert!(!sitemap.render_sitemap().contains("/injected"));
}

#[tokio::test]
async fn test_invalid_settings_fail_the_load() {
    let manager = helpers::manager();
    let doc = document();
    let record = PluginRecord::new("google-analytics")
        .with_settings(json!({ "measurementId": "not-an-id" }));
    let plugin = plugin_marketing::build_plugin(&record, doc.clone(), &site()).expect("build");

    let err = manager.load_plugin(plugin).await.expect_err("bad id");
    assert!(err.is(ErrorKind::Plugin));
    assert!(!manager.is_registered("google-analytics").await);
    assert!(doc.read().script("ga-gtag").is_none());
}

#[test]
fn test_unknown_record_is_not_found() {
    let err = plugin_marketing::build_plugin(&PluginRecord::new("mystery"), document(), &site())
        .expect_err("unknown plugin");
    assert!(err.is(ErrorKind::NotFound));
}
