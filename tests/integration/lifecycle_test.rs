//! Integration tests for dependency resolution and plugin lifecycle.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};

use siteplug_core::error::ErrorKind;
use siteplug_plugin::events::names;
use siteplug_plugin::registry::PluginRegistry;
use siteplug_plugin::traits::Plugin;

use crate::helpers::{self, CountingPlugin, COUNTER_HOOK};

#[tokio::test]
async fn test_single_plugin_activation_order() {
    let manager = helpers::manager();
    let seo = CountingPlugin::new("seo-tools", &[]);

    manager.register_plugin(seo.clone()).await.expect("register");
    manager.load_registered("seo-tools").await.expect("load");

    assert_eq!(manager.activation_order().await, vec!["seo-tools".to_string()]);
    assert!(manager.is_active("seo-tools").await);
    assert_eq!(seo.loads(), 1);
}

#[tokio::test]
async fn test_dependency_loaded_before_dependent() {
    let manager = helpers::manager();
    let a = CountingPlugin::new("plugin-a", &[]);
    let b = CountingPlugin::new("plugin-b", &["plugin-a"]);

    manager.register_plugin(a.clone()).await.expect("register a");
    manager.load_plugin(b.clone()).await.expect("load b");

    assert_eq!(
        manager.activation_order().await,
        vec!["plugin-a".to_string(), "plugin-b".to_string()]
    );
    assert_eq!(a.loads(), 1);
    assert_eq!(b.loads(), 1);

    let hooks = manager.hooks().hooks(COUNTER_HOOK);
    let owners: Vec<&str> = hooks.iter().map(|h| h.owner.as_str()).collect();
    assert_eq!(owners, vec!["plugin-a", "plugin-b"]);
}

#[tokio::test]
async fn test_unregister_blocked_then_ordered_unload() {
    let manager = helpers::manager();
    let a = CountingPlugin::new("plugin-a", &[]);
    let b = CountingPlugin::new("plugin-b", &["plugin-a"]);
    manager.register_plugin(a.clone()).await.expect("register a");
    manager.load_plugin(b.clone()).await.expect("load b");

    let err = manager
        .unregister_plugin("plugin-a")
        .await
        .expect_err("plugin-b depends on plugin-a");
    assert!(err.is(ErrorKind::Dependency));
    assert!(manager.is_active("plugin-a").await);

    let err = manager
        .unload_plugin("plugin-a")
        .await
        .expect_err("plugin-b still registered");
    assert!(err.is(ErrorKind::Dependency));

    manager.unload_plugin("plugin-b").await.expect("unload b");
    manager.unload_plugin("plugin-a").await.expect("unload a");

    assert!(manager.activation_order().await.is_empty());
    assert!(!manager.is_registered("plugin-a").await);
    assert!(!manager.is_registered("plugin-b").await);
    assert_eq!(a.unloads(), 1);
    assert_eq!(b.unloads(), 1);
    assert!(!manager.hooks().has_hook(COUNTER_HOOK));
}

#[tokio::test]
async fn test_transitive_dependencies_precede_requested_plugin() {
    let manager = helpers::manager();
    manager
        .register_plugin(CountingPlugin::new("base", &[]))
        .await
        .expect("register");
    manager
        .register_plugin(CountingPlugin::new("middle", &["base"]))
        .await
        .expect("register");
    manager
        .register_plugin(CountingPlugin::new("side", &["base"]))
        .await
        .expect("register");
    manager
        .register_plugin(CountingPlugin::new("top", &["middle", "side"]))
        .await
        .expect("register");

    manager.load_registered("top").await.expect("load top");

    let order = manager.activation_order().await;
    let index = |name: &str| order.iter().position(|n| n == name).expect("active");
    assert_eq!(order.len(), 4);
    assert!(index("base") < index("middle"));
    assert!(index("base") < index("side"));
    assert!(index("middle") < index("top"));
    assert!(index("side") < index("top"));
}

#[test]
fn test_resolution_places_every_dependency_first() {
    let mut registry = PluginRegistry::new();
    registry
        .register(CountingPlugin::new("d", &[]))
        .expect("register");
    registry
        .register(CountingPlugin::new("c", &["d"]))
        .expect("register");
    registry
        .register(CountingPlugin::new("b", &["d"]))
        .expect("register");
    registry
        .register(CountingPlugin::new("a", &["b", "c"]))
        .expect("register");

    for name in ["a", "b", "c", "d"] {
        let order = registry.resolve_dependencies(name).expect("acyclic");
        let own = order.iter().position(|n| n == name).expect("self included");
        assert_eq!(own, order.len() - 1);
        for dep in registry.dependencies(name) {
            let at = order.iter().position(|n| *n == dep).expect("dependency included");
            assert!(at < own, "{} must precede {}", dep, name);
        }
    }
}

#[test]
fn test_cycle_rejected_at_registration() {
    let mut registry = PluginRegistry::new();
    registry
        .register(CountingPlugin::new("alpha", &["gamma"]))
        .expect("missing dependency only warns");
    registry
        .register(CountingPlugin::new("beta", &["alpha"]))
        .expect("register");

    let err = registry
        .register(CountingPlugin::new("gamma", &["beta"]))
        .expect_err("closes a cycle");
    assert!(err.is(ErrorKind::Dependency));
    assert!(!registry.is_registered("gamma"));
    assert_eq!(registry.count(), 2);

    // gamma was rolled back, so alpha's dependency is missing again.
    let err = registry
        .resolve_dependencies("beta")
        .expect_err("missing dependency");
    assert!(err.is(ErrorKind::Dependency));
}

#[test]
fn test_unregister_fails_only_with_registered_dependents() {
    let mut registry = PluginRegistry::new();
    registry
        .register(CountingPlugin::new("core", &[]))
        .expect("register");
    registry
        .register(CountingPlugin::new("addon", &["core"]))
        .expect("register");
    registry
        .register(CountingPlugin::new("loner", &[]))
        .expect("register");

    let err = registry.unregister("core").expect_err("addon depends on core");
    assert!(err.is(ErrorKind::Dependency));
    assert_eq!(registry.count(), 3);
    assert!(registry.is_registered("core"));

    registry.unregister("loner").expect("no dependents");
    registry.unregister("addon").expect("no dependents");
    registry.unregister("core").expect("dependent gone");
    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_load_and_unload_are_idempotent() {
    let plugin = CountingPlugin::new("twice", &[]);
    let ctx = helpers::standalone_context("twice");

    plugin.load(&ctx).await.expect("first load");
    plugin.load(&ctx).await.expect("second load");
    assert_eq!(plugin.loads(), 1);
    assert_eq!(ctx.hooks().owner_hook_count("twice"), 1);

    plugin.unload(&ctx).await.expect("first unload");
    plugin.unload(&ctx).await.expect("second unload");
    assert_eq!(plugin.unloads(), 1);
    assert!(!plugin.is_loaded());
}

#[tokio::test]
async fn test_repeated_load_through_manager_is_a_no_op() {
    let manager = helpers::manager();
    let plugin = CountingPlugin::new("steady", &[]);
    manager.register_plugin(plugin.clone()).await.expect("register");

    manager.load_registered("steady").await.expect("load");
    manager.load_registered("steady").await.expect("load again");

    assert_eq!(plugin.loads(), 1);
    assert_eq!(manager.activation_order().await, vec!["steady".to_string()]);
}

#[tokio::test]
async fn test_failed_load_reports_and_rolls_back() {
    let manager = helpers::manager();
    let failures = Arc::new(Mutex::new(Vec::<Value>::new()));
    let sink = failures.clone();
    manager.bus().subscribe(names::PLUGIN_LOAD_FAILED, move |data| {
        sink.lock().push(data.clone());
        Ok(Value::Null)
    });

    let err = manager
        .load_plugin(CountingPlugin::failing("broken", &[]))
        .await
        .expect_err("load fails");
    assert!(err.is(ErrorKind::Plugin));

    assert!(!manager.is_registered("broken").await);
    assert!(manager.activation_order().await.is_empty());
    assert_eq!(manager.hooks().owner_hook_count("broken"), 0);

    let failures = failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["name"], json!("broken"));
    assert!(failures[0]["error"].as_str().unwrap_or_default().contains("refused"));
    assert!(failures[0]["durationMs"].is_number());
}

#[tokio::test]
async fn test_failed_dependent_keeps_activated_dependency() {
    let manager = helpers::manager();
    let base = CountingPlugin::new("base", &[]);
    manager.register_plugin(base.clone()).await.expect("register");

    manager
        .load_plugin(CountingPlugin::failing("fragile", &["base"]))
        .await
        .expect_err("load fails");

    assert_eq!(manager.activation_order().await, vec!["base".to_string()]);
    assert!(!manager.is_registered("fragile").await);
    assert_eq!(base.loads(), 1);
}

#[tokio::test]
async fn test_lifecycle_events_in_order() {
    let manager = helpers::manager();
    manager
        .load_plugin(CountingPlugin::new("watched", &[]))
        .await
        .expect("load");
    manager.unload_plugin("watched").await.expect("unload");

    let kinds: Vec<String> = manager
        .bus()
        .history()
        .into_iter()
        .filter(|e| e.source == names::MANAGER_SOURCE)
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            names::PLUGIN_ACTIVATED,
            names::PLUGIN_LOADED,
            names::PLUGIN_DEACTIVATED,
            names::PLUGIN_UNLOADED,
        ]
    );
}

#[tokio::test]
async fn test_unknown_plugin_operations_fail() {
    let manager = helpers::manager();

    let err = manager.load_registered("ghost").await.expect_err("unknown");
    assert!(err.is(ErrorKind::NotFound));
    let err = manager.unload_plugin("ghost").await.expect_err("unknown");
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_capability_lookup_and_status() {
    let manager = helpers::manager();
    manager
        .load_plugin(CountingPlugin::new("first", &[]))
        .await
        .expect("load");
    manager
        .register_plugin(CountingPlugin::new("second", &["first"]))
        .await
        .expect("register");

    let counters = manager.plugins_by_capability("counter").await;
    assert_eq!(counters.len(), 2);
    assert!(manager.plugins_by_capability("maps").await.is_empty());

    let status = manager.system_status().await;
    assert_eq!(status.registry.total_plugins, 2);
    assert_eq!(status.registry.active_plugins, 1);
    assert_eq!(status.registry.activation_order, vec!["first".to_string()]);
    assert!(manager.validate_dependencies().await.valid);
}

#[tokio::test]
async fn test_shutdown_unloads_everything() {
    let manager = helpers::manager();
    manager.initialize().await.expect("initialize");
    let a = CountingPlugin::new("a", &[]);
    let b = CountingPlugin::new("b", &["a"]);
    manager.register_plugin(a.clone()).await.expect("register");
    manager.load_plugin(b.clone()).await.expect("load");

    manager.shutdown().await;

    assert!(manager.activation_order().await.is_empty());
    assert_eq!(a.unloads(), 1);
    assert_eq!(b.unloads(), 1);
    assert_eq!(manager.bus().history_for(names::SYSTEM_SHUTDOWN).len(), 1);
}

#[tokio::test]
async fn test_shutdown_releases_dependency_of_inactive_dependent() {
    let manager = helpers::manager();
    let base = CountingPlugin::new("base", &[]);
    manager.register_plugin(base.clone()).await.expect("register");
    manager
        .register_plugin(CountingPlugin::failing("fragile", &["base"]))
        .await
        .expect("register");
    manager.load_registered("base").await.expect("load");
    manager
        .load_registered("fragile")
        .await
        .expect_err("fragile fails to load");
    assert!(manager.is_registered("fragile").await);

    manager.shutdown().await;

    assert_eq!(base.unloads(), 1);
    assert!(!base.is_loaded());
    assert!(manager.activation_order().await.is_empty());
    assert!(manager.registered_plugins().await.is_empty());
    assert!(manager.bus().history_for(names::PLUGIN_UNLOAD_FAILED).is_empty());
    let shutdown = manager.bus().history_for(names::SYSTEM_SHUTDOWN);
    assert_eq!(shutdown[0].data["unloaded"], json!(1));
}

#[tokio::test]
async fn test_shutdown_continues_past_failed_unload() {
    let manager = helpers::manager();
    let first = CountingPlugin::new("first", &[]);
    let stuck = CountingPlugin::stuck("stuck", &[]);
    let last = CountingPlugin::new("last", &[]);
    manager.load_plugin(first.clone()).await.expect("load");
    manager.load_plugin(stuck.clone()).await.expect("load");
    manager.load_plugin(last.clone()).await.expect("load");

    manager.shutdown().await;

    assert_eq!(first.unloads(), 1);
    assert_eq!(last.unloads(), 1);
    assert!(stuck.is_loaded());
    assert_eq!(manager.activation_order().await, vec!["stuck".to_string()]);
    assert!(manager.is_registered("stuck").await);
    assert!(!manager.is_registered("first").await);
    assert!(!manager.is_registered("last").await);

    let failed = manager.bus().history_for(names::PLUGIN_UNLOAD_FAILED);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].data["name"], json!("stuck"));
    assert_eq!(manager.bus().history_for(names::PLUGIN_UNLOADED).len(), 2);
    assert_eq!(manager.bus().history_for(names::SYSTEM_SHUTDOWN).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_share_one_dependency_activation() {
    const DEPENDENTS: usize = 8;
    let manager = Arc::new(helpers::manager());
    let base = CountingPlugin::new("base", &[]);
    manager.register_plugin(base.clone()).await.expect("register");

    let tasks: Vec<_> = (0..DEPENDENTS)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move {
                let name = format!("dep-{i}");
                manager
                    .load_plugin(CountingPlugin::new(&name, &["base"]))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("task joins").expect("load");
    }

    let order = manager.activation_order().await;
    assert_eq!(order.len(), DEPENDENTS + 1);
    assert_eq!(order[0], "base");
    assert_eq!(base.loads(), 1);
    assert_eq!(manager.bus().history_for(names::PLUGIN_ACTIVATED).len(), DEPENDENTS + 1);

    let tasks: Vec<_> = (0..DEPENDENTS)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.unload_plugin(&format!("dep-{i}")).await })
        })
        .collect();
    for task in tasks {
        task.await.expect("task joins").expect("unload");
    }
    assert_eq!(manager.activation_order().await, vec!["base".to_string()]);
    assert_eq!(base.unloads(), 0);

    manager.shutdown().await;
    assert_eq!(base.unloads(), 1);
    assert!(manager.registered_plugins().await.is_empty());
}
