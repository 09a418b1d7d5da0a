//! Integration tests for hook priority, fault isolation, and owner cleanup.

use serde_json::{Value, json};

use siteplug_core::error::AppError;
use siteplug_plugin::hooks::registry::HookRegistry;

#[test]
fn test_throwing_filter_is_isolated() {
    let hooks = HookRegistry::new(10);
    hooks.add_filter("title", "broken", 1, |_, _| {
        Err(AppError::internal("always fails"))
    });
    hooks.add_filter("title", "healthy", 5, |value, _| {
        let title = value.as_str().unwrap_or_default();
        Ok(json!(title.to_uppercase()))
    });

    let result = hooks.apply_filters("title", json!("pricing"), &[]);

    assert_eq!(result, json!("PRICING"));
    assert_eq!(hooks.status().failures, 1);
}

#[test]
fn test_filters_run_in_priority_order_with_stable_ties() {
    let hooks = HookRegistry::new(10);
    let append = |suffix: &'static str| {
        move |value: Value, _: &[Value]| -> Result<Value, AppError> {
            Ok(json!(format!("{}{}", value.as_str().unwrap_or_default(), suffix)))
        }
    };
    hooks.add_filter("chain", "p", 20, append("c"));
    hooks.add_filter("chain", "p", 5, append("a"));
    hooks.add_filter("chain", "p", 10, append("b1"));
    hooks.add_filter("chain", "p", 10, append("b2"));

    assert_eq!(hooks.apply_filters("chain", json!(""), &[]), json!("ab1b2c"));
}

#[test]
fn test_filter_receives_extra_arguments() {
    let hooks = HookRegistry::new(10);
    hooks.add_filter("price", "shop", 10, |value, extra| {
        let base = value.as_f64().unwrap_or_default();
        let rate = extra.first().and_then(Value::as_f64).unwrap_or(1.0);
        Ok(json!(base * rate))
    });

    assert_eq!(hooks.apply_filters("price", json!(10.0), &[json!(1.5)]), json!(15.0));
    assert_eq!(hooks.apply_filters("unknown", json!("same"), &[]), json!("same"));
}

#[test]
fn test_remove_owner_hooks_leaves_other_owners() {
    let hooks = HookRegistry::new(10);
    for name in ["seo:title", "seo:meta", "sitemap:urls"] {
        hooks.add_filter(name, "seo-tools", 10, |v, _| Ok(v));
        hooks.add_filter(name, "keyword-tagging", 20, |v, _| Ok(v));
    }
    hooks.add_action("seo:refresh", "seo-tools", 10, |_| Ok(()));

    let removed = hooks.remove_owner_hooks("seo-tools");

    assert_eq!(removed, 4);
    assert_eq!(hooks.owner_hook_count("seo-tools"), 0);
    assert_eq!(hooks.owner_hook_count("keyword-tagging"), 3);
    for name in ["seo:title", "seo:meta", "sitemap:urls"] {
        let owners: Vec<String> = hooks.hooks(name).into_iter().map(|h| h.owner).collect();
        assert_eq!(owners, vec!["keyword-tagging".to_string()]);
    }
    assert!(!hooks.has_hook("seo:refresh"));
}

#[test]
fn test_failing_action_does_not_block_later_actions() {
    let hooks = HookRegistry::new(10);
    let log = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    hooks.add_action("publish", "a", 1, |_| Err(AppError::internal("nope")));
    let sink = log.clone();
    hooks.add_action("publish", "b", 2, move |args| {
        sink.lock().push(args.len());
        Ok(())
    });

    hooks.do_action("publish", &[json!(1), json!(2)]);

    assert_eq!(*log.lock(), vec![2]);
}
