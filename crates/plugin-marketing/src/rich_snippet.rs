//! schema.org JSON-LD blocks: Organization, WebSite, FAQPage, BreadcrumbList.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use siteplug_core::error::AppError;
use siteplug_core::result::AppResult;
use siteplug_plugin::api::context::PluginContext;
use siteplug_plugin::traits::{LoadGuard, Plugin, PluginMetadata};

use crate::document::SharedDocument;
use crate::seo;

pub const PLUGIN_NAME: &str = "rich-snippets";

const SCHEMA_CONTEXT: &str = "https://schema.org";
const ORGANIZATION_ID: &str = "ld-organization";
const WEBSITE_ID: &str = "ld-website";
const FAQ_ID: &str = "ld-faq";
const BREADCRUMB_ID: &str = "ld-breadcrumbs";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Organization {
    pub name: String,
    pub url: String,
    pub logo: Option<String>,
    /// Social profile URLs.
    pub same_as: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSite {
    pub name: String,
    pub url: String,
    /// Search URL containing `{search_term_string}`; enables SearchAction.
    pub search_url_template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub name: String,
    pub url: String,
}

/// Settings stored in the plugin record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RichSnippetSettings {
    pub organization: Organization,
    pub website: WebSite,
    pub faq: Vec<FaqEntry>,
    pub breadcrumbs: Vec<Breadcrumb>,
}

impl RichSnippetSettings {
    pub fn validate(&self) -> AppResult<()> {
        if self.organization.name.trim().is_empty() {
            return Err(AppError::validation("Organization name is required"));
        }
        if let Some(template) = &self.website.search_url_template {
            if !template.contains("{search_term_string}") {
                return Err(AppError::validation(
                    "Search URL template must contain {search_term_string}",
                ));
            }
        }
        Ok(())
    }
}

pub fn organization_schema(org: &Organization) -> Value {
    let mut schema = json!({
        "@context": SCHEMA_CONTEXT,
        "@type": "Organization",
        "name": org.name,
        "url": org.url,
    });
    if let Some(logo) = &org.logo {
        schema["logo"] = json!(logo);
    }
    if !org.same_as.is_empty() {
        schema["sameAs"] = json!(org.same_as);
    }
    schema
}

pub fn website_schema(site: &WebSite) -> Value {
    let mut schema = json!({
        "@context": SCHEMA_CONTEXT,
        "@type": "WebSite",
        "name": site.name,
        "url": site.url,
    });
    if let Some(template) = &site.search_url_template {
        schema["potentialAction"] = json!({
            "@type": "SearchAction",
            "target": template,
            "query-input": "required name=search_term_string",
        });
    }
    schema
}

pub fn faq_schema(entries: &[FaqEntry]) -> Value {
    let questions: Vec<Value> = entries
        .iter()
        .map(|entry| {
            json!({
                "@type": "Question",
                "name": entry.question,
                "acceptedAnswer": { "@type": "Answer", "text": entry.answer },
            })
        })
        .collect();
    json!({
        "@context": SCHEMA_CONTEXT,
        "@type": "FAQPage",
        "mainEntity": questions,
    })
}

pub fn breadcrumb_schema(crumbs: &[Breadcrumb]) -> Value {
    let items: Vec<Value> = crumbs
        .iter()
        .enumerate()
        .map(|(i, crumb)| {
            json!({
                "@type": "ListItem",
                "position": i + 1,
                "name": crumb.name,
                "item": crumb.url,
            })
        })
        .collect();
    json!({
        "@context": SCHEMA_CONTEXT,
        "@type": "BreadcrumbList",
        "itemListElement": items,
    })
}

/// Injects structured data blocks into the document.
#[derive(Debug)]
pub struct RichSnippetsPlugin {
    settings: RichSnippetSettings,
    document: SharedDocument,
    guard: LoadGuard,
}

impl RichSnippetsPlugin {
    pub fn new(settings: RichSnippetSettings, document: SharedDocument) -> Self {
        Self {
            settings,
            document,
            guard: LoadGuard::new(),
        }
    }

    /// Every block this plugin injects, keyed by element id.
    pub fn blocks(&self) -> Vec<(&'static str, Value)> {
        let mut blocks = vec![
            (ORGANIZATION_ID, organization_schema(&self.settings.organization)),
            (WEBSITE_ID, website_schema(&self.settings.website)),
        ];
        if !self.settings.faq.is_empty() {
            blocks.push((FAQ_ID, faq_schema(&self.settings.faq)));
        }
        if !self.settings.breadcrumbs.is_empty() {
            blocks.push((BREADCRUMB_ID, breadcrumb_schema(&self.settings.breadcrumbs)));
        }
        blocks
    }
}

#[async_trait]
impl Plugin for RichSnippetsPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(PLUGIN_NAME, "1.0.0")
            .with_description("schema.org structured data as JSON-LD")
            .with_capabilities(["structured-data", "json-ld"])
            .depends_on([seo::PLUGIN_NAME])
    }

    async fn load(&self, _ctx: &PluginContext) -> AppResult<()> {
        if self.guard.is_loaded() {
            return Ok(());
        }
        self.settings.validate()?;

        let blocks = self.blocks();
        let count = blocks.len();
        let mut doc = self.document.write();
        for (id, data) in blocks {
            doc.set_json_ld(id, data);
        }
        drop(doc);

        self.guard.mark_loaded();
        info!(blocks = count, "Structured data injected");
        Ok(())
    }

    async fn unload(&self, _ctx: &PluginContext) -> AppResult<()> {
        if !self.guard.is_loaded() {
            return Ok(());
        }
        let mut doc = self.document.write();
        for id in [ORGANIZATION_ID, WEBSITE_ID, FAQ_ID, BREADCRUMB_ID] {
            doc.remove_json_ld(id);
        }
        drop(doc);

        self.guard.mark_unloaded();
        debug!("Structured data removed");
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.guard.is_loaded()
    }
}
