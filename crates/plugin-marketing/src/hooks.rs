//! Hook and event names shared by the marketing plugins.

/// Filter: page title before it is written to the document.
pub const SEO_TITLE: &str = "seo:title";
/// Action: set one meta tag. Argument: `{ "name" | "property", "content" }`.
pub const SEO_META: &str = "seo:meta";
/// Filter: keyword list before it is written to the `keywords` meta tag.
pub const SEO_KEYWORDS: &str = "seo:keywords";
/// Action: recompute the filtered tags (title, keywords) and rewrite them.
pub const SEO_REFRESH: &str = "seo:refresh";
/// Filter: URL entries before they are rendered into sitemap.xml.
pub const SITEMAP_URLS: &str = "sitemap:urls";

/// Event: a page was viewed. Payload: `{ "path", "title"? }`.
pub const PAGE_VIEW: &str = "page:view";
/// Event: a page was published. Payload: `{ "path", "lastmod"? }`.
pub const PAGE_PUBLISHED: &str = "page:published";
/// Event: a custom analytics event. Payload: `{ "name", "params"? }`.
pub const ANALYTICS_EVENT: &str = "analytics:event";
/// Event: keyword analysis finished for the current document.
pub const CONTENT_ANALYZED: &str = "content:analyzed";
