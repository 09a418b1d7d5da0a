//! In-memory page document the marketing plugins write into.
//!
//! Stands in for the browser head: a title, meta tags, a canonical link,
//! JSON-LD blocks, and script tags, all keyed so each plugin can remove
//! exactly what it added.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document shared between the host and every plugin.
pub type SharedDocument = Arc<RwLock<PageDocument>>;

/// Whether a meta tag is keyed by `name` or by `property` (Open Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaAttribute {
    Name,
    Property,
}

/// One `<meta>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTag {
    pub attribute: MetaAttribute,
    pub key: String,
    pub content: String,
}

/// One external `<script src>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptTag {
    pub src: String,
    pub is_async: bool,
}

/// Head and body state of a single rendered page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageDocument {
    path: String,
    title: String,
    canonical: Option<String>,
    meta: BTreeMap<String, MetaTag>,
    json_ld: BTreeMap<String, Value>,
    scripts: BTreeMap<String, ScriptTag>,
    inline_scripts: BTreeMap<String, String>,
    body_text: String,
}

impl PageDocument {
    /// Creates an empty document for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Wraps the document for sharing.
    pub fn shared(self) -> SharedDocument {
        Arc::new(RwLock::new(self))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn canonical(&self) -> Option<&str> {
        self.canonical.as_deref()
    }

    pub fn set_canonical(&mut self, href: Option<String>) {
        self.canonical = href;
    }

    /// Sets a `<meta name=...>` tag, replacing any tag with the same key.
    pub fn set_meta_name(&mut self, name: &str, content: impl Into<String>) {
        self.insert_meta(MetaAttribute::Name, name, content.into());
    }

    /// Sets a `<meta property=...>` tag, replacing any tag with the same key.
    pub fn set_meta_property(&mut self, property: &str, content: impl Into<String>) {
        self.insert_meta(MetaAttribute::Property, property, content.into());
    }

    fn insert_meta(&mut self, attribute: MetaAttribute, key: &str, content: String) {
        self.meta.insert(
            key.to_string(),
            MetaTag {
                attribute,
                key: key.to_string(),
                content,
            },
        );
    }

    /// Content of the meta tag keyed `key`.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(|tag| tag.content.as_str())
    }

    pub fn remove_meta(&mut self, key: &str) -> bool {
        self.meta.remove(key).is_some()
    }

    pub fn meta_tags(&self) -> impl Iterator<Item = &MetaTag> {
        self.meta.values()
    }

    /// Inserts or replaces a JSON-LD block.
    pub fn set_json_ld(&mut self, id: &str, data: Value) {
        self.json_ld.insert(id.to_string(), data);
    }

    pub fn json_ld(&self, id: &str) -> Option<&Value> {
        self.json_ld.get(id)
    }

    pub fn remove_json_ld(&mut self, id: &str) -> bool {
        self.json_ld.remove(id).is_some()
    }

    pub fn json_ld_ids(&self) -> Vec<String> {
        self.json_ld.keys().cloned().collect()
    }

    /// Adds an async external script. Returns `false` if `id` already exists.
    pub fn add_script(&mut self, id: &str, src: impl Into<String>) -> bool {
        if self.scripts.contains_key(id) {
            return false;
        }
        self.scripts.insert(
            id.to_string(),
            ScriptTag {
                src: src.into(),
                is_async: true,
            },
        );
        true
    }

    pub fn script(&self, id: &str) -> Option<&ScriptTag> {
        self.scripts.get(id)
    }

    pub fn remove_script(&mut self, id: &str) -> bool {
        self.scripts.remove(id).is_some()
    }

    pub fn set_inline_script(&mut self, id: &str, body: impl Into<String>) {
        self.inline_scripts.insert(id.to_string(), body.into());
    }

    pub fn inline_script(&self, id: &str) -> Option<&str> {
        self.inline_scripts.get(id).map(String::as_str)
    }

    pub fn remove_inline_script(&mut self, id: &str) -> bool {
        self.inline_scripts.remove(id).is_some()
    }

    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    pub fn set_body_text(&mut self, text: impl Into<String>) {
        self.body_text = text.into();
    }

    /// Renders the `<head>` contents.
    pub fn render_head(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "<title>{}</title>", escape_html(&self.title));

        for tag in self.meta.values() {
            let attr = match tag.attribute {
                MetaAttribute::Name => "name",
                MetaAttribute::Property => "property",
            };
            let _ = writeln!(
                out,
                "<meta {}=\"{}\" content=\"{}\">",
                attr,
                escape_html(&tag.key),
                escape_html(&tag.content)
            );
        }

        if let Some(href) = &self.canonical {
            let _ = writeln!(out, "<link rel=\"canonical\" href=\"{}\">", escape_html(href));
        }

        for (id, script) in &self.scripts {
            let _ = writeln!(
                out,
                "<script id=\"{}\"{} src=\"{}\"></script>",
                escape_html(id),
                if script.is_async { " async" } else { "" },
                escape_html(&script.src)
            );
        }

        for (id, body) in &self.inline_scripts {
            let _ = writeln!(out, "<script id=\"{}\">{}</script>", escape_html(id), body);
        }

        for (id, data) in &self.json_ld {
            // `</` inside a script element would close it early.
            let json = data.to_string().replace("</", "<\\/");
            let _ = writeln!(
                out,
                "<script type=\"application/ld+json\" id=\"{}\">{}</script>",
                escape_html(id),
                json
            );
        }

        out
    }
}

/// Escapes text for use in HTML/XML content and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encodes a URL query component.
pub fn encode_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}
