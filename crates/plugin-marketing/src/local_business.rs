//! Google Maps / Places widget and LocalBusiness structured data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use siteplug_core::error::AppError;
use siteplug_core::result::AppResult;
use siteplug_plugin::api::context::PluginContext;
use siteplug_plugin::traits::{LoadGuard, Plugin, PluginMetadata};

use crate::document::{SharedDocument, encode_component};

pub const PLUGIN_NAME: &str = "local-business";

const MAPS_SCRIPT_ID: &str = "maps-api";
const JSON_LD_ID: &str = "ld-local-business";
const MAPS_JS_URL: &str = "https://maps.googleapis.com/maps/api/js";
const MAPS_EMBED_URL: &str = "https://www.google.com/maps/embed/v1/place";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostalAddress {
    pub street: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// The business shown on the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessProfile {
    pub name: String,
    /// schema.org type, e.g. `Restaurant`; `LocalBusiness` by default.
    pub business_type: String,
    pub phone: Option<String>,
    pub url: Option<String>,
    pub address: PostalAddress,
    pub geo: Option<GeoPoint>,
    /// schema.org `openingHours` strings, e.g. `Mo-Fr 09:00-17:00`.
    pub opening_hours: Vec<String>,
}

impl Default for BusinessProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            business_type: "LocalBusiness".into(),
            phone: None,
            url: None,
            address: PostalAddress::default(),
            geo: None,
            opening_hours: Vec::new(),
        }
    }
}

/// Settings stored in the plugin record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalBusinessSettings {
    pub api_key: String,
    pub place_id: String,
    pub zoom: u8,
    pub business: BusinessProfile,
}

impl Default for LocalBusinessSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            place_id: String::new(),
            zoom: 15,
            business: BusinessProfile::default(),
        }
    }
}

impl LocalBusinessSettings {
    pub fn validate(&self) -> AppResult<()> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(AppError::validation("Google Places API key is required"));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(AppError::validation("Google Places API key contains whitespace"));
        }
        if self.place_id.trim().is_empty() {
            return Err(AppError::validation("Google Place id is required"));
        }
        if !(1..=21).contains(&self.zoom) {
            return Err(AppError::validation(format!(
                "Map zoom {} is outside 1..=21",
                self.zoom
            )));
        }
        if let Some(geo) = self.business.geo {
            if !(-90.0..=90.0).contains(&geo.latitude) || !(-180.0..=180.0).contains(&geo.longitude)
            {
                return Err(AppError::validation("Business coordinates are out of range"));
            }
        }
        Ok(())
    }
}

/// Builds the LocalBusiness JSON-LD for `profile`.
pub fn local_business_schema(profile: &BusinessProfile) -> Value {
    let business_type = if profile.business_type.is_empty() {
        "LocalBusiness"
    } else {
        profile.business_type.as_str()
    };
    let address = &profile.address;
    let mut schema = json!({
        "@context": "https://schema.org",
        "@type": business_type,
        "name": profile.name,
        "address": {
            "@type": "PostalAddress",
            "streetAddress": address.street,
            "addressLocality": address.city,
            "addressRegion": address.region,
            "postalCode": address.postal_code,
            "addressCountry": address.country,
        },
    });
    if let Some(phone) = &profile.phone {
        schema["telephone"] = json!(phone);
    }
    if let Some(url) = &profile.url {
        schema["url"] = json!(url);
    }
    if let Some(geo) = profile.geo {
        schema["geo"] = json!({
            "@type": "GeoCoordinates",
            "latitude": geo.latitude,
            "longitude": geo.longitude,
        });
    }
    if !profile.opening_hours.is_empty() {
        schema["openingHours"] = json!(profile.opening_hours);
    }
    schema
}

/// Injects the Maps loader and the business's structured data.
#[derive(Debug)]
pub struct LocalBusinessPlugin {
    settings: LocalBusinessSettings,
    document: SharedDocument,
    guard: LoadGuard,
}

impl LocalBusinessPlugin {
    pub fn new(settings: LocalBusinessSettings, document: SharedDocument) -> Self {
        Self {
            settings,
            document,
            guard: LoadGuard::new(),
        }
    }

    /// Maps JavaScript API loader with the Places library.
    pub fn script_url(&self) -> String {
        format!(
            "{}?key={}&libraries=places",
            MAPS_JS_URL,
            encode_component(self.settings.api_key.trim())
        )
    }

    /// URL for an embedded map iframe centred on the place.
    pub fn embed_url(&self) -> String {
        format!(
            "{}?key={}&q={}&zoom={}",
            MAPS_EMBED_URL,
            encode_component(self.settings.api_key.trim()),
            encode_component(&format!("place_id:{}", self.settings.place_id.trim())),
            self.settings.zoom
        )
    }
}

#[async_trait]
impl Plugin for LocalBusinessPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(PLUGIN_NAME, "1.0.0")
            .with_description("Google Maps widget and LocalBusiness structured data")
            .with_capabilities(["local", "maps"])
    }

    async fn load(&self, _ctx: &PluginContext) -> AppResult<()> {
        if self.guard.is_loaded() {
            return Ok(());
        }
        self.settings.validate()?;

        {
            let mut doc = self.document.write();
            doc.add_script(MAPS_SCRIPT_ID, self.script_url());
            doc.set_json_ld(JSON_LD_ID, local_business_schema(&self.settings.business));
        }

        self.guard.mark_loaded();
        info!(place_id = %self.settings.place_id, "Local business widget injected");
        Ok(())
    }

    async fn unload(&self, _ctx: &PluginContext) -> AppResult<()> {
        if !self.guard.is_loaded() {
            return Ok(());
        }
        {
            let mut doc = self.document.write();
            doc.remove_script(MAPS_SCRIPT_ID);
            doc.remove_json_ld(JSON_LD_ID);
        }
        self.guard.mark_unloaded();
        debug!("Local business widget removed");
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
    use std::sync::Arc;

    fn settings() -> LocalBusinessSettings {
        LocalBusinessSettings {
            api_key: "AIzaTEST".into(),
            place_id: "ChIJN1t_tDeuEmsRUsoyG83frY4".into(),
            business: BusinessProfile {
                name: "Acme Bakery".into(),
                business_type: "Bakery".into(),
                phone: Some("+1-555-0100".into()),
                geo: Some(GeoPoint { latitude: 40.7, longitude: -74.0 }),
                opening_hours: vec!["Mo-Fr 07:00-18:00".into()],
                ..BusinessProfile::default()
            },
            ..LocalBusinessSettings::default()
        }
    }

    #[test]
    fn test_validation() {
        assert!(settings().validate().is_ok());
        let mut missing_key = settings();
        missing_key.api_key.clear();
        assert_eq!(missing_key.validate().unwrap_err().kind, ErrorKind::Validation);
        let mut missing_place = settings();
        missing_place.place_id = "  ".into();
        assert!(missing_place.validate().is_err());
        let mut bad_geo = settings();
        bad_geo.business.geo = Some(GeoPoint { latitude: 95.0, longitude: 0.0 });
        assert!(bad_geo.validate().is_err());
    }

    #[test]
    fn test_urls() {
        let plugin = LocalBusinessPlugin::new(settings(), PageDocument::new("/").shared());
        assert_eq!(
            plugin.script_url(),
            "https://maps.googleapis.com/maps/api/js?key=AIzaTEST&libraries=places"
        );
        assert_eq!(
            plugin.embed_url(),
            "https://www.google.com/maps/embed/v1/place?key=AIzaTEST\
             &q=place_id%3AChIJN1t_tDeuEmsRUsoyG83frY4&zoom=15"
        );
    }

    #[test]
    fn test_schema() {
        let schema = local_business_schema(&settings().business);
        assert_eq!(schema["@type"], "Bakery");
        assert_eq!(schema["telephone"], "+1-555-0100");
        assert_eq!(schema["geo"]["@type"], "GeoCoordinates");
        assert_eq!(schema["address"]["@type"], "PostalAddress");
        assert!(schema.get("url").is_none());
    }

    #[tokio::test]
    async fn test_load_and_unload() {
        let document = PageDocument::new("/contact").shared();
        let plugin = LocalBusinessPlugin::new(settings(), document.clone());
        let ctx = PluginContext::new(
            PLUGIN_NAME,
            Arc::new(EventBus::default()),
            Arc::new(HookRegistry::new(10)),
        );

        plugin.load(&ctx).await.unwrap();
        assert!(document.read().script(MAPS_SCRIPT_ID).is_some());
        assert!(document.read().json_ld(JSON_LD_ID).is_some());

        plugin.unload(&ctx).await.unwrap();
        assert!(document.read().script(MAPS_SCRIPT_ID).is_none());
        assert!(document.read().json_ld(JSON_LD_ID).is_none());
    }
}
