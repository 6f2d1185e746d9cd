//! The built-in skin catalog.
//!
//! The catalog is an external JSON list of library skins:
//!
//! ```json
//! {
//!   "categories": ["Base", "Clothing"],
//!   "skins": [
//!     { "name": "Steve", "src": "skins/steve.png", "category": "Base" },
//!     { "name": "Hoodie", "src": "skins/hoodie.png", "category": "Clothing",
//!       "credits": "https://example.com/artist" }
//!   ]
//! }
//! ```
//!
//! `credits` is opaque attribution and is carried through to layers as-is.

use serde::{Deserialize, Serialize};

/// One library skin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct CatalogSkin {
    pub name: String,
    pub src: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<String>,
}

/// The full catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct SkinCatalog {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub skins: Vec<CatalogSkin>,
}

impl SkinCatalog {
    /// Deserializes a catalog from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Skins in a category, in catalog order.
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a CatalogSkin> {
        self.skins.iter().filter(move |skin| skin.category == category)
    }

    /// Finds a skin by display name.
    pub fn find(&self, name: &str) -> Option<&CatalogSkin> {
        self.skins.iter().find(|skin| skin.name == name)
    }

    /// Finds a skin by source reference.
    pub fn find_by_src(&self, src: &str) -> Option<&CatalogSkin> {
        self.skins.iter().find(|skin| skin.src == src)
    }
}
