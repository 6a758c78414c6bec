use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_TITLE: &str = "Untitled Product";
pub const DEFAULT_BRAND: &str = "Unknown";

/// Parse a price as stored in the catalogue: `24.99`, `"$1,299.00"`, ` 15 `.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.trim().parse::<f64>().ok().filter(|p| p.is_finite())
}

fn deserialize_optional_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        Float(f64),
        String(String),
        Null,
    }

    Ok(match StringOrFloat::deserialize(deserializer)? {
        StringOrFloat::Float(f) => Some(f),
        StringOrFloat::String(s) => parse_price(&s),
        StringOrFloat::Null => None,
    })
}

fn deserialize_image<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
        Null,
    }

    Ok(match StringOrVec::deserialize(deserializer)? {
        StringOrVec::String(s) => Some(s),
        StringOrVec::Vec(v) => v.into_iter().next(),
        StringOrVec::Null => None,
    }
    .filter(|s| !s.trim().is_empty()))
}

/// Metadata stored next to each product vector in the index.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductMetadata {
    #[serde(default)]
    pub uniq_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_price")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_image")]
    pub images: Option<String>,
}

impl ProductMetadata {
    pub fn from_value(value: Option<serde_json::Value>) -> serde_json::Result<Self> {
        match value {
            Some(value) if !value.is_null() => serde_json::from_value(value),
            _ => Ok(Self::default()),
        }
    }

    pub fn title(&self) -> &str {
        non_blank(self.title.as_deref()).unwrap_or(DEFAULT_TITLE)
    }

    pub fn brand(&self) -> &str {
        non_blank(self.brand.as_deref()).unwrap_or(DEFAULT_BRAND)
    }

    pub fn price(&self) -> f64 {
        self.price.unwrap_or(0.0)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// A recommended product, as returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub uniq_id: String,
    pub title: String,
    pub price: f64,
    pub brand: String,
    pub images: Option<String>,
    pub creative_description: String,
    pub similarity_score: f64,
}
