use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::llm::{parse_json, LanguageModel};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Intent {
    Route,
    #[default]
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct Coords {
    pub(crate) lat: f64,
    pub(crate) lng: f64,
}

/// What the model understood from a user query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct ParsedIntent {
    pub(crate) intent: Intent,
    pub(crate) from: Option<String>,
    pub(crate) to: Option<String>,
    pub(crate) from_coords: Option<Coords>,
    pub(crate) to_coords: Option<Coords>,
}

/// The model's reply before normalization; every field is optional and
/// loosely typed because the model is.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Extraction {
    intent: Option<Value>,
    from: Option<Value>,
    to: Option<Value>,
    from_latlng: Option<Value>,
    to_latlng: Option<Value>,
}

impl From<Extraction> for ParsedIntent {
    fn from(raw: Extraction) -> Self {
        let intent = match raw.intent.as_ref().and_then(Value::as_str) {
            Some(s) if s.trim().eq_ignore_ascii_case("route") => Intent::Route,
            _ => Intent::Info,
        };
        Self {
            intent,
            from: raw.from.as_ref().and_then(place_name),
            to: raw.to.as_ref().and_then(place_name),
            from_coords: raw.from_latlng.as_ref().and_then(coords),
            to_coords: raw.to_latlng.as_ref().and_then(coords),
        }
    }
}

fn place_name(value: &Value) -> Option<String> {
    let name = value.as_str()?.trim().to_lowercase();
    (!name.is_empty()).then_some(name)
}

fn coords(value: &Value) -> Option<Coords> {
    match value.as_array()?.as_slice() {
        [lat, lng] => Some(Coords {
            lat: lat.as_f64()?,
            lng: lng.as_f64()?,
        }),
        _ => None,
    }
}

fn prompt(user_query: &str) -> String {
    format!(
        r#"
You are a travel route and location extractor for India.

Given this user query:
"{user_query}"

Extract:
- intent: "route" or "info"
- from: name of origin place (nullable)
- to: name of destination place (nullable)
- from_latlng: coordinates of the origin (nullable), as [lat, lng]
- to_latlng: coordinates of the destination (nullable), as [lat, lng]

Return a JSON object like:
{{
  "intent": "route",
  "from": "delhi",
  "to": "manali",
  "from_latlng": [28.6139, 77.2090],
  "to_latlng": [32.2432, 77.1892]
}}

If the query doesn't specify a route, set intent to "info" and latlng fields to null.
Return only valid JSON, nothing else.
"#
    )
}

/// Classifies `user_query`. Any model or parse failure yields the default
/// `info` intent with no places.
pub(crate) async fn extract_intent(model: &dyn LanguageModel, user_query: &str) -> ParsedIntent {
    let raw = match model.generate(&prompt(user_query)).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Intent extraction failed: {e:#}");
            return ParsedIntent::default();
        }
    };
    match parse_json::<Extraction>(&raw) {
        Ok(extraction) => extraction.into(),
        Err(e) => {
            warn!("Cannot parse intent extraction: {e:#}");
            ParsedIntent::default()
        }
    }
}
