use tracing::warn;

use crate::llm::{parse_keywords, LanguageModel};

const MAX_KEYWORDS: usize = 3;

/// Example keywords shown to the model for info queries.
pub(crate) const LOCAL_EVENT_EXAMPLE: &str = "landslide, flood, fire";
pub(crate) const GENERAL_EVENT_EXAMPLE: &str = "traffic, weather, disaster";

/// Generic disruption keywords for travel between two places.
pub(crate) async fn route_keywords(model: &dyn LanguageModel, from: &str, to: &str) -> Vec<String> {
    let prompt = format!(
        "
Given a travel route between {from} and {to}, what are 3 general keywords for potential road or travel disruptions?
Consider terms like 'roadblock', 'traffic', 'landslide', 'flood', 'accident', 'closure'.
Return comma separated. Example: landslide, traffic, road closure
"
    );
    keywords(model, &prompt, "route").await
}

/// Event-type keywords found in a free-text query.
pub(crate) async fn event_keywords(
    model: &dyn LanguageModel,
    user_query: &str,
    example: &str,
) -> Vec<String> {
    let prompt = format!(
        "
Extract up to 3 general keywords from the query: \"{user_query}\" that describe types of events.
Return comma separated. Example: {example}
"
    );
    keywords(model, &prompt, "info").await
}

async fn keywords(model: &dyn LanguageModel, prompt: &str, kind: &str) -> Vec<String> {
    match model.generate(prompt).await {
        Ok(raw) => parse_keywords(&raw, MAX_KEYWORDS),
        Err(e) => {
            warn!("Keyword generation for {kind} query failed: {e:#}");
            Vec::new()
        }
    }
}
