use tracing::warn;

use crate::llm::{parse_json, LanguageModel};

fn prompt(place: &str) -> String {
    format!(
        r#"
You are an Indian geography expert.
Return a JSON list (max 10) of city / district / area names that are
very close or commonly considered the same region as "{place}".
The list must include the original name.
Return only valid JSON, nothing else.
Example for "delhi": ["delhi", "new delhi", "ncr", "gurugram", "ghaziabad", "noida"]
"#
    )
}

/// Expands `place` into nearby or equivalent names, lower-cased.
///
/// Never fails: the normalized input is always the first element, so a
/// model error or unparseable reply degrades to `[place]`.
pub(crate) async fn nearby_places(model: &dyn LanguageModel, place: &str) -> Vec<String> {
    let original = place.trim().to_lowercase();
    let mut places = vec![original.clone()];

    let aliases = match model.generate(&prompt(place)).await {
        Ok(raw) => parse_json::<Vec<String>>(&raw),
        Err(e) => Err(e),
    };
    match aliases {
        Ok(aliases) => {
            for alias in aliases {
                let alias = alias.trim().to_lowercase();
                if !alias.is_empty() && !places.contains(&alias) {
                    places.push(alias);
                }
            }
        }
        Err(e) => warn!("Alias expansion failed for '{place}': {e:#}"),
    }
    places
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;

    #[tokio::test]
    async fn normalizes_and_keeps_original() {
        let model = ScriptedModel::default().reply(
            "region as \"delhi\"",
            "```json\n[\"New Delhi\", \" NCR \", \"\", \"delhi\", \"new delhi\"]\n```",
        );
        let places = nearby_places(&model, "delhi").await;
        assert_eq!(places, ["delhi", "new delhi", "ncr"]);
    }

    #[tokio::test]
    async fn original_is_added_when_model_omits_it() {
        let model = ScriptedModel::default().reply("region as \" Manali\"", r#"["kullu"]"#);
        let places = nearby_places(&model, " Manali").await;
        assert_eq!(places, ["manali", "kullu"]);
    }

    #[tokio::test]
    async fn falls_back_to_input() {
        let failing = ScriptedModel::default();
        assert_eq!(nearby_places(&failing, "  Chennai ").await, ["chennai"]);

        let garbage = ScriptedModel::default().reply("geography", "chennai, tambaram");
        assert_eq!(nearby_places(&garbage, "Chennai").await, ["chennai"]);

        let wrong_shape = ScriptedModel::default().reply("geography", r#"{"places": ["x"]}"#);
        assert_eq!(nearby_places(&wrong_shape, "Chennai").await, ["chennai"]);
    }
}
