use titlecase::titlecase;
use tracing::warn;

use super::intent::{Intent, ParsedIntent};
use crate::llm::LanguageModel;

pub(crate) const FALLBACK_ANSWER: &str =
    "I'm unable to provide a clear answer right now. Please try again later.";
pub(crate) const NO_SUMMARIES: &str = "No specific event summaries found.";

fn prompt(user_query: &str, parsed: &ParsedIntent, context: &str) -> String {
    let base = format!(
        "
You are a helpful travel assistant and disaster information provider for India.
User query: \"{user_query}\"
Relevant events from the last 4 days: {context}
"
    );
    match (parsed.intent, &parsed.from, &parsed.to) {
        (Intent::Route, Some(from), Some(to)) => format!(
            "{base}
Based on the user query asking about a route from {} to {} and the relevant events, provide a concise and helpful answer regarding the route.
Clearly state if there are potential impacts on the route (e.g., delays, diversions, closures) due to these events.
Suggest checking local news or authorities for real-time updates if impacts are significant.
If no relevant disruptive events are found, state that the route appears clear based on available information for the last 4 days.
",
            titlecase(from),
            titlecase(to),
        ),
        _ => format!(
            "{base}
Give a concise, helpful answer about the events, focusing on the user's original query.
If no specific events are found for an info query, state that clearly.
"
        ),
    }
}

/// Asks the model for the final answer; falls back to a fixed apology.
pub(crate) async fn synthesize(
    model: &dyn LanguageModel,
    user_query: &str,
    parsed: &ParsedIntent,
    context: &str,
) -> String {
    match model.generate(&prompt(user_query, parsed, context)).await {
        Ok(answer) => answer.trim().to_string(),
        Err(e) => {
            warn!("Answer generation failed: {e:#}");
            FALLBACK_ANSWER.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;

    fn route() -> ParsedIntent {
        ParsedIntent {
            intent: Intent::Route,
            from: Some("new delhi".to_string()),
            to: Some("manali".to_string()),
            ..ParsedIntent::default()
        }
    }

    #[test]
    fn route_prompt_names_endpoints() {
        let text = prompt("road from Delhi to Manali", &route(), NO_SUMMARIES);
        assert!(text.contains("route from New Delhi to Manali"));
        assert!(text.contains(NO_SUMMARIES));
    }

    #[test]
    fn route_prompt_keeps_small_words_lower_case() {
        let parsed = ParsedIntent {
            intent: Intent::Route,
            from: Some("port of spain".to_string()),
            to: Some("san fernando".to_string()),
            ..ParsedIntent::default()
        };
        let text = prompt("road from port of spain to san fernando", &parsed, "ctx");
        assert!(text.contains("route from Port of Spain to San Fernando"));
    }

    #[test]
    fn info_prompt_without_endpoints() {
        let mut parsed = route();
        parsed.to = None;
        let text = prompt("road from Delhi", &parsed, "rain");
        assert!(text.contains("focusing on the user's original query"));
        assert!(!text.contains("route from"));
    }

    #[tokio::test]
    async fn answer_is_trimmed_or_apologizes() {
        let model = ScriptedModel::default().reply("travel assistant", "  Roads are clear.\n");
        assert_eq!(
            synthesize(&model, "q", &route(), "ctx").await,
            "Roads are clear."
        );

        let failing = ScriptedModel::default().fail("travel assistant");
        assert_eq!(
            synthesize(&failing, "q", &route(), "ctx").await,
            FALLBACK_ANSWER
        );
    }
}
