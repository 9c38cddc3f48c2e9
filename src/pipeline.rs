pub(crate) mod answer;
pub(crate) mod intent;
pub(crate) mod keywords;
pub(crate) mod places;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, instrument};

use self::{
    answer::{synthesize, NO_SUMMARIES},
    intent::{extract_intent, Intent, ParsedIntent},
    keywords::{event_keywords, route_keywords, GENERAL_EVENT_EXAMPLE, LOCAL_EVENT_EXAMPLE},
    places::nearby_places,
};
use crate::{
    database::{filter::EVENT_SUMMARY, Database, Document, EventFilter, QueryLogEntry, TrailingWindow},
    llm::LanguageModel,
};

pub(crate) const INCOMPLETE_ROUTE: &str = "Please specify both origin and destination for a route query. Example: 'road from Delhi to Manali'";
pub(crate) const NO_MATCHES: &str =
    "No significant events matched your criteria in the last 4 days.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Endpoint {
    pub(crate) name: Option<String>,
    pub(crate) lat: f64,
    pub(crate) lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Route {
    pub(crate) from: Option<Endpoint>,
    pub(crate) to: Option<Endpoint>,
}

/// Body of a successful `/ask` reply.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AskResponse {
    pub(crate) answer: String,
    pub(crate) events: Vec<Document>,
    pub(crate) intent: Intent,
    pub(crate) route: Route,
}

/// Turns a user query into matched events and a generated answer.
pub(crate) struct Pipeline {
    model: Arc<dyn LanguageModel>,
    database: Database,
    fixed_date: Option<NaiveDate>,
}

impl Pipeline {
    pub(crate) fn new(model: Arc<dyn LanguageModel>, database: Database) -> Self {
        Self {
            model,
            database,
            fixed_date: None,
        }
    }

    #[cfg(test)]
    fn on_date(mut self, date: NaiveDate) -> Self {
        self.fixed_date = Some(date);
        self
    }

    fn today(&self) -> NaiveDate {
        self.fixed_date.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Answers a non-empty, trimmed query and records it in the audit log.
    #[instrument(skip(self), fields(intent))]
    pub(crate) async fn ask(&self, user_query: &str, ip: Option<String>) -> AskResponse {
        let model = self.model.as_ref();
        let mut parsed = extract_intent(model, user_query).await;
        tracing::Span::current().record("intent", tracing::field::debug(parsed.intent));

        let (filter, mut docs) = self
            .select_events(user_query, &mut parsed, TrailingWindow::ending(self.today()))
            .await;
        if docs.is_empty() {
            docs = vec![placeholder(NO_MATCHES)];
        }

        let summaries: Vec<&str> = docs
            .iter()
            .filter_map(|d| d.get(EVENT_SUMMARY).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .collect();
        let context = if summaries.is_empty() {
            NO_SUMMARIES.to_string()
        } else {
            summaries.join("\n")
        };

        let answer = synthesize(model, user_query, &parsed, &context).await;

        let entry = QueryLogEntry {
            query: user_query.to_string(),
            intent_parsed: serde_json::to_value(&parsed).unwrap_or_default(),
            timestamp: Utc::now(),
            ip,
            mongo_filter_used: filter.to_value(),
            found_events_count: docs.len(),
            generated_answer: answer.clone(),
        };
        if let Err(e) = self.database.log_query(&entry) {
            error!("Cannot write query log: {e:#}");
        }
        info!(found = docs.len(), "Answered query");

        AskResponse {
            answer,
            events: docs.into_iter().map(without_id).collect(),
            intent: parsed.intent,
            route: Route {
                from: parsed.from_coords.map(|c| Endpoint {
                    name: parsed.from.clone(),
                    lat: c.lat,
                    lng: c.lng,
                }),
                to: parsed.to_coords.map(|c| Endpoint {
                    name: parsed.to.clone(),
                    lat: c.lat,
                    lng: c.lng,
                }),
            },
        }
    }

    /// Builds the effective filter for `parsed` and runs it, applying the
    /// route keyword fallback. May rewrite `parsed` for incomplete routes.
    async fn select_events(
        &self,
        user_query: &str,
        parsed: &mut ParsedIntent,
        window: TrailingWindow,
    ) -> (EventFilter, Vec<Document>) {
        let model = self.model.as_ref();
        let filter = EventFilter::new(window);

        match parsed.intent {
            Intent::Route => {
                let (Some(from), Some(to)) = (parsed.from.clone(), parsed.to.clone()) else {
                    parsed.intent = Intent::Info;
                    parsed.from = None;
                    parsed.to = None;
                    return (filter, vec![placeholder(INCOMPLETE_ROUTE)]);
                };

                let mut tokens = nearby_places(model, &from).await;
                for token in nearby_places(model, &to).await {
                    if !tokens.contains(&token) {
                        tokens.push(token);
                    }
                }
                let filter = filter.with_location(&tokens);
                let docs = self.find(&filter);
                if !docs.is_empty() {
                    return (filter, docs);
                }

                let keywords = route_keywords(model, &from, &to).await;
                if keywords.is_empty() {
                    return (filter, docs);
                }
                let fallback = filter.summary_only(&keywords);
                let docs = self.find(&fallback);
                (fallback, docs)
            }
            Intent::Info => {
                let filter = match parsed.from.clone().or_else(|| parsed.to.clone()) {
                    Some(place) => {
                        let tokens = nearby_places(model, &place).await;
                        let keywords = event_keywords(model, user_query, LOCAL_EVENT_EXAMPLE).await;
                        filter
                            .with_location(&tokens)
                            .with_location_or_summary(&keywords)
                    }
                    None => {
                        let keywords =
                            event_keywords(model, user_query, GENERAL_EVENT_EXAMPLE).await;
                        filter.with_summary(&keywords)
                    }
                };
                let docs = self.find(&filter);
                (filter, docs)
            }
        }
    }

    fn find(&self, filter: &EventFilter) -> Vec<Document> {
        self.database.find_events(filter).unwrap_or_else(|e| {
            error!("Event lookup failed: {e:#}");
            Vec::new()
        })
    }
}

fn placeholder(text: &str) -> Document {
    let mut doc = Map::new();
    doc.insert("info".to_string(), Value::String(text.to_string()));
    doc
}

fn without_id(mut doc: Document) -> Document {
    doc.remove("_id");
    doc
}
