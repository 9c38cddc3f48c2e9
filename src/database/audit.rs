use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One audit record per answered `/ask` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub(crate) struct QueryLogEntry {
    pub(crate) query: String,
    pub(crate) intent_parsed: Value,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) ip: Option<String>,
    pub(crate) mongo_filter_used: Value,
    pub(crate) found_events_count: usize,
    pub(crate) generated_answer: String,
}
