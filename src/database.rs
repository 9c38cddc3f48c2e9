pub(crate) mod audit;
pub(crate) mod filter;

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use sled::{Db, Tree};

pub(crate) use self::audit::QueryLogEntry;
pub(crate) use self::filter::{EventFilter, TrailingWindow};

/// A schemaless event document.
pub(crate) type Document = Map<String, Value>;

const EVENTS_TREE: &str = "events";
const QUERIES_TREE: &str = "queries";

#[derive(Clone)]
pub(crate) struct Database {
    db: Db,
    events: Tree,
    queries: Tree,
}

impl Database {
    pub(crate) fn connect(path: &Path) -> Result<Database> {
        let db = sled::open(path)
            .with_context(|| format!("cannot open event store at {}", path.display()))?;
        let events = db.open_tree(EVENTS_TREE)?;
        let queries = db.open_tree(QUERIES_TREE)?;
        Ok(Database {
            db,
            events,
            queries,
        })
    }

    /// Stores one event document and returns its key.
    #[cfg(test)]
    pub(crate) fn insert_event(&self, event: Value) -> Result<u64> {
        let Value::Object(doc) = event else {
            bail!("event must be a JSON object");
        };
        Self::append(&self.db, &self.events, &doc)
    }

    /// Loads a JSON array of event documents, returning how many were stored.
    /// Nothing is stored unless every element is an object.
    pub(crate) fn import_events(&self, raw: &str) -> Result<usize> {
        let events: Vec<Document> = serde_json::from_str(raw)
            .context("events file must hold a JSON array of objects")?;
        let count = events.len();
        for doc in &events {
            Self::append(&self.db, &self.events, doc)?;
        }
        self.events.flush()?;
        Ok(count)
    }

    /// Returns every event matching `filter`, in insertion order.
    pub(crate) fn find_events(&self, filter: &EventFilter) -> Result<Vec<Document>> {
        let matcher = filter.compile()?;
        let mut found = Vec::new();
        for entry in self.events.iter() {
            let (_, val) = entry?;
            let doc: Document = serde_json::from_slice(&val)?;
            if matcher.matches(&doc) {
                found.push(doc);
            }
        }
        Ok(found)
    }

    pub(crate) fn log_query(&self, entry: &QueryLogEntry) -> Result<u64> {
        let Value::Object(doc) = serde_json::to_value(entry)? else {
            bail!("query log entry must serialize to an object");
        };
        Self::append(&self.db, &self.queries, &doc)
    }

    #[cfg(test)]
    pub(crate) fn query_logs(&self) -> Result<Vec<Document>> {
        self.queries
            .iter()
            .map(|entry| {
                let (_, val) = entry?;
                Ok(serde_json::from_slice(&val)?)
            })
            .collect()
    }

    fn append(db: &Db, tree: &Tree, doc: &Document) -> Result<u64> {
        let id = db.generate_id()?;
        tree.insert(id.to_be_bytes(), serde_json::to_vec(doc)?)?;
        Ok(id)
    }
}

#[cfg(test)]
pub(crate) struct TestDatabase {
    _dir: tempfile::TempDir, // keeps the sled directory alive for the test
    pub(crate) db: Database,
}

#[cfg(test)]
impl TestDatabase {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        Self { _dir: dir, db }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn window() -> TrailingWindow {
        TrailingWindow::ending(NaiveDate::from_ymd_opt(2025, 7, 21).unwrap())
    }

    #[test]
    fn finds_only_events_inside_window() {
        let store = TestDatabase::new();
        store
            .db
            .insert_event(json!({"location": "Delhi", "event_summary": "rain", "event_date": "2025-07-20"}))
            .unwrap();
        store
            .db
            .insert_event(json!({"location": "Delhi", "event_summary": "old", "event_date": "2025-07-01"}))
            .unwrap();

        let found = store.db.find_events(&EventFilter::new(window())).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["event_summary"], "rain");
    }

    #[test]
    fn import_rejects_non_objects() {
        let store = TestDatabase::new();
        assert!(store.db.import_events("[1, 2]").is_err());
        assert!(store.db.import_events("{}").is_err());
        let mixed = r#"[{"location": "Delhi", "event_date": "2025-07-20"}, "oops"]"#;
        assert!(store.db.import_events(mixed).is_err());
        assert!(store.db.find_events(&EventFilter::new(window())).unwrap().is_empty());

        let count = store
            .db
            .import_events(r#"[{"location": "Pune", "event_date": "2025-07-19"}]"#)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.db.find_events(&EventFilter::new(window())).unwrap().len(), 1);
    }

    #[test]
    fn query_logs_are_appended_in_order() {
        let store = TestDatabase::new();
        for query in ["first", "second"] {
            let entry = QueryLogEntry {
                query: query.to_string(),
                intent_parsed: json!({"intent": "info"}),
                timestamp: chrono::Utc::now(),
                ip: None,
                mongo_filter_used: json!({}),
                found_events_count: 0,
                generated_answer: String::new(),
            };
            store.db.log_query(&entry).unwrap();
        }
        let logs = store.db.query_logs().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0]["query"], "first");
        assert_eq!(logs[1]["query"], "second");
    }
}
