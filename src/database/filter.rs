use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use regex::{Regex, RegexBuilder};
use serde_json::{json, Map, Value};

use super::Document;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) const LOCATION: &str = "location";
pub(crate) const EVENT_SUMMARY: &str = "event_summary";
pub(crate) const EVENT_DATE: &str = "event_date";

/// Inclusive `[today - DAYS_BACK, today]` span of event dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TrailingWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl TrailingWindow {
    pub(crate) const DAYS_BACK: u64 = 4;

    pub(crate) fn ending(today: NaiveDate) -> Self {
        let start = today
            .checked_sub_days(Days::new(Self::DAYS_BACK))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }

    pub(crate) fn start(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub(crate) fn end(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    /// Case-insensitive regular expression over a string field.
    Regex(String),
    Exists,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldCondition {
    pub(crate) field: &'static str,
    pub(crate) condition: Condition,
}

/// Filter over the events collection, always bounded by a trailing window.
///
/// The rendered form (see [`EventFilter::to_value`]) mirrors a document-store
/// query so the audit log records exactly what was asked for.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EventFilter {
    window: TrailingWindow,
    location: Option<String>,
    event_summary: Option<String>,
    any_of: Vec<FieldCondition>,
}

impl EventFilter {
    pub(crate) fn new(window: TrailingWindow) -> Self {
        Self {
            window,
            location: None,
            event_summary: None,
            any_of: Vec::new(),
        }
    }

    /// Restricts `location` to any of `tokens`. Empty token sets leave the
    /// filter unchanged.
    #[must_use]
    pub(crate) fn with_location<S: AsRef<str>>(mut self, tokens: &[S]) -> Self {
        if let Some(pattern) = alternation(tokens) {
            self.location = Some(pattern);
        }
        self
    }

    /// Restricts `event_summary` to any of `keywords`.
    #[must_use]
    pub(crate) fn with_summary<S: AsRef<str>>(mut self, keywords: &[S]) -> Self {
        if let Some(pattern) = alternation(keywords) {
            self.event_summary = Some(pattern);
        }
        self
    }

    /// Replaces the location constraint with "location matches OR summary
    /// matches `keywords`". A filter without a location constraint accepts
    /// any document that has a `location` field on the first branch.
    #[must_use]
    pub(crate) fn with_location_or_summary<S: AsRef<str>>(mut self, keywords: &[S]) -> Self {
        let Some(summary) = alternation(keywords) else {
            return self;
        };
        let location = match self.location.take() {
            Some(pattern) => Condition::Regex(pattern),
            None => Condition::Exists,
        };
        self.any_of = vec![
            FieldCondition {
                field: LOCATION,
                condition: location,
            },
            FieldCondition {
                field: EVENT_SUMMARY,
                condition: Condition::Regex(summary),
            },
        ];
        self
    }

    /// Same window, summary keywords only.
    #[must_use]
    pub(crate) fn summary_only<S: AsRef<str>>(&self, keywords: &[S]) -> Self {
        Self::new(self.window).with_summary(keywords)
    }

    pub(crate) fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            EVENT_DATE.to_string(),
            json!({"$gte": self.window.start(), "$lte": self.window.end()}),
        );
        if let Some(pattern) = &self.location {
            map.insert(LOCATION.to_string(), regex_value(pattern));
        }
        if let Some(pattern) = &self.event_summary {
            map.insert(EVENT_SUMMARY.to_string(), regex_value(pattern));
        }
        if !self.any_of.is_empty() {
            let branches = self
                .any_of
                .iter()
                .map(|c| {
                    let condition = match &c.condition {
                        Condition::Regex(pattern) => regex_value(pattern),
                        Condition::Exists => json!({"$exists": true}),
                    };
                    json!({ c.field: condition })
                })
                .collect();
            map.insert("$or".to_string(), Value::Array(branches));
        }
        Value::Object(map)
    }

    pub(crate) fn compile(&self) -> Result<Matcher> {
        let any_of = self
            .any_of
            .iter()
            .map(|c| {
                let regex = match &c.condition {
                    Condition::Regex(pattern) => Some(compile(pattern)?),
                    Condition::Exists => None,
                };
                Ok((c.field, regex))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Matcher {
            start: self.window.start(),
            end: self.window.end(),
            location: self.location.as_deref().map(compile).transpose()?,
            event_summary: self.event_summary.as_deref().map(compile).transpose()?,
            any_of,
        })
    }
}

/// An [`EventFilter`] with its patterns compiled.
pub(crate) struct Matcher {
    start: String,
    end: String,
    location: Option<Regex>,
    event_summary: Option<Regex>,
    any_of: Vec<(&'static str, Option<Regex>)>,
}

impl Matcher {
    pub(crate) fn matches(&self, doc: &Document) -> bool {
        let in_window = doc
            .get(EVENT_DATE)
            .and_then(Value::as_str)
            .is_some_and(|date| self.start.as_str() <= date && date <= self.end.as_str());
        if !in_window {
            return false;
        }
        if let Some(re) = &self.location {
            if !field_matches(doc, LOCATION, re) {
                return false;
            }
        }
        if let Some(re) = &self.event_summary {
            if !field_matches(doc, EVENT_SUMMARY, re) {
                return false;
            }
        }
        self.any_of.is_empty()
            || self.any_of.iter().any(|(field, regex)| match regex {
                Some(re) => field_matches(doc, field, re),
                None => doc.contains_key(*field),
            })
    }
}

/// Builds a case-insensitive alternation over the escaped, non-empty tokens.
pub(crate) fn alternation<S: AsRef<str>>(tokens: &[S]) -> Option<String> {
    let escaped: Vec<String> = tokens
        .iter()
        .map(AsRef::as_ref)
        .filter(|t| !t.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        None
    } else {
        Some(escaped.join("|"))
    }
}

fn field_matches(doc: &Document, field: &str, re: &Regex) -> bool {
    doc.get(field)
        .and_then(Value::as_str)
        .is_some_and(|text| re.is_match(text))
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("invalid filter pattern {pattern}"))
}

fn regex_value(pattern: &str) -> Value {
    json!({"$regex": pattern, "$options": "i"})
}
