use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const RULE_WIDTH: usize = 60;

/// Writes one poller's output files under `dir`:
/// `<prefix>_current.{json,txt}` are overwritten on every poll,
/// `<prefix>_history.{json,txt}` are appended to.
pub(crate) struct HistoryWriter {
    dir: PathBuf,
    prefix: String,
}

impl HistoryWriter {
    pub(crate) fn new(dir: &Path, prefix: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
        }
    }

    pub(crate) fn path(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}_{suffix}", self.prefix))
    }

    /// A file in the output directory that is not tied to this poller's prefix.
    pub(crate) fn path_in_dir(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub(crate) fn record(&self, data: &Value, at: DateTime<Utc>) -> Result<()> {
        let pretty = serde_json::to_string_pretty(data)?;
        write_file(&self.path("current.json"), &pretty)?;
        write_file(&self.path("current.txt"), &pretty)?;
        self.append_history(data, &pretty, at)
    }

    fn append_history(&self, data: &Value, pretty: &str, at: DateTime<Utc>) -> Result<()> {
        let timestamp = at.format(TIMESTAMP_FORMAT).to_string();
        let entry = json!({"_timestamp": timestamp, "response": data});

        let json_path = self.path("history.json");
        let mut history = match fs::read_to_string(&json_path) {
            Ok(raw) => serde_json::from_str::<Vec<Value>>(&raw).unwrap_or_else(|e| {
                warn!("Replacing unreadable {}: {e}", json_path.display());
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        history.push(entry);
        write_file(&json_path, &serde_json::to_string_pretty(&history)?)?;

        let block = format!(
            "{}\nTimestamp: {timestamp}\n{pretty}\n\n",
            "=".repeat(RULE_WIDTH)
        );
        append_file(&self.path("history.txt"), &block)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("cannot write {}", path.display()))
}

/// Appends `contents` to `path`, creating it when missing.
pub(crate) fn append_file(path: &Path, contents: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}
