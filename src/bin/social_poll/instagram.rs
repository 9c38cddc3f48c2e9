use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::info;

use crate::history::HistoryWriter;

pub(crate) const DEFAULT_URL: &str = "https://graph.facebook.com/{user_id}/media";
pub(crate) const DEFAULT_FIELDS: &str = "caption,id,media_type,media_url";

fn endpoint(url: &str, user_id: &str) -> String {
    url.replace("{user_id}", user_id)
}

/// Calls the Graph API once and records the payload in the four output files.
pub(crate) async fn poll(
    client: &Client,
    writer: &HistoryWriter,
    url: &str,
    user_id: &str,
    fields: &str,
    access_token: &str,
) -> Result<Value> {
    let endpoint = endpoint(url, user_id);
    let data: Value = client
        .get(&endpoint)
        .query(&[
            ("user_id", user_id),
            ("fields", fields),
            ("access_token", access_token),
        ])
        .send()
        .await
        .context("Problem with Graph API call")?
        .error_for_status()?
        .json()
        .await?;

    writer.record(&data, Utc::now())?;
    info!("Saved Graph API response from {endpoint}");
    Ok(data)
}
