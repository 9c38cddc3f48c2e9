use std::{collections::HashMap, fmt::Write as _};

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{header::AUTHORIZATION, Client};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};
use urlencoding::encode;

use crate::{
    history::{append_file, HistoryWriter},
    oauth::{self, Credentials},
};

pub(crate) const SEARCH_URL: &str = "https://api.twitter.com/2/tweets/search/recent";
const SEARCH_PARAMS: [(&str, &str); 5] = [
    ("query", "#Ai -is:retweet has:media"),
    ("expansions", "attachments.media_keys,author_id"),
    ("tweet.fields", "created_at,author_id,public_metrics,attachments"),
    (
        "media.fields",
        "media_key,type,url,preview_image_url,height,width,public_metrics",
    ),
    ("max_results", "10"),
];
pub(crate) const TWEETS_FILE: &str = "tweets.txt";
const RULE_WIDTH: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub(crate) data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    media: Vec<Media>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Tweet {
    pub(crate) id: String,
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    attachments: Option<Attachments>,
    #[serde(default)]
    public_metrics: PublicMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct Attachments {
    #[serde(default)]
    media_keys: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Media {
    media_key: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    preview_image_url: Option<String>,
}

impl SearchResponse {
    /// One human-readable block per tweet, with author and media resolved
    /// from the `includes` expansion.
    pub(crate) fn blocks(&self) -> Vec<String> {
        let users: HashMap<&str, &User> = self
            .includes
            .users
            .iter()
            .map(|u| (u.id.as_str(), u))
            .collect();
        let media: HashMap<&str, &Media> = self
            .includes
            .media
            .iter()
            .map(|m| (m.media_key.as_str(), m))
            .collect();
        self.data
            .iter()
            .map(|tweet| format_tweet(tweet, &users, &media))
            .collect()
    }
}

fn format_tweet(
    tweet: &Tweet,
    users: &HashMap<&str, &User>,
    media: &HashMap<&str, &Media>,
) -> String {
    let author = tweet
        .author_id
        .as_deref()
        .and_then(|id| users.get(id))
        .map_or("Unknown", |u| u.username.as_str());

    let mut block = String::new();
    let _ = writeln!(block, "Tweet ID: {}", tweet.id);
    let _ = writeln!(
        block,
        "Created at: {}",
        tweet.created_at.as_deref().unwrap_or_default()
    );
    let _ = writeln!(block, "Author: {author}");
    let _ = writeln!(block, "Text: {}", tweet.text);

    let keys = tweet
        .attachments
        .as_ref()
        .map(|a| a.media_keys.as_slice())
        .unwrap_or_default();
    for key in keys {
        let item = media.get(key.as_str());
        let kind = item.and_then(|m| m.kind.as_deref()).unwrap_or("unknown");
        let _ = writeln!(block, "Media Type: {kind}");
        if let Some(url) = item.and_then(|m| m.url.as_deref()) {
            let _ = writeln!(block, "Media URL: {url}");
        }
        if let Some(url) = item.and_then(|m| m.preview_image_url.as_deref()) {
            let _ = writeln!(block, "Preview Image URL: {url}");
        }
    }

    let metrics = &tweet.public_metrics;
    let _ = writeln!(block, "Likes: {}", metrics.like_count);
    let _ = writeln!(block, "Retweets: {}", metrics.retweet_count);
    let _ = writeln!(block, "Replies: {}", metrics.reply_count);
    block.push_str(&"-".repeat(RULE_WIDTH));
    block
}

fn search_url(base_url: &str) -> String {
    let query = SEARCH_PARAMS
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{base_url}?{query}")
}

async fn fetch(client: &Client, base_url: &str, credentials: &Credentials) -> Result<Value> {
    let timestamp = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
    let header = oauth::authorization_header(
        credentials,
        "GET",
        base_url,
        &SEARCH_PARAMS,
        &oauth::nonce(),
        timestamp,
    )?;

    let response = client
        .get(search_url(base_url))
        .header(AUTHORIZATION, header)
        .send()
        .await
        .context("Problem with search API call")?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("search API returned {status}: {body}");
    }
    Ok(response.json().await?)
}

/// Fetches the latest matching tweets, appends each as a text block to
/// `tweets.txt` and records the raw payload. Failures are logged and yield
/// no tweets.
pub(crate) async fn poll(
    client: &Client,
    writer: &HistoryWriter,
    base_url: &str,
    credentials: &Credentials,
) -> Vec<Tweet> {
    let data = match fetch(client, base_url, credentials).await {
        Ok(data) => data,
        Err(e) => {
            error!("Error fetching tweets: {e:#}");
            return Vec::new();
        }
    };
    if let Err(e) = writer.record(&data, Utc::now()) {
        error!("Cannot save search response: {e:#}");
    }

    let response: SearchResponse = match serde_json::from_value(data) {
        Ok(response) => response,
        Err(e) => {
            error!("Unexpected search response shape: {e}");
            return Vec::new();
        }
    };
    let tweets_file = writer.path_in_dir(TWEETS_FILE);
    for block in response.blocks() {
        if let Err(e) = append_file(&tweets_file, &format!("{block}\n")) {
            error!("Cannot append tweet: {e:#}");
        }
        println!("{block}");
    }
    info!("Fetched {} tweets", response.data.len());
    response.data
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use warp::{http::StatusCode, Filter};

    use super::*;

    fn sample() -> SearchResponse {
        serde_json::from_value(sample_json()).unwrap()
    }

    fn sample_json() -> Value {
        json!({
            "data": [
                {
                    "id": "1",
                    "text": "New #AI model released",
                    "created_at": "2025-07-21T08:00:00.000Z",
                    "author_id": "u1",
                    "attachments": {"media_keys": ["m1", "m2"]},
                    "public_metrics": {"like_count": 5, "retweet_count": 2, "reply_count": 1}
                },
                {"id": "2", "text": "No author or media", "author_id": "ghost"}
            ],
            "includes": {
                "users": [{"id": "u1", "username": "ai_news"}],
                "media": [
                    {"media_key": "m1", "type": "photo", "url": "https://img.test/1.jpg"},
                    {"media_key": "m2", "type": "video", "preview_image_url": "https://img.test/2.jpg"}
                ]
            }
        })
    }

    fn credentials() -> Credentials {
        Credentials {
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            access_token: "token".to_string(),
            access_token_secret: "token-secret".to_string(),
        }
    }

    /// Serves `body` with `status` on `/2/tweets/search/recent`, answering 401
    /// to requests without an OAuth header.
    fn search_server(status: StatusCode, body: Value) -> String {
        let route = warp::path!("2" / "tweets" / "search" / "recent")
            .and(warp::header::optional::<String>("authorization"))
            .map(move |auth: Option<String>| {
                let status = if auth.is_some_and(|a| a.starts_with("OAuth ")) {
                    status
                } else {
                    StatusCode::UNAUTHORIZED
                };
                warp::reply::with_status(warp::reply::json(&body), status)
            });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{addr}/2/tweets/search/recent")
    }

    #[test]
    fn formats_tweet_with_expansions() {
        let blocks = sample().blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0],
            format!(
                "Tweet ID: 1\nCreated at: 2025-07-21T08:00:00.000Z\nAuthor: ai_news\n\
                 Text: New #AI model released\nMedia Type: photo\nMedia URL: https://img.test/1.jpg\n\
                 Media Type: video\nPreview Image URL: https://img.test/2.jpg\n\
                 Likes: 5\nRetweets: 2\nReplies: 1\n{}",
                "-".repeat(RULE_WIDTH)
            )
        );
    }

    #[test]
    fn missing_author_and_metrics_default() {
        let blocks = sample().blocks();
        assert!(blocks[1].contains("Author: Unknown\n"));
        assert!(blocks[1].contains("Likes: 0\nRetweets: 0\nReplies: 0\n"));
        assert!(!blocks[1].contains("Media Type"));
    }

    #[test]
    fn empty_search_has_no_blocks() {
        let response: SearchResponse =
            serde_json::from_value(json!({"meta": {"result_count": 0}})).unwrap();
        assert!(response.blocks().is_empty());
    }

    #[tokio::test]
    async fn poll_writes_tweets_and_history() {
        let dir = tempfile::tempdir().unwrap();
        let writer = HistoryWriter::new(dir.path(), "twitter");
        let url = search_server(StatusCode::OK, sample_json());

        let tweets = poll(&Client::new(), &writer, &url, &credentials()).await;

        assert_eq!(tweets.len(), 2);
        assert_eq!(tweets[0].id, "1");
        let text = std::fs::read_to_string(dir.path().join(TWEETS_FILE)).unwrap();
        assert_eq!(text.matches("Tweet ID: ").count(), 2);
        assert!(text.contains("Author: ai_news\n"));
        assert!(writer.path("current.json").exists());
        assert!(writer.path("history.json").exists());
    }

    #[tokio::test]
    async fn failed_search_writes_nothing() {
        for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE] {
            let dir = tempfile::tempdir().unwrap();
            let writer = HistoryWriter::new(dir.path(), "twitter");
            let url = search_server(status, json!({"title": "error"}));

            let tweets = poll(&Client::new(), &writer, &url, &credentials()).await;

            assert!(tweets.is_empty());
            assert!(!dir.path().join(TWEETS_FILE).exists());
            assert!(!writer.path("current.json").exists());
            assert!(!writer.path("current.txt").exists());
            assert!(!writer.path("history.json").exists());
        }
    }

    #[tokio::test]
    async fn unreachable_search_yields_no_tweets() {
        let dir = tempfile::tempdir().unwrap();
        let writer = HistoryWriter::new(dir.path(), "twitter");
        let url = search_server(StatusCode::OK, sample_json()).replace("/2/", "/missing/");

        let tweets = poll(&Client::new(), &writer, &url, &credentials()).await;

        assert!(tweets.is_empty());
        assert!(!writer.path("current.json").exists());
    }

    #[test]
    fn search_url_is_percent_encoded() {
        let url = search_url(SEARCH_URL);
        assert!(url.starts_with(
            "https://api.twitter.com/2/tweets/search/recent?query=%23Ai%20-is%3Aretweet%20has%3Amedia&"
        ));
        assert!(url.ends_with("&max_results=10"));
    }
}
