//! OAuth 1.0a request signing (HMAC-SHA1), as required by the v2 search API
//! for user-context credentials.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use rand::{distr::Alphanumeric, Rng};
use sha1::Sha1;
use urlencoding::encode;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const VERSION: &str = "1.0";
const NONCE_LEN: usize = 32;

#[derive(Debug, Clone)]
pub(crate) struct Credentials {
    pub(crate) consumer_key: String,
    pub(crate) consumer_secret: String,
    pub(crate) access_token: String,
    pub(crate) access_token_secret: String,
}

pub(crate) fn nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

/// Builds the `Authorization` header value for a request whose query or
/// form parameters are `params`.
pub(crate) fn authorization_header(
    credentials: &Credentials,
    method: &str,
    base_url: &str,
    params: &[(&str, &str)],
    nonce: &str,
    timestamp: u64,
) -> Result<String> {
    let timestamp = timestamp.to_string();
    let mut oauth = vec![
        ("oauth_consumer_key", credentials.consumer_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", SIGNATURE_METHOD),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_token", credentials.access_token.as_str()),
        ("oauth_version", VERSION),
    ];

    let mut all: Vec<(&str, &str)> = oauth.clone();
    all.extend_from_slice(params);
    let base = signature_base(method, base_url, &all);
    let signature = sign(
        &base,
        &credentials.consumer_secret,
        &credentials.access_token_secret,
    )?;
    oauth.push(("oauth_signature", signature.as_str()));

    let fields = oauth
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {fields}"))
}

fn signature_base(method: &str, base_url: &str, params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k).into_owned(), encode(v).into_owned()))
        .collect();
    encoded.sort();
    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(base_url),
        encode(&normalized)
    )
}

fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> Result<String> {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| anyhow!("{e}"))?;
    mac.update(base.as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}
