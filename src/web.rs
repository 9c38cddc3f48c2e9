use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use serde::Deserialize;
use serde_json::json;
use warp::{
    http::StatusCode,
    reply::{self, Json, WithStatus},
    Filter, Rejection, Reply,
};

use crate::pipeline::Pipeline;

const INDEX_HTML: &str = include_str!("../templates/index.html");
const ROUTE_MAP_HTML: &str = include_str!("../templates/route-map.html");
const EMPTY_QUERY_ANSWER: &str = "Please provide a query.";
const MAX_BODY_BYTES: u64 = 16 * 1024;

#[derive(Debug, Deserialize)]
struct AskRequest {
    #[serde(default)]
    query: Option<String>,
}

pub(crate) async fn serve(pipeline: Arc<Pipeline>, addr: SocketAddr) {
    warp::serve(routes(pipeline)).run(addr).await;
}

pub(crate) fn routes(
    pipeline: Arc<Pipeline>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .map(|| reply::html(INDEX_HTML));
    let route_map = warp::path("route-map")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| reply::html(ROUTE_MAP_HTML));
    let ask = warp::path("ask")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(warp::header::optional::<String>("x-forwarded-for"))
        .and(warp::addr::remote())
        .and(warp::any().map(move || pipeline.clone()))
        .and_then(ask);

    index.or(route_map).or(ask).with(warp::trace::request())
}

async fn ask(
    request: AskRequest,
    forwarded_for: Option<String>,
    remote: Option<SocketAddr>,
    pipeline: Arc<Pipeline>,
) -> Result<WithStatus<Json>, Infallible> {
    let query = request.query.unwrap_or_default();
    let query = query.trim();
    if query.is_empty() {
        let body = json!({"answer": EMPTY_QUERY_ANSWER, "events": []});
        return Ok(reply::with_status(
            reply::json(&body),
            StatusCode::BAD_REQUEST,
        ));
    }

    let ip = forwarded_for.or_else(|| remote.map(|addr| addr.ip().to_string()));
    let response = pipeline.ask(query, ip).await;
    Ok(reply::with_status(reply::json(&response), StatusCode::OK))
}
