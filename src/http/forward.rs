//! Forwarding rewritten requests to the page renderer.
//!
//! # Design Decisions
//! - Method, headers and body are passed through untouched
//! - Only the request target changes (destination path + merged query)
//! - Upstream responses are streamed back without buffering
//! - Upstream is always spoken to over HTTP/1.1

use axum::{
    body::Body,
    http::{uri::InvalidUri, HeaderValue, Request, Uri, Version},
    response::Response,
};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use url::Url;

use crate::http::request::X_REQUEST_ID;

pub type HttpClient = Client<HttpConnector, Body>;

pub fn build_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream uri: {0}")]
    Uri(#[from] InvalidUri),

    #[error("upstream request failed: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),
}

/// The page renderer's base URL, without trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    base: String,
}

impl Upstream {
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(url)?;
        Ok(Self {
            base: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// Absolute URI for a request target such as `/signin?token=abc`.
    pub fn target(&self, path_and_query: &str) -> Result<Uri, InvalidUri> {
        format!("{}{}", self.base, path_and_query).parse()
    }
}

/// Send `request` to the upstream at `path_and_query`.
pub async fn forward(
    client: &HttpClient,
    upstream: &Upstream,
    request: Request<Body>,
    path_and_query: &str,
    request_id: &str,
) -> Result<Response, ForwardError> {
    let (mut parts, body) = request.into_parts();
    parts.uri = upstream.target(path_and_query)?;
    parts.version = Version::HTTP_11;
    if let Ok(value) = HeaderValue::from_str(request_id) {
        parts.headers.insert(X_REQUEST_ID, value);
    }

    let response = client.request(Request::from_parts(parts, body)).await?;
    let (parts, body) = response.into_parts();
    Ok(Response::from_parts(parts, Body::new(body)))
}
