//! Network side of the fetch interceptor.

use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use std::future::Future;
use url::Url;

use crate::http::{same_origin, Method, Request, Response, ResponseKind};

/// Trait for resolving a request over the network.
///
/// The worker is generic over this seam so tests can substitute a recording
/// mock and assert when the network was (not) consulted.
pub trait Fetcher: Send + Sync {
  fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;
}

/// HTTP fetcher backed by reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
  /// Origin whose responses count as "basic" (same-origin)
  origin: String,
}

impl HttpFetcher {
  pub fn new(origin: impl Into<String>) -> Result<Self> {
    let origin = origin.into();
    Url::parse(&origin).map_err(|e| eyre!("Invalid origin '{}': {}", origin, e))?;

    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, origin })
  }
}

impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let method = match request.method {
      Method::Get => reqwest::Method::GET,
      Method::Head => reqwest::Method::HEAD,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Delete => reqwest::Method::DELETE,
      Method::Patch => reqwest::Method::PATCH,
      Method::Options => reqwest::Method::OPTIONS,
    };

    let mut builder = self.client.request(method, &request.url);
    if request.cache_bypass {
      // Shell refresh must reach the origin, not an intermediate cache
      builder = builder
        .header(reqwest::header::CACHE_CONTROL, "no-cache")
        .header(reqwest::header::PRAGMA, "no-cache");
    }

    let resp = builder
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", request.url, e))?;

    let status = resp.status();
    let final_url = resp.url().to_string();

    let mut headers = BTreeMap::new();
    for (name, value) in resp.headers() {
      if let Ok(value) = value.to_str() {
        headers.insert(name.as_str().to_string(), value.to_string());
      }
    }

    let body = resp
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", request.url, e))?
      .to_vec();

    let kind = if same_origin(&final_url, &self.origin) {
      ResponseKind::Basic
    } else {
      ResponseKind::CrossOrigin
    };

    Ok(Response {
      url: final_url,
      status: status.as_u16(),
      status_text: status.canonical_reason().unwrap_or("").to_string(),
      headers,
      body,
      kind,
    })
  }
}
