//! Request/response model shared by the fetch interceptor and the cache stores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Delete,
  Patch,
  Options,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Delete => "DELETE",
      Method::Patch => "PATCH",
      Method::Options => "OPTIONS",
    }
  }
}

/// How a request was initiated.
///
/// Navigations get the cached shell document as their offline fallback;
/// everything else gets a bare 503.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FetchMode {
  /// Top-level document navigation
  Navigate,
  /// Script, stylesheet, image or data request issued by a page
  #[default]
  Subresource,
}

/// An outbound request as seen by the interceptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
  /// Absolute URL
  pub url: String,
  pub method: Method,
  pub mode: FetchMode,
  /// Bypass intermediate HTTP caches (install-time shell refresh)
  pub cache_bypass: bool,
}

impl Request {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      method,
      mode: FetchMode::Subresource,
      cache_bypass: false,
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::Get, url)
  }

  /// Mark as a top-level navigation
  pub fn navigate(mut self) -> Self {
    self.mode = FetchMode::Navigate;
    self
  }

  /// Request the freshest copy, skipping intermediate caches
  pub fn bypass_cache(mut self) -> Self {
    self.cache_bypass = true;
    self
  }

  /// URL scheme, if the URL parses
  pub fn scheme(&self) -> Option<String> {
    Url::parse(&self.url).ok().map(|u| u.scheme().to_string())
  }
}

/// Classification of where a response came from.
///
/// Only `Basic` (same-origin) responses are eligible for opportunistic
/// runtime caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
  /// Same-origin response from the configured upstream
  Basic,
  /// Response served by another origin
  CrossOrigin,
  /// Synthesized locally (offline stubs), never cached
  Synthetic,
}

impl ResponseKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ResponseKind::Basic => "basic",
      ResponseKind::CrossOrigin => "cross_origin",
      ResponseKind::Synthetic => "synthetic",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "basic" => Some(ResponseKind::Basic),
      "cross_origin" => Some(ResponseKind::CrossOrigin),
      "synthetic" => Some(ResponseKind::Synthetic),
      _ => None,
    }
  }
}

/// A resolved response, either from the network or from a cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  /// Final URL the response was served for
  pub url: String,
  pub status: u16,
  pub status_text: String,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
  pub kind: ResponseKind,
}

impl Response {
  /// A successful 200 response (tests and synthesized entries).
  pub fn ok(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
    Self {
      url: url.into(),
      status: 200,
      status_text: "OK".to_string(),
      headers: BTreeMap::new(),
      body: body.into(),
      kind: ResponseKind::Basic,
    }
  }

  /// The substitute response returned when the network is unreachable
  /// and no cached fallback exists.
  pub fn offline() -> Self {
    Self {
      url: String::new(),
      status: 503,
      status_text: "Service Unavailable".to_string(),
      headers: [("content-type".to_string(), "text/plain".to_string())].into(),
      body: b"Offline - Please check your internet connection".to_vec(),
      kind: ResponseKind::Synthetic,
    }
  }

  pub fn is_ok(&self) -> bool {
    self.status == 200
  }
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &str, b: &str) -> bool {
  match (Url::parse(a), Url::parse(b)) {
    (Ok(a), Ok(b)) => a.origin() == b.origin(),
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_same_origin() {
    assert!(same_origin(
      "https://study.example.com/",
      "https://study.example.com/static/js/main.js"
    ));
    assert!(!same_origin(
      "https://study.example.com/",
      "https://cdn.example.com/lib.js"
    ));
    assert!(!same_origin(
      "https://study.example.com/",
      "http://study.example.com/"
    ));
  }

  #[test]
  fn test_same_origin_unparseable() {
    assert!(!same_origin("not a url", "https://study.example.com/"));
  }

  #[test]
  fn test_offline_stub() {
    let resp = Response::offline();
    assert_eq!(resp.status, 503);
    assert_eq!(resp.status_text, "Service Unavailable");
    assert_eq!(resp.kind, ResponseKind::Synthetic);
    assert!(!resp.is_ok());
  }

  #[test]
  fn test_request_builders() {
    let req = Request::get("https://study.example.com/manifest.json");
    assert_eq!(req.method, Method::Get);
    assert_eq!(req.mode, FetchMode::Subresource);
    assert!(!req.cache_bypass);

    let nav = Request::get("https://study.example.com/").navigate();
    assert_eq!(nav.mode, FetchMode::Navigate);

    let fresh = Request::get("https://study.example.com/manifest.json").bypass_cache();
    assert!(fresh.cache_bypass);
  }

  #[test]
  fn test_request_scheme() {
    let req = Request::get("chrome-extension://abcdef/popup.html");
    assert_eq!(req.scheme().as_deref(), Some("chrome-extension"));
  }
}
