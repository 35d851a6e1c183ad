//! Fetch interception: cache-first resolution with offline fallbacks.

use tracing::{debug, warn};

use super::Worker;
use crate::cache::CacheStore;
use crate::http::{FetchMode, Method, Request, Response, ResponseKind};
use crate::net::Fetcher;

/// Result of intercepting a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
  /// The request is not ours to answer (non-GET or excluded scheme)
  Passthrough,
  /// A resolved response; intercepted GETs always get one
  Response(Response),
}

impl<S: CacheStore, F: Fetcher> Worker<S, F> {
  /// Resolve an intercepted request.
  ///
  /// Cache wins over network with no freshness check; a cache miss goes to
  /// the network, and a qualifying response (200, same-origin, admitted by
  /// the runtime policy) is copied into the runtime cache on the way out.
  /// Cache write failures are logged and dropped; the asset is simply not
  /// cached yet. When the network is unreachable, navigations get the
  /// cached shell document and everything else a 503 stub.
  pub async fn respond(&self, request: &Request) -> FetchOutcome {
    if request.method != Method::Get {
      return FetchOutcome::Passthrough;
    }
    if self.is_excluded(request) {
      return FetchOutcome::Passthrough;
    }

    let names = &self.settings().names;
    let caches = [names.static_cache.as_str(), names.runtime_cache.as_str()];

    match self.store().get_any(&caches, &request.url) {
      Ok(Some(hit)) => {
        debug!(url = %request.url, "serving from cache");
        return FetchOutcome::Response(hit.response);
      }
      Ok(None) => {}
      // A broken store reads as a miss; the network can still answer
      Err(e) => warn!(url = %request.url, error = %e, "cache lookup failed"),
    }

    match self.fetcher().fetch(request).await {
      Ok(response) => {
        if self.qualifies_for_runtime_cache(&request.url, &response) {
          match self.store().put(&names.runtime_cache, &request.url, &response) {
            Ok(()) => debug!(url = %request.url, "cached new resource"),
            Err(e) => warn!(url = %request.url, error = %e, "runtime cache write failed"),
          }
        }
        FetchOutcome::Response(response)
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "fetch failed, serving offline fallback");
        if request.mode == FetchMode::Navigate {
          if let Ok(Some(hit)) = self.store().get_any(&caches, &self.settings().fallback_url) {
            return FetchOutcome::Response(hit.response);
          }
        }
        FetchOutcome::Response(Response::offline())
      }
    }
  }

  fn qualifies_for_runtime_cache(&self, url: &str, response: &Response) -> bool {
    response.is_ok()
      && response.kind == ResponseKind::Basic
      && self.settings().policy.cacheable(url)
  }

  fn is_excluded(&self, request: &Request) -> bool {
    match request.scheme() {
      Some(scheme) => self
        .settings()
        .excluded_schemes
        .iter()
        .any(|excluded| excluded == &scheme),
      None => false,
    }
  }
}
