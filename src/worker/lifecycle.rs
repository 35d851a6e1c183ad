//! Install and activate handling.

use color_eyre::Result;
use futures::future::join_all;
use tracing::{info, warn};

use super::{Worker, WorkerState};
use crate::cache::CacheStore;
use crate::http::Request;
use crate::net::Fetcher;

impl<S: CacheStore, F: Fetcher> Worker<S, F> {
  /// Precache the app shell into the static cache.
  ///
  /// Every asset is requested with cache-bypass semantics; the stored copy
  /// reflects the origin, not an intermediate cache. Individual failures
  /// are logged and swallowed and install completes with whatever subset
  /// was cached. Re-running install is safe; entries are keyed by URL and
  /// the last write wins.
  pub async fn install(&mut self) -> Result<()> {
    self.set_state(WorkerState::Installing);
    let static_cache = self.settings().names.static_cache.clone();
    info!(cache = %static_cache, "installing worker");

    if let Err(e) = self.store().open(&static_cache) {
      warn!(error = %e, "could not open static cache");
    }

    let fetcher = self.fetcher();
    let fetches = self.settings().shell_assets.iter().map(|url| {
      let request = Request::get(url.clone()).bypass_cache();
      async move { (url.as_str(), fetcher.fetch(&request).await) }
    });
    let results = join_all(fetches).await;

    let mut cached = 0usize;
    for (url, result) in results {
      match result {
        Ok(response) if response.is_ok() => {
          match self.store().put(&static_cache, url, &response) {
            Ok(()) => cached += 1,
            Err(e) => warn!(url, error = %e, "failed to store shell asset"),
          }
        }
        Ok(response) => {
          warn!(url, status = response.status, "skipping shell asset");
        }
        Err(e) => {
          warn!(url, error = %e, "failed to precache shell asset");
        }
      }
    }

    info!(
      cached,
      total = self.settings().shell_assets.len(),
      "worker installed"
    );
    self.set_state(WorkerState::Installed);
    // New versions go live immediately instead of waiting for old tabs to close
    self.set_skip_waiting();
    Ok(())
  }

  /// Remove every cache generation that is not current, then take control
  /// of all open clients.
  pub async fn activate(&mut self) -> Result<()> {
    self.set_state(WorkerState::Activating);
    info!("activating worker");

    for name in self.store().cache_names()? {
      if !self.settings().names.is_current(&name) {
        info!(cache = %name, "deleting stale cache");
        self.store().delete_cache(&name)?;
      }
    }

    self.clients_mut().claim_all();
    self.set_state(WorkerState::Activated);
    info!("worker activated");
    Ok(())
  }

  /// Promote this version past the waiting stage.
  pub fn skip_waiting(&mut self) {
    info!("skip waiting requested");
    self.set_skip_waiting();
  }
}

#[cfg(test)]
mod tests {
  use super::super::testutil::{test_names, test_worker, MockFetcher};
  use super::*;
  use crate::http::Response;

  fn shell_fetcher() -> MockFetcher {
    MockFetcher::offline()
      .respond_with(
        "https://study.example.com/",
        Response::ok("https://study.example.com/", "<html>shell</html>"),
      )
      .respond_with(
        "https://study.example.com/manifest.json",
        Response::ok("https://study.example.com/manifest.json", "{}"),
      )
      .respond_with(
        "https://study.example.com/favicon.ico",
        Response::ok("https://study.example.com/favicon.ico", "icon"),
      )
  }

  #[tokio::test]
  async fn test_install_precaches_shell() {
    let mut worker = test_worker(shell_fetcher());
    worker.install().await.unwrap();

    let names = test_names();
    assert_eq!(worker.state(), WorkerState::Installed);
    assert!(worker.skips_waiting());
    assert_eq!(worker.store().entry_count(&names.static_cache).unwrap(), 3);
    assert!(worker
      .store()
      .get(&names.static_cache, "https://study.example.com/manifest.json")
      .unwrap()
      .is_some());
  }

  #[tokio::test]
  async fn test_install_requests_bypass_intermediate_caches() {
    let mut worker = test_worker(shell_fetcher());
    worker.install().await.unwrap();

    let calls = worker.fetcher().calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|request| request.cache_bypass));
  }

  #[tokio::test]
  async fn test_install_survives_partial_failure() {
    // Only the root document is reachable; the rest fail
    let fetcher = MockFetcher::offline().respond_with(
      "https://study.example.com/",
      Response::ok("https://study.example.com/", "<html>shell</html>"),
    );
    let mut worker = test_worker(fetcher);

    worker.install().await.unwrap();

    let names = test_names();
    assert_eq!(worker.state(), WorkerState::Installed);
    assert_eq!(worker.store().entry_count(&names.static_cache).unwrap(), 1);
  }

  #[tokio::test]
  async fn test_install_skips_non_200_assets() {
    let mut missing = Response::ok("https://study.example.com/favicon.ico", "");
    missing.status = 404;
    missing.status_text = "Not Found".to_string();

    let fetcher = MockFetcher::offline()
      .respond_with(
        "https://study.example.com/",
        Response::ok("https://study.example.com/", "shell"),
      )
      .respond_with(
        "https://study.example.com/manifest.json",
        Response::ok("https://study.example.com/manifest.json", "{}"),
      )
      .respond_with("https://study.example.com/favicon.ico", missing);
    let mut worker = test_worker(fetcher);

    worker.install().await.unwrap();

    let names = test_names();
    assert_eq!(worker.store().entry_count(&names.static_cache).unwrap(), 2);
    assert!(worker
      .store()
      .get(&names.static_cache, "https://study.example.com/favicon.ico")
      .unwrap()
      .is_none());
  }

  #[tokio::test]
  async fn test_install_twice_is_idempotent() {
    let mut worker = test_worker(shell_fetcher());
    worker.install().await.unwrap();
    worker.install().await.unwrap();

    let names = test_names();
    // One entry per listed URL, no duplicates
    assert_eq!(worker.store().entry_count(&names.static_cache).unwrap(), 3);
  }

  #[tokio::test]
  async fn test_activate_purges_stale_generations() {
    let names = test_names();
    let mut worker = test_worker(MockFetcher::offline());

    // Seed an old generation next to the two current ones
    worker.store().open("lsat-study-tool-v0.9.0").unwrap();
    worker.store().open(&names.static_cache).unwrap();
    worker.store().open(&names.runtime_cache).unwrap();

    worker.activate().await.unwrap();

    let mut remaining = worker.store().cache_names().unwrap();
    remaining.sort();
    let mut expected = vec![names.static_cache.clone(), names.runtime_cache.clone()];
    expected.sort();
    assert_eq!(remaining, expected);
    assert_eq!(worker.state(), WorkerState::Activated);
  }

  #[tokio::test]
  async fn test_activate_claims_clients() {
    let mut worker = test_worker(MockFetcher::offline());
    worker.clients_mut().window("https://study.example.com/");
    worker.clients_mut().window("https://study.example.com/practice");
    assert_eq!(worker.clients().controlled_count(), 0);

    worker.activate().await.unwrap();

    assert_eq!(worker.clients().controlled_count(), 2);
  }
}
