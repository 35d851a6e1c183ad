//! Background sync handling.

use color_eyre::Result;
use tracing::{debug, info};

use super::Worker;
use crate::cache::CacheStore;
use crate::net::Fetcher;

/// Sync tag registered by the page when study progress needs uploading.
pub const SYNC_STUDY_PROGRESS: &str = "sync-study-progress";

impl<S: CacheStore, F: Fetcher> Worker<S, F> {
  /// Handle a background sync event. Tags outside the configured set are
  /// ignored.
  pub async fn sync(&self, tag: &str) -> Result<()> {
    if !self.settings().sync_tags.iter().any(|t| t == tag) {
      debug!(tag, "ignoring unknown sync tag");
      return Ok(());
    }

    match tag {
      SYNC_STUDY_PROGRESS => self.sync_study_progress().await,
      _ => Ok(()),
    }
  }

  /// No progress backend exists yet. The tag is acknowledged and this
  /// becomes a real upload once one does.
  async fn sync_study_progress(&self) -> Result<()> {
    info!("study progress sync requested, no backend configured");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::super::testutil::{test_worker, MockFetcher};
  use super::*;

  #[tokio::test]
  async fn test_known_tag_is_accepted() {
    let worker = test_worker(MockFetcher::offline());
    assert!(worker.sync(SYNC_STUDY_PROGRESS).await.is_ok());
  }

  #[tokio::test]
  async fn test_unknown_tag_is_ignored() {
    let worker = test_worker(MockFetcher::offline());
    assert!(worker.sync("sync-something-else").await.is_ok());
  }
}
