//! Page-side registration bookkeeping.
//!
//! The hosting page registers the worker script, watches new versions move
//! through installing → waiting → active, and may prompt the user to
//! reload when an update is ready. Nothing here reloads anything; that
//! decision belongs to the page.

use sha2::{Digest, Sha256};

/// Identity of a deployed worker version: its cache generation plus a
/// digest of the shell manifest, so content changes are detected even when
/// the version string did not move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerVersion {
  pub cache_name: String,
  pub digest: String,
}

impl WorkerVersion {
  pub fn compute(cache_name: &str, shell_assets: &[String]) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(cache_name.as_bytes());
    for asset in shell_assets {
      hasher.update([0u8]);
      hasher.update(asset.as_bytes());
    }
    Self {
      cache_name: cache_name.to_string(),
      digest: hex::encode(hasher.finalize()),
    }
  }
}

/// One worker registration for a scope.
#[derive(Debug)]
pub struct Registration {
  script_url: String,
  scope: String,
  installing: Option<WorkerVersion>,
  waiting: Option<WorkerVersion>,
  active: Option<WorkerVersion>,
}

impl Registration {
  pub fn new(script_url: impl Into<String>, scope: impl Into<String>) -> Self {
    Self {
      script_url: script_url.into(),
      scope: scope.into(),
      installing: None,
      waiting: None,
      active: None,
    }
  }

  pub fn script_url(&self) -> &str {
    &self.script_url
  }

  pub fn scope(&self) -> &str {
    &self.scope
  }

  /// Start installing `version` unless the same content is already active.
  /// Returns whether an install began.
  pub fn register(&mut self, version: WorkerVersion) -> bool {
    if self
      .active
      .as_ref()
      .is_some_and(|active| active.digest == version.digest)
    {
      return false;
    }
    self.installing = Some(version);
    true
  }

  /// The installing version finished its install and now waits.
  pub fn installed(&mut self) {
    if let Some(version) = self.installing.take() {
      self.waiting = Some(version);
    }
  }

  /// An update is ready when a freshly installed version waits behind an
  /// active one; the page may now prompt for a reload.
  pub fn update_available(&self) -> bool {
    self.waiting.is_some() && self.active.is_some()
  }

  /// Promote the waiting version; whatever was active becomes redundant.
  pub fn activate(&mut self) {
    if let Some(version) = self.waiting.take() {
      self.active = Some(version);
    }
  }

  pub fn active(&self) -> Option<&WorkerVersion> {
    self.active.as_ref()
  }

  pub fn waiting(&self) -> Option<&WorkerVersion> {
    self.waiting.as_ref()
  }
}
