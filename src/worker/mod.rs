//! The cache worker itself.
//!
//! Holds the two current cache generations, the app-shell asset list and
//! the runtime admission policy, and answers the lifecycle events the host
//! dispatches: install, activate, fetch, message, push, notification click
//! and background sync.

mod fetch;
mod lifecycle;
mod message;
mod push;
mod sync;

pub use fetch::FetchOutcome;
pub use message::{Message, VersionReply};
pub use push::{
  ClickOutcome, ClientId, ClientRegistry, Notification, NotificationAction, ACTION_DISMISS,
  ACTION_START,
};
pub use sync::SYNC_STUDY_PROGRESS;

use color_eyre::Result;

use crate::cache::{CacheStore, RuntimePolicy};
use crate::config::{CacheNames, Config, PushConfig};
use crate::net::Fetcher;

/// Lifecycle states of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
  /// Initial state, nothing cached yet
  #[default]
  Parsed,
  /// Install event in progress
  Installing,
  /// Installed, waiting to activate
  Installed,
  /// Activate event in progress
  Activating,
  /// Active and controlling clients
  Activated,
}

/// Everything the worker needs, resolved once at startup.
///
/// Cache identifiers and asset URLs are fixed for the lifetime of the
/// worker; a new deploy means a new worker with new settings.
#[derive(Debug)]
pub struct WorkerSettings {
  pub names: CacheNames,
  /// Scope URL clients are matched against
  pub scope: String,
  /// Absolute shell asset URLs, in precache order
  pub shell_assets: Vec<String>,
  /// Absolute URL of the offline navigation fallback document
  pub fallback_url: String,
  pub policy: RuntimePolicy,
  pub excluded_schemes: Vec<String>,
  pub push: PushConfig,
  pub sync_tags: Vec<String>,
}

impl WorkerSettings {
  pub fn from_config(config: &Config) -> Result<Self> {
    let shell_assets = config
      .shell_assets
      .iter()
      .map(|path| config.resolve(path))
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      names: CacheNames::new(&config.app),
      scope: config.resolve("/")?,
      shell_assets,
      fallback_url: config.resolve(&config.fallback_path)?,
      policy: RuntimePolicy::from_config(&config.runtime_cache)?,
      excluded_schemes: config.excluded_schemes.clone(),
      push: config.push.clone(),
      sync_tags: config.sync_tags.clone(),
    })
  }
}

/// A single worker version bound to a cache store and a fetcher.
pub struct Worker<S, F> {
  settings: WorkerSettings,
  store: S,
  fetcher: F,
  state: WorkerState,
  skip_waiting: bool,
  clients: ClientRegistry,
}

impl<S: CacheStore, F: Fetcher> Worker<S, F> {
  pub fn new(settings: WorkerSettings, store: S, fetcher: F) -> Self {
    Self {
      settings,
      store,
      fetcher,
      state: WorkerState::Parsed,
      skip_waiting: false,
      clients: ClientRegistry::new(),
    }
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn settings(&self) -> &WorkerSettings {
    &self.settings
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub(crate) fn fetcher(&self) -> &F {
    &self.fetcher
  }

  /// The current worker version, reported to pages over `GET_VERSION`.
  pub fn version(&self) -> &str {
    &self.settings.names.static_cache
  }

  /// Whether this version asked to activate without waiting.
  pub fn skips_waiting(&self) -> bool {
    self.skip_waiting
  }

  /// Client bookkeeping (the host registers open windows here).
  pub fn clients_mut(&mut self) -> &mut ClientRegistry {
    &mut self.clients
  }

  pub fn clients(&self) -> &ClientRegistry {
    &self.clients
  }

  pub(crate) fn set_state(&mut self, state: WorkerState) {
    self.state = state;
  }

  pub(crate) fn set_skip_waiting(&mut self) {
    self.skip_waiting = true;
  }
}

#[cfg(test)]
pub(crate) mod testutil {
  use color_eyre::{eyre::eyre, Result};
  use std::collections::HashMap;
  use std::sync::Mutex;

  use super::*;
  use crate::cache::MemoryStore;
  use crate::config::AppConfig;
  use crate::http::{Request, Response};

  /// Fetcher double: canned per-URL outcomes, records every request.
  /// URLs without a canned response fail, which doubles as "offline".
  pub struct MockFetcher {
    responses: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<Request>>,
  }

  impl MockFetcher {
    pub fn offline() -> Self {
      Self {
        responses: Mutex::new(HashMap::new()),
        calls: Mutex::new(Vec::new()),
      }
    }

    pub fn respond_with(self, url: &str, response: Response) -> Self {
      self.responses.lock().unwrap().insert(url.to_string(), response);
      self
    }

    pub fn calls(&self) -> Vec<Request> {
      self.calls.lock().unwrap().clone()
    }
  }

  impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
      self.calls.lock().unwrap().push(request.clone());
      match self.responses.lock().unwrap().get(&request.url) {
        Some(response) => Ok(response.clone()),
        None => Err(eyre!("network unreachable: {}", request.url)),
      }
    }
  }

  pub fn test_settings() -> WorkerSettings {
    let config: Config = serde_yaml::from_str(
      r#"
app:
  name: lsat-study-tool
  version: 1.0.0
upstream: https://study.example.com
"#,
    )
    .unwrap();
    WorkerSettings::from_config(&config).unwrap()
  }

  pub fn test_worker(fetcher: MockFetcher) -> Worker<MemoryStore, MockFetcher> {
    Worker::new(test_settings(), MemoryStore::new(), fetcher)
  }

  pub fn test_names() -> CacheNames {
    CacheNames::new(&AppConfig {
      name: "lsat-study-tool".to_string(),
      version: "1.0.0".to_string(),
    })
  }
}
