//! Page-to-worker control messages.

use serde::{Deserialize, Serialize};

use super::Worker;
use crate::cache::CacheStore;
use crate::net::Fetcher;

/// Commands a controlled page may post to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
  /// Activate immediately instead of waiting for old tabs to close
  #[serde(rename = "SKIP_WAITING")]
  SkipWaiting,
  /// Ask which version is currently in control
  #[serde(rename = "GET_VERSION")]
  GetVersion,
}

/// Reply to a `GET_VERSION` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
  pub version: String,
}

impl<S: CacheStore, F: Fetcher> Worker<S, F> {
  /// Handle a control message. Only `GET_VERSION` produces a reply.
  pub fn message(&mut self, message: Message) -> Option<VersionReply> {
    match message {
      Message::SkipWaiting => {
        self.skip_waiting();
        None
      }
      Message::GetVersion => Some(VersionReply {
        version: self.version().to_string(),
      }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::super::testutil::{test_worker, MockFetcher};
  use super::*;

  #[test]
  fn test_message_wire_format() {
    let msg: Message = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
    assert_eq!(msg, Message::SkipWaiting);

    let msg: Message = serde_json::from_str(r#"{"type":"GET_VERSION"}"#).unwrap();
    assert_eq!(msg, Message::GetVersion);

    assert!(serde_json::from_str::<Message>(r#"{"type":"REBOOT"}"#).is_err());
  }

  #[test]
  fn test_get_version_reports_static_cache_name() {
    let mut worker = test_worker(MockFetcher::offline());
    let reply = worker.message(Message::GetVersion).unwrap();
    assert_eq!(reply.version, "lsat-study-tool-v1.0.0");
  }

  #[test]
  fn test_skip_waiting_sets_flag() {
    let mut worker = test_worker(MockFetcher::offline());
    assert!(!worker.skips_waiting());
    assert!(worker.message(Message::SkipWaiting).is_none());
    assert!(worker.skips_waiting());
  }
}
