//! Push notifications and notification-click routing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::Worker;
use crate::cache::CacheStore;
use crate::config::PushConfig;
use crate::net::Fetcher;

/// Notification action inviting the user to start a session.
pub const ACTION_START: &str = "start-study";
/// Notification action dismissing the reminder.
pub const ACTION_DISMISS: &str = "dismiss";

/// A study-reminder notification as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub tag: String,
  pub require_interaction: bool,
  pub actions: Vec<NotificationAction>,
  /// Where a click takes the user
  pub url: String,
  /// Extra payload data carried along
  pub data: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
  pub action: String,
  pub title: String,
}

impl Notification {
  fn from_defaults(push: &PushConfig) -> Self {
    Self {
      title: push.title.clone(),
      body: push.body.clone(),
      icon: push.icon.clone(),
      badge: push.badge.clone(),
      tag: push.tag.clone(),
      require_interaction: push.require_interaction,
      actions: vec![
        NotificationAction {
          action: ACTION_START.to_string(),
          title: "Start Studying".to_string(),
        },
        NotificationAction {
          action: ACTION_DISMISS.to_string(),
          title: "Later".to_string(),
        },
      ],
      url: push.url.clone(),
      data: BTreeMap::new(),
    }
  }
}

/// Optional JSON body of a push event.
#[derive(Debug, Deserialize)]
struct PushPayload {
  body: Option<String>,
  #[serde(default)]
  data: BTreeMap<String, serde_json::Value>,
}

/// What happened in response to a notification click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
  /// An already-open client was brought to the front
  Focused(ClientId),
  /// No matching client existed; a new one was opened
  Opened(ClientId),
  /// The user dismissed the reminder
  Dismissed,
}

impl<S: CacheStore, F: Fetcher> Worker<S, F> {
  /// Build the notification for a push event.
  ///
  /// A well-formed payload may override the body and attach extra data; a
  /// malformed one is logged and ignored and the defaults are shown.
  pub fn push(&self, payload: Option<&[u8]>) -> Notification {
    let mut notification = Notification::from_defaults(&self.settings().push);

    if let Some(raw) = payload {
      match serde_json::from_slice::<PushPayload>(raw) {
        Ok(parsed) => {
          if let Some(body) = parsed.body {
            notification.body = body;
          }
          notification.data.extend(parsed.data);
          if let Some(serde_json::Value::String(url)) = notification.data.get("url") {
            notification.url = url.clone();
          }
        }
        Err(e) => warn!(error = %e, "invalid push payload, using defaults"),
      }
    }

    info!(tag = %notification.tag, "showing notification");
    notification
  }

  /// Route a notification click: the start action (or a plain click)
  /// focuses an open client at the worker scope, opening one if needed;
  /// anything else is a dismissal.
  pub fn notification_click(&mut self, action: Option<&str>) -> ClickOutcome {
    match action {
      None => self.focus_or_open(),
      Some(a) if a == ACTION_START => self.focus_or_open(),
      Some(_) => ClickOutcome::Dismissed,
    }
  }

  fn focus_or_open(&mut self) -> ClickOutcome {
    let scope = self.settings().scope.clone();
    self.clients_mut().focus_or_open(&scope)
  }
}

/// Identifier of an open client window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

#[derive(Debug)]
struct Client {
  id: ClientId,
  url: String,
  controlled: bool,
}

/// Open client windows known to the worker.
#[derive(Debug, Default)]
pub struct ClientRegistry {
  next_id: u64,
  clients: Vec<Client>,
}

impl ClientRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register an open window. New windows start uncontrolled until the
  /// worker activates and claims them.
  pub fn window(&mut self, url: impl Into<String>) -> ClientId {
    self.next_id += 1;
    let id = ClientId(self.next_id);
    self.clients.push(Client {
      id,
      url: url.into(),
      controlled: false,
    });
    id
  }

  /// Take control of every open window immediately.
  pub fn claim_all(&mut self) {
    for client in &mut self.clients {
      client.controlled = true;
    }
  }

  /// Focus the first window at `scope`, or open a new one there.
  pub fn focus_or_open(&mut self, scope: &str) -> ClickOutcome {
    if let Some(client) = self.clients.iter().find(|c| c.url == scope) {
      return ClickOutcome::Focused(client.id);
    }
    ClickOutcome::Opened(self.window(scope))
  }

  pub fn controlled_count(&self) -> usize {
    self.clients.iter().filter(|c| c.controlled).count()
  }

  pub fn len(&self) -> usize {
    self.clients.len()
  }

  pub fn is_empty(&self) -> bool {
    self.clients.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::super::testutil::{test_worker, MockFetcher};
  use super::*;

  #[test]
  fn test_push_without_payload_uses_defaults() {
    let worker = test_worker(MockFetcher::offline());
    let notification = worker.push(None);

    assert_eq!(notification.title, "Study reminder");
    assert_eq!(notification.body, "Time for your study session!");
    assert_eq!(notification.tag, "study-reminder");
    assert_eq!(notification.actions.len(), 2);
    assert_eq!(notification.actions[0].action, ACTION_START);
    assert_eq!(notification.actions[1].action, ACTION_DISMISS);
  }

  #[test]
  fn test_push_payload_overrides_body() {
    let worker = test_worker(MockFetcher::offline());
    let payload = br#"{"body":"Two days until the exam!","data":{"streak":7}}"#;
    let notification = worker.push(Some(payload));

    assert_eq!(notification.body, "Two days until the exam!");
    assert_eq!(
      notification.data.get("streak"),
      Some(&serde_json::json!(7))
    );
    // Untouched fields keep their defaults
    assert_eq!(notification.title, "Study reminder");
  }

  #[test]
  fn test_push_payload_can_redirect_click_target() {
    let worker = test_worker(MockFetcher::offline());
    let payload = br#"{"data":{"url":"/practice"}}"#;
    let notification = worker.push(Some(payload));
    assert_eq!(notification.url, "/practice");
  }

  #[test]
  fn test_malformed_push_payload_degrades_to_defaults() {
    let worker = test_worker(MockFetcher::offline());
    let notification = worker.push(Some(b"{not json"));

    assert_eq!(notification.body, "Time for your study session!");
    assert!(notification.data.is_empty());
  }

  #[test]
  fn test_click_focuses_existing_client() {
    let mut worker = test_worker(MockFetcher::offline());
    let id = worker.clients_mut().window("https://study.example.com/");

    let outcome = worker.notification_click(Some(ACTION_START));
    assert_eq!(outcome, ClickOutcome::Focused(id));
    assert_eq!(worker.clients().len(), 1);
  }

  #[test]
  fn test_click_opens_window_when_none_match() {
    let mut worker = test_worker(MockFetcher::offline());
    worker.clients_mut().window("https://elsewhere.example.com/");

    let outcome = worker.notification_click(None);
    match outcome {
      ClickOutcome::Opened(_) => {}
      other => panic!("expected a new window, got {:?}", other),
    }
    assert_eq!(worker.clients().len(), 2);
  }

  #[test]
  fn test_dismiss_action_does_nothing() {
    let mut worker = test_worker(MockFetcher::offline());
    let outcome = worker.notification_click(Some(ACTION_DISMISS));
    assert_eq!(outcome, ClickOutcome::Dismissed);
    assert!(worker.clients().is_empty());
  }
}
