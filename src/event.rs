//! Lifecycle event dispatch.
//!
//! Events queue up on a channel and the host loop awaits each handler to
//! completion before taking the next one: a single outstanding task per
//! event, the same contract a browser applies to a pending lifecycle
//! event. Callers get replies over oneshot channels.

use color_eyre::{eyre::eyre, Result};
use tokio::sync::{mpsc, oneshot};

use crate::cache::CacheStore;
use crate::http::Request;
use crate::net::Fetcher;
use crate::worker::{ClickOutcome, FetchOutcome, Message, Notification, VersionReply, Worker};

/// A lifecycle event together with its reply channel.
#[derive(Debug)]
pub enum WorkerEvent {
  Install {
    done: oneshot::Sender<Result<()>>,
  },
  Activate {
    done: oneshot::Sender<Result<()>>,
  },
  Fetch {
    request: Request,
    reply: oneshot::Sender<FetchOutcome>,
  },
  Message {
    message: Message,
    reply: oneshot::Sender<Option<VersionReply>>,
  },
  Push {
    payload: Option<Vec<u8>>,
    reply: oneshot::Sender<Notification>,
  },
  NotificationClick {
    action: Option<String>,
    reply: oneshot::Sender<ClickOutcome>,
  },
  Sync {
    tag: String,
    done: oneshot::Sender<Result<()>>,
  },
}

/// Owns the worker and drains the event queue one event at a time.
pub struct EventHost<S, F> {
  worker: Worker<S, F>,
  rx: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl<S: CacheStore, F: Fetcher> EventHost<S, F> {
  pub fn new(worker: Worker<S, F>) -> (Self, WorkerHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { worker, rx }, WorkerHandle { tx })
  }

  /// Run until every handle is dropped.
  pub async fn run(mut self) {
    while let Some(event) = self.rx.recv().await {
      self.dispatch(event).await;
    }
  }

  async fn dispatch(&mut self, event: WorkerEvent) {
    match event {
      WorkerEvent::Install { done } => {
        let result = self.worker.install().await;
        let _ = done.send(result);
      }
      WorkerEvent::Activate { done } => {
        let result = self.worker.activate().await;
        let _ = done.send(result);
      }
      WorkerEvent::Fetch { request, reply } => {
        let outcome = self.worker.respond(&request).await;
        let _ = reply.send(outcome);
      }
      WorkerEvent::Message { message, reply } => {
        let _ = reply.send(self.worker.message(message));
      }
      WorkerEvent::Push { payload, reply } => {
        let _ = reply.send(self.worker.push(payload.as_deref()));
      }
      WorkerEvent::NotificationClick { action, reply } => {
        let _ = reply.send(self.worker.notification_click(action.as_deref()));
      }
      WorkerEvent::Sync { tag, done } => {
        let _ = done.send(self.worker.sync(&tag).await);
      }
    }
  }
}

/// Cloneable sender side used to enqueue events and await their results.
#[derive(Clone)]
pub struct WorkerHandle {
  tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerHandle {
  pub async fn install(&self) -> Result<()> {
    let (done, rx) = oneshot::channel();
    self.send(WorkerEvent::Install { done })?;
    rx.await.map_err(|_| eyre!("worker host stopped"))?
  }

  pub async fn activate(&self) -> Result<()> {
    let (done, rx) = oneshot::channel();
    self.send(WorkerEvent::Activate { done })?;
    rx.await.map_err(|_| eyre!("worker host stopped"))?
  }

  pub async fn fetch(&self, request: Request) -> Result<FetchOutcome> {
    let (reply, rx) = oneshot::channel();
    self.send(WorkerEvent::Fetch { request, reply })?;
    rx.await.map_err(|_| eyre!("worker host stopped"))
  }

  pub async fn message(&self, message: Message) -> Result<Option<VersionReply>> {
    let (reply, rx) = oneshot::channel();
    self.send(WorkerEvent::Message { message, reply })?;
    rx.await.map_err(|_| eyre!("worker host stopped"))
  }

  pub async fn push(&self, payload: Option<Vec<u8>>) -> Result<Notification> {
    let (reply, rx) = oneshot::channel();
    self.send(WorkerEvent::Push { payload, reply })?;
    rx.await.map_err(|_| eyre!("worker host stopped"))
  }

  pub async fn notification_click(&self, action: Option<String>) -> Result<ClickOutcome> {
    let (reply, rx) = oneshot::channel();
    self.send(WorkerEvent::NotificationClick { action, reply })?;
    rx.await.map_err(|_| eyre!("worker host stopped"))
  }

  pub async fn sync(&self, tag: String) -> Result<()> {
    let (done, rx) = oneshot::channel();
    self.send(WorkerEvent::Sync { tag, done })?;
    rx.await.map_err(|_| eyre!("worker host stopped"))?
  }

  fn send(&self, event: WorkerEvent) -> Result<()> {
    self
      .tx
      .send(event)
      .map_err(|_| eyre!("worker host stopped"))
  }
}
