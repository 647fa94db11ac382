use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::model::{Dialog, Notification, PortEvent, Severity};

const CHANNEL_SIZE: usize = 256;

/// Sending half of the notification channel.
///
/// Sends never block and never fail: with no subscriber the message is
/// dropped, a lagging subscriber skips ahead.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Arc<Notification>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.tx.subscribe()
    }

    pub fn send(&self, notification: Notification) {
        debug!(?notification, "notify");
        let _ = self.tx.send(Arc::new(notification));
    }

    pub fn info(&self, text: impl Into<String>) {
        self.send(Notification::status(Severity::Info, text));
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.send(Notification::status(Severity::Warning, text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.send(Notification::status(Severity::Error, text));
    }

    pub fn dialog(&self, dialog: Dialog) {
        self.send(Notification::Dialog(dialog));
    }

    pub fn port(&self, event: PortEvent) {
        self.send(Notification::Port(event));
    }
}
