use std::sync::Arc;

use tokio::sync::watch;

use super::document::{Document, DocumentReadyState};

/// Holds the host page's "ready" signal until composition finishes.
///
/// Cloning shares the same gate. Releasing is idempotent and flips the
/// document's ready state to `Complete`.
#[derive(Clone)]
pub struct ReadyGate {
    document: Arc<Document>,
    sender: Arc<watch::Sender<bool>>,
}

impl ReadyGate {
    pub fn new(document: Arc<Document>) -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            document,
            sender: Arc::new(sender),
        }
    }

    pub fn is_released(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn release(&self) {
        let changed = self.sender.send_if_modified(|released| {
            if *released {
                false
            } else {
                *released = true;
                true
            }
        });
        if changed {
            self.document.set_ready_state(DocumentReadyState::Complete);
            tracing::debug!("ready wait released");
        }
    }

    /// Resolves once `release` has been called.
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives in self, so the channel cannot close while we wait.
        let _ = receiver.wait_for(|released| *released).await;
    }
}

impl std::fmt::Debug for ReadyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyGate")
            .field("released", &self.is_released())
            .finish()
    }
}
