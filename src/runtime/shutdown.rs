//! Graceful shutdown handling
//!
//! Watch-based shutdown signaling fanned out to the tracker and any
//! auxiliary servers.

use std::sync::Arc;

use tokio::sync::watch;

/// Process-level shutdown signal
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Create a new, untriggered signal
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Trigger shutdown; every listener wakes
    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }

    /// Whether shutdown has been triggered
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Create a listener for this signal
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Clone for ShutdownSignal {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`ShutdownSignal`]
#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Wait until shutdown is triggered. Returns immediately if it
    /// already was, or if the signal was dropped.
    pub async fn wait(&mut self) {
        if *self.receiver.borrow() {
            return;
        }
        while self.receiver.changed().await.is_ok() {
            if *self.receiver.borrow() {
                return;
            }
        }
        // Sender gone; treat as shutdown.
    }

    /// Whether shutdown has been triggered
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }
}
