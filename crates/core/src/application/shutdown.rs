// Agent shutdown / fatal-stop signal

use tokio::sync::watch;

/// Shutdown signal observed by scheduled jobs and the daemon
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for shutdown signal
    pub async fn wait(&mut self) {
        if self.is_shutdown() {
            return;
        }
        let _ = self.rx.changed().await;
    }
}

/// Shutdown sender
#[derive(Clone)]
pub struct ShutdownSender {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl ShutdownSender {
    /// Signal shutdown to every token holder
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (
        ShutdownSender {
            tx: std::sync::Arc::new(tx),
        },
        ShutdownToken { rx },
    )
}
