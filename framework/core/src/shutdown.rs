use tokio::sync::watch;

/// Signals the running orchestration that it should stop as soon as possible.
///
/// Cloning the handle shares the same signal. Once triggered it stays triggered.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: watch::Sender<bool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: watch::channel(false).0,
        }
    }

    pub fn shutdown(&self) {
        // `send_replace` never fails, even when nobody is listening.
        let previous = self.sender.send_replace(true);
        if !previous {
            log::warn!("Shutdown requested, aborting the run");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Wait for the shutdown signal. Returns immediately if the signal was already sent, so this
    /// can be raced against other work to cancel it.
    pub async fn wait_for_shutdown(&mut self) {
        // An error means the handle is gone, in which case nobody can ever trigger shutdown and
        // waiting forever is the correct behaviour.
        if self.receiver.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Returned when work is cut short by the [ShutdownHandle].
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct RunAbortedError {
    msg: String,
}

impl Default for RunAbortedError {
    fn default() -> Self {
        Self {
            msg: "Run aborted by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn listener_wakes_after_shutdown() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();
        assert!(!handle.is_shutdown());

        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.shutdown();
        });

        tokio::time::timeout(Duration::from_secs(5), listener.wait_for_shutdown())
            .await
            .expect("listener was not woken");
        assert!(handle.is_shutdown());
    }

    #[tokio::test]
    async fn late_listener_sees_earlier_shutdown() {
        let handle = ShutdownHandle::new();
        handle.shutdown();

        let mut listener = handle.new_listener();
        tokio::time::timeout(Duration::from_secs(1), listener.wait_for_shutdown())
            .await
            .expect("listener should return immediately");
    }

    #[test]
    fn aborted_error_message() {
        assert_eq!(
            RunAbortedError::default().to_string(),
            "Run aborted by shutdown signal"
        );
    }
}
