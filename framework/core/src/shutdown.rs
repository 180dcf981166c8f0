use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Owner side of a stop signal.
///
/// A run holds one handle and hands out a [ShutdownListener] to each session it spawns. Once the
/// handle has been triggered it stays triggered, so listeners created after the fact still observe
/// the signal.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(watch::channel(false).0),
        }
    }

    /// Trigger the signal. Calling this more than once is harmless.
    pub fn shutdown(&self) {
        let previous = self.sender.send_replace(true);
        if !previous {
            log::debug!("Shutdown signal sent");
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

#[derive(Clone, Debug)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Point in time check if the shutdown signal has been sent. If this returns true then work
    /// should be stopped at the next safe point.
    pub fn should_shutdown(&self) -> bool {
        // A dropped handle can never be triggered, which is treated the same as a shutdown.
        *self.receiver.borrow() || self.receiver.has_changed().is_err()
    }

    /// Wait for the shutdown signal. Safe to race against other futures.
    pub async fn wait_for_shutdown(&mut self) {
        if self.receiver.wait_for(|stop| *stop).await.is_err() {
            log::trace!("Shutdown handle dropped while waiting");
        }
    }

    /// Run `fut` to completion unless the shutdown signal arrives first.
    pub async fn cancellable<F>(&mut self, fut: F) -> Result<F::Output, CancelledError>
    where
        F: Future,
    {
        if self.should_shutdown() {
            return Err(CancelledError::default());
        }

        tokio::select! {
            output = fut => Ok(output),
            _ = self.wait_for_shutdown() => Err(CancelledError::default()),
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
pub struct CancelledError {
    msg: String,
}

impl Default for CancelledError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn late_listener_sees_earlier_shutdown() {
        let handle = ShutdownHandle::new();
        handle.shutdown();

        let listener = handle.new_listener();
        assert!(listener.should_shutdown());
        assert!(handle.is_shutdown());
    }

    #[test]
    fn listener_is_quiet_until_shutdown() {
        let handle = ShutdownHandle::new();
        let listener = handle.new_listener();
        assert!(!listener.should_shutdown());

        handle.shutdown();
        handle.shutdown();
        assert!(listener.should_shutdown());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellable_returns_output_when_not_stopped() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        let out = listener
            .cancellable(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                7
            })
            .await;

        assert_eq!(Ok(7), out);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellable_is_interrupted_by_shutdown() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.shutdown();
        });

        let out = listener
            .cancellable(tokio::time::sleep(Duration::from_secs(60)))
            .await;

        assert_eq!(Err(CancelledError::default()), out);
    }
}
