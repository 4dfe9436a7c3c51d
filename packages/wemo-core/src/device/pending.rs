//! Pending result handle for asynchronous action invocation.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;

use super::service::{ActionCause, ActionError, ActionOutput};

type Outcome = Result<ActionOutput, ActionError>;

/// Handle to an action that is running in the background.
///
/// Resolves exactly once, to the action's output or to an [`ActionError`].
/// Awaiting it directly waits indefinitely; [`PendingResult::wait`] bounds
/// the wait.
#[must_use = "an action result is lost unless the handle is awaited"]
pub struct PendingResult {
    rx: oneshot::Receiver<Outcome>,
    device: String,
    service: String,
    action: String,
}

impl PendingResult {
    pub(crate) fn channel(
        device: &str,
        service: &str,
        action: &str,
    ) -> (oneshot::Sender<Outcome>, Self) {
        let (tx, rx) = oneshot::channel();
        let pending = Self {
            rx,
            device: device.to_string(),
            service: service.to_string(),
            action: action.to_string(),
        };
        (tx, pending)
    }

    /// Name of the action this handle belongs to.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Waits at most `timeout` for the result.
    pub async fn wait(self, timeout: Duration) -> Outcome {
        let device = self.device.clone();
        let service = self.service.clone();
        let action = self.action.clone();
        match tokio::time::timeout(timeout, self).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ActionError {
                device,
                service,
                action,
                cause: ActionCause::Timeout(timeout),
            }),
        }
    }

    fn error(&self, cause: ActionCause) -> ActionError {
        ActionError {
            device: self.device.clone(),
            service: self.service.clone(),
            action: self.action.clone(),
            cause,
        }
    }
}

impl Future for PendingResult {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(self.error(ActionCause::Cancelled))),
            Poll::Pending => Poll::Pending,
        }
    }
}
