use super::StreamEvent;
use crate::model::Member;
use crate::{LdesError, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The consumer end of a replication
///
/// Pulling an event signals demand: the replication admits fragment fetches
/// only while a pull is waiting for a member. Work already dispatched is
/// allowed to complete, so a few members may be buffered ahead of demand.
pub struct MemberStream {
    events: mpsc::UnboundedReceiver<StreamEvent>,
    demand: mpsc::UnboundedSender<()>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    waiting: bool,
    closed: bool,
}

impl MemberStream {
    pub(crate) fn new(
        events: mpsc::UnboundedReceiver<StreamEvent>,
        demand: mpsc::UnboundedSender<()>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            events,
            demand,
            cancel,
            task: Some(task),
            waiting: false,
            closed: false,
        }
    }

    /// Waits for the next event
    ///
    /// # Returns
    ///
    /// * `Some(event)` - The next member or notification
    /// * `None` - The stream closed or was cancelled
    pub async fn next(&mut self) -> Option<StreamEvent> {
        if self.closed || self.cancel.is_cancelled() {
            return None;
        }

        if !self.waiting {
            // Demand is only lost when the replication already ended
            let _ = self.demand.send(());
            self.waiting = true;
        }

        let event = tokio::select! {
            event = self.events.recv() => event,
            _ = self.cancel.cancelled() => None,
        };

        match &event {
            Some(StreamEvent::Member(_)) => self.waiting = false,
            Some(StreamEvent::Closed) | None => self.closed = true,
            _ => {}
        }
        event
    }

    /// Waits for the next member, skipping notifications
    ///
    /// Errors are logged and skipped.
    pub async fn next_member(&mut self) -> Option<Member> {
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Member(member) => return Some(member),
                StreamEvent::Error(e) => tracing::warn!("Skipping failed item: {}", e),
                other => tracing::trace!("Skipping {}", other.kind()),
            }
        }
        None
    }

    /// Collects every remaining member until the stream closes
    pub async fn collect_members(&mut self) -> Vec<Member> {
        let mut members = Vec::new();
        while let Some(member) = self.next_member().await {
            members.push(member);
        }
        members
    }

    /// Stops the replication
    ///
    /// No member or close event is delivered afterwards. Fetches already
    /// running finish in the background; state stays resumable.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A handle that cancels this stream, e.g. from a signal handler
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels the replication and waits for it to stop
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| LdesError::Task(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for MemberStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
