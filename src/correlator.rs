use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use proxy_message::Message;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ProxyError;

pub type Outcome = Result<Box<dyn Message>, ProxyError>;

struct Pending {
    tx: oneshot::Sender<Outcome>,
    deadline: Option<Instant>,
}

/// Pairs outbound request ids with the replies that answer them.
///
/// Every registered request ends in exactly one of: resolved, timed out or
/// cancelled. Whichever path removes the pending entry first decides.
pub struct Correlator {
    last_request_id: AtomicI64,
    pending: Arc<DashMap<i64, Pending>>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self {
            last_request_id: AtomicI64::new(0),
            pending: Arc::new(DashMap::new()),
        }
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id for a proxy to library request.
    pub fn next_request_id(&self) -> i64 {
        self.last_request_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn register(&self, request_id: i64, deadline: Option<Instant>) -> Waiter {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, Pending { tx, deadline });
        Waiter {
            request_id,
            deadline,
            rx,
            pending: self.pending.clone(),
        }
    }

    /// Hands `reply` to whoever waits on `request_id`.
    ///
    /// Fails with [`ProxyError::Unroutable`] when nothing is waiting, e.g. the
    /// request already timed out or a duplicate reply arrived.
    pub fn resolve(&self, request_id: i64, reply: Box<dyn Message>) -> Result<(), ProxyError> {
        let (_, pending) = self
            .pending
            .remove(&request_id)
            .ok_or(ProxyError::Unroutable(request_id))?;
        if let Some(deadline) = pending.deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            debug!(request_id, remaining_ms = remaining.as_millis() as u64, "reply arrived");
        }
        pending
            .tx
            .send(Ok(reply))
            .map_err(|_| ProxyError::Unroutable(request_id))
    }

    /// Wakes the waiter with a cancellation. Returns `false` when nothing was pending.
    pub fn cancel(&self, request_id: i64) -> bool {
        match self.pending.remove(&request_id) {
            Some((_, pending)) => {
                let _ = pending.tx.send(Err(ProxyError::Cancelled(request_id)));
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// The receiving end of one registered request. Dropping it forgets the request.
pub struct Waiter {
    request_id: i64,
    deadline: Option<Instant>,
    rx: oneshot::Receiver<Outcome>,
    pending: Arc<DashMap<i64, Pending>>,
}

impl Waiter {
    pub fn request_id(&self) -> i64 {
        self.request_id
    }

    pub async fn wait(mut self) -> Outcome {
        let request_id = self.request_id;
        let received = match self.deadline {
            None => (&mut self.rx).await,
            Some(deadline) => match tokio::time::timeout_at(deadline, &mut self.rx).await {
                Ok(received) => received,
                Err(_) => {
                    if self.pending.remove(&request_id).is_some() {
                        return Err(ProxyError::Timeout(request_id));
                    }
                    // resolve or cancel won the race and is about to send
                    (&mut self.rx).await
                }
            },
        };
        received.unwrap_or(Err(ProxyError::TransportClosed))
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.pending.remove(&self.request_id);
    }
}
