use nvsm_core::{Message, StreamKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, trace};

const KINDS: usize = 3;

fn slot(kind: StreamKind) -> usize {
    match kind {
        StreamKind::Processes   => 0,
        StreamKind::Utilization => 1,
        StreamKind::Memory      => 2,
    }
}

/// One flag per stream, set while that stream has an update in the queue.
#[derive(Debug, Default)]
struct Pending([AtomicBool; KINDS]);

impl Pending {
    fn flag(&self, kind: StreamKind) -> &AtomicBool {
        &self.0[slot(kind)]
    }
}

/// Sends the no-payload "data updated" event for a stream.
///
/// Called from the poll thread, so it never blocks.  Updates coalesce per
/// stream: while one is queued for a stream, further updates for that
/// stream are dropped, since the consumer reads the latest snapshot when it
/// gets to the queued one.  Other streams are never crowded out.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx:      mpsc::Sender<Message>,
    pending: Arc<Pending>,
}

impl Notifier {
    /// Create a notifier and the [`Updates`] the presentation layer listens on.
    pub fn channel() -> (Self, Updates) {
        // At most one queued update per stream, so this never fills up.
        let (tx, rx) = mpsc::channel(KINDS);
        let pending = Arc::new(Pending::default());
        (
            Self { tx, pending: pending.clone() },
            Updates { rx, pending },
        )
    }

    pub fn data_updated(&self, kind: StreamKind) {
        let flag = self.pending.flag(kind);
        if flag.swap(true, Ordering::SeqCst) {
            debug!(stream = %kind, "update already queued; coalesced");
            return;
        }
        if self.tx.try_send(Message::DataUpdated(kind)).is_err() {
            flag.store(false, Ordering::SeqCst);
            trace!(stream = %kind, "no consumer listening");
        }
    }
}

/// Receiving end of a [`Notifier`].
///
/// Receiving an update re-arms its stream, so the next completed pass of
/// that stream is delivered again.
#[derive(Debug)]
pub struct Updates {
    rx:      mpsc::Receiver<Message>,
    pending: Arc<Pending>,
}

impl Updates {
    /// Wait for the next update; `None` once every notifier is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        let msg = self.rx.recv().await?;
        Some(self.settle(msg))
    }

    pub fn try_recv(&mut self) -> Result<Message, TryRecvError> {
        let msg = self.rx.try_recv()?;
        Ok(self.settle(msg))
    }

    fn settle(&self, msg: Message) -> Message {
        let Message::DataUpdated(kind) = &msg;
        self.pending.flag(*kind).store(false, Ordering::SeqCst);
        msg
    }
}
