use thiserror::Error;

/// Errors raised by queues.
///
/// An empty dequeue, a lost lease, or a repeated complete/abandon are
/// results (`None` / `false`), not errors.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue has been disposed")]
    Disposed,
}
