use foundatio_cache::CacheError;
use foundatio_messaging::MessagingError;
use thiserror::Error;

/// Errors raised by lock providers.
///
/// Contention and timeouts are not errors: `acquire` returns `Ok(None)`
/// and `renew` returns `Ok(false)` for those.
#[derive(Debug, Error)]
pub enum LockError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),
}
