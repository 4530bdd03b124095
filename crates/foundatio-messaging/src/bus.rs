//! The message bus contract.
//!
//! [`MessageBus`] is object-safe and works with type-erased payloads so
//! providers can be shared as `Arc<dyn MessageBus>`; [`MessageBusExt`]
//! layers the typed publish/subscribe surface on top. Routing is by the
//! payload's concrete type: a subscriber for `T` receives exactly the
//! messages published as `T`.

use crate::error::MessagingError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::any::{Any, TypeId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Marker for types that can travel through a bus: cloneable (each
/// subscriber receives its own copy) and type-erasable.
pub trait MessageBody: Any + Clone + Send + Sync + 'static {}

impl<T: Any + Clone + Send + Sync + 'static> MessageBody for T {}

/// A published message in type-erased form.
#[derive(Clone)]
pub struct MessagePayload {
    type_id: TypeId,
    type_name: &'static str,
    body: Arc<dyn Any + Send + Sync>,
}

impl MessagePayload {
    pub fn new<T: MessageBody>(message: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            body: Arc::new(message),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified name of the payload type, used as the routing
    /// header when a message crosses a process boundary.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn body(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::clone(&self.body)
    }
}

impl std::fmt::Debug for MessagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePayload")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Identifies one subscription for the lifetime of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Type-erased subscription handler. The typed wrapper built by
/// [`MessageBusExt::subscribe`] downcasts and clones the payload before
/// invoking user code.
pub type ErasedHandler =
    Arc<dyn Fn(Arc<dyn Any + Send + Sync>, CancellationToken) -> BoxFuture<'static, ()> + Send + Sync>;

/// Topic-less, type-routed publish/subscribe.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Delivers `payload` to every live subscription registered for its
    /// type. With `delay`, publication is deferred until `now + delay`;
    /// the message is delivered even after this call has returned.
    async fn publish_payload(
        &self,
        payload: MessagePayload,
        delay: Option<Duration>,
    ) -> Result<(), MessagingError>;

    /// Registers a handler for messages of `type_id`. The handler runs
    /// sequentially per subscription until `cancellation` fires, the
    /// subscription is removed, or the bus is disposed.
    async fn subscribe_erased(
        &self,
        type_id: TypeId,
        handler: ErasedHandler,
        cancellation: CancellationToken,
    ) -> Result<SubscriptionId, MessagingError>;

    /// Removes a subscription. Returns false for unknown ids.
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, MessagingError>;
}

/// Typed convenience methods over any [`MessageBus`].
#[async_trait]
pub trait MessageBusExt: MessageBus {
    async fn publish<T: MessageBody>(&self, message: T) -> Result<(), MessagingError> {
        self.publish_payload(MessagePayload::new(message), None)
            .await
    }

    async fn publish_delayed<T: MessageBody>(
        &self,
        message: T,
        delay: Duration,
    ) -> Result<(), MessagingError> {
        self.publish_payload(MessagePayload::new(message), Some(delay))
            .await
    }

    /// Subscribes a typed handler. Each delivery hands the handler its own
    /// copy of the message plus the subscription's cancellation token.
    async fn subscribe<T, F, Fut>(
        &self,
        handler: F,
        cancellation: CancellationToken,
    ) -> Result<SubscriptionId, MessagingError>
    where
        T: MessageBody,
        F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: ErasedHandler = Arc::new(move |body, token| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                if let Ok(message) = body.downcast::<T>() {
                    handler(T::clone(&message), token).await;
                }
            })
        });
        self.subscribe_erased(TypeId::of::<T>(), erased, cancellation)
            .await
    }
}

impl<B: MessageBus + ?Sized> MessageBusExt for B {}
