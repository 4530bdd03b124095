//! Event system for component lifecycle callbacks.
//!
//! Cache expirations and queue transitions are surfaced through a listener
//! registry. Listeners are registered under a [`ListenerId`] token and can
//! be removed at any time; firing iterates a snapshot taken outside the
//! owning component's locks, so listeners never observe (or block) internal
//! critical sections.

#[cfg(feature = "tracing")]
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Trait for events emitted by foundatio components.
pub trait Event: Send + Sync + fmt::Debug {
    /// Returns the kind of event (e.g., "enqueued", "item_expired").
    fn event_type(&self) -> &'static str;

    /// Returns when this event occurred.
    fn timestamp(&self) -> Instant;

    /// Returns the name of the component instance that emitted this event.
    fn source(&self) -> &str;
}

/// Trait for listening to component events.
pub trait EventListener<E: Event>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

/// Token identifying a registered listener, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registry<E: Event> {
    listeners: Vec<(ListenerId, Arc<dyn EventListener<E>>)>,
    next_id: u64,
}

/// A shared, mutable collection of event listeners.
///
/// Cloning yields a handle to the same registry.
pub struct EventListeners<E: Event> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: Event> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: Event> EventListeners<E> {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Adds a listener and returns its removal token.
    pub fn add<L>(&self, listener: L) -> ListenerId
    where
        L: EventListener<E> + 'static,
    {
        let mut registry = self.registry.lock().unwrap();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if the token is unknown.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.lock().unwrap();
        let before = registry.listeners.len();
        registry.listeners.retain(|(lid, _)| *lid != id);
        registry.listeners.len() != before
    }

    /// Emits an event to all registered listeners.
    ///
    /// A panicking listener is caught so the remaining listeners still run.
    /// With the `tracing` feature enabled, panics are logged as warnings.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Arc<dyn EventListener<E>>> = {
            let registry = self.registry.lock().unwrap();
            registry
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };

        for listener in snapshot {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            if let Err(_panic_payload) = result {
                #[cfg(feature = "tracing")]
                log_listener_panic(event, _panic_payload.as_ref());
            }
        }
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.registry.lock().unwrap().listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.registry.lock().unwrap().listeners.len()
    }
}

impl<E: Event> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A simple function-based event listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Creates a new function-based listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: Event,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

#[cfg(feature = "tracing")]
fn log_listener_panic<E: Event>(event: &E, panic_payload: &(dyn Any + Send)) {
    let panic_message = panic_payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic_payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    tracing::warn!(
        source = event.source(),
        event_type = event.event_type(),
        panic_message = %panic_message,
        "event listener panicked"
    );
}
