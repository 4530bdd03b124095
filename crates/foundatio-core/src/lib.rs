//! Core infrastructure shared by the foundatio building blocks.
//!
//! This crate provides the small set of primitives every other foundatio
//! crate builds on:
//!
//! - **Clock abstraction**: an injected time source ([`Clock`]) with a
//!   production implementation ([`SystemClock`]) and a frozen, manually
//!   advanced implementation for tests ([`TestClock`]).
//! - **Event system**: a listener registry ([`EventListeners`]) used for
//!   component lifecycle callbacks (cache expirations, queue transitions).
//! - **Serializer contract**: the [`Serializer`] trait remote backends use
//!   for payloads, with a JSON default ([`JsonSerializer`]).
//! - **Maintenance timer**: a single-shot, rearmable [`MaintenanceTimer`]
//!   that components arm for their earliest pending deadline.
//!
//! # Examples
//!
//! ```
//! use foundatio_core::clock::{Clock, TestClock};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let clock = Arc::new(TestClock::default());
//!
//! let sleeper = {
//!     let clock = Arc::clone(&clock);
//!     tokio::spawn(async move { clock.sleep(Duration::from_secs(60)).await })
//! };
//! tokio::task::yield_now().await; // let the sleeper block on the clock
//!
//! // Time only moves when the test says so.
//! clock.advance(Duration::from_secs(60));
//! sleeper.await.unwrap();
//! # }
//! ```

pub mod clock;
pub mod events;
pub mod serializer;
pub mod timer;

pub use clock::{Clock, SystemClock, TestClock};
pub use events::{Event, EventListener, EventListeners, FnListener, ListenerId};
pub use serializer::{JsonSerializer, SerializationError, Serializer};
pub use timer::{MaintenanceCallback, MaintenanceTimer};
