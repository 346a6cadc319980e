//! Lifecycle notifications for a single store.
//!
//! Each store owns one [`EventBus`]. Delivery is synchronous and best-effort:
//! - Callback handlers run in registration order, in the emitting call
//! - Channel subscriptions get a clone over a bounded buffer and are dropped
//!   once the buffer is full or the receiver is gone
//! - Late subscribers never see past events
//!
//! # Example
//!
//! ```ignore
//! let unsubscribe = store.on(EventKind::Deleted, |event| {
//!     println!("removed: {:?}", event.payload);
//! });
//!
//! let handle = store.subscribe(EventKind::Error, 64);
//! while let Ok(event) = handle.try_recv() {
//!     println!("error at {:?}", event.timestamp);
//! }
//!
//! unsubscribe.unsubscribe();
//! ```

mod bus;
mod types;

pub use bus::{EventBus, Unsubscribe};
pub use types::{EventKind, EventPayload, StoreEvent, SubscriptionHandle, SubscriptionId};
