//! Push notifications for client cache invalidation.
//!
//! Every connected client receives every event; payloads carry enough
//! context (user, date range, year, id) for the client to decide what to
//! refetch.

pub mod events;
pub mod hub;
pub mod session;

pub use events::Event;
pub use hub::EventHub;
