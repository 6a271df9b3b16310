//! Action dispatcher: turns discrete gesture events into side effects.
//!
//! Provides:
//! - `handlers`: gesture-name → handler table and a counting handler
//! - `channel`: bounded non-blocking queue feeding a dispatcher thread

pub mod channel;
pub mod handlers;

pub use channel::{spawn_dispatcher, DispatcherThread, EventSink, DEFAULT_QUEUE_CAPACITY};
pub use handlers::{ActionDispatcher, CountingHandler, GestureHandler};
