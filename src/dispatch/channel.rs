//! Non-blocking event queue between the slot pipeline and the dispatcher.
//!
//! The dispatcher runs its own calloop event loop on a dedicated thread.
//! The pipeline side only ever calls `try_send`: a full or closed queue
//! drops the event and bumps a counter, so frame processing never waits
//! on downstream handlers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::TrySendError;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use calloop::channel::{self, Channel, SyncSender};
use calloop::EventLoop;
use tracing::{debug, info, warn};

use super::handlers::ActionDispatcher;
use crate::body::DiscreteEvent;
use crate::error::DispatchError;

/// Default bound of the event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Producer half handed to the pipeline.
#[derive(Clone)]
pub struct EventSink {
    sender: SyncSender<DiscreteEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    /// Queue an event without blocking.  Returns false if it was dropped.
    pub fn post(&self, event: DiscreteEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    slot = event.slot_index,
                    gesture = %event.gesture_name,
                    dropped,
                    "dispatcher queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Disconnected(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    slot = event.slot_index,
                    gesture = %event.gesture_name,
                    dropped,
                    "dispatcher gone, dropping event"
                );
                false
            }
        }
    }

    /// Events dropped so far across all clones of this sink.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Handle to the dispatcher thread.
pub struct DispatcherThread {
    handle: JoinHandle<Result<ActionDispatcher, DispatchError>>,
}

impl DispatcherThread {
    /// Wait for the thread to drain its queue and exit.
    ///
    /// The thread exits once every `EventSink` clone has been dropped.
    pub fn join(self) -> Result<ActionDispatcher, DispatchError> {
        self.handle
            .join()
            .map_err(|_| DispatchError::ThreadPanicked)?
    }
}

/// Start the dispatcher on its own thread behind a queue of `capacity`.
pub fn spawn_dispatcher(
    dispatcher: ActionDispatcher,
    capacity: usize,
) -> Result<(EventSink, DispatcherThread), DispatchError> {
    let (sender, receiver) = channel::sync_channel(capacity.max(1));
    let handle = thread::Builder::new()
        .name("gesture-dispatch".to_string())
        .spawn(move || run_dispatcher(dispatcher, receiver))?;

    info!(capacity, "dispatcher thread started");

    let sink = EventSink {
        sender,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    Ok((sink, DispatcherThread { handle }))
}

/// Dispatcher event loop.  Runs until the channel closes.
fn run_dispatcher(
    dispatcher: ActionDispatcher,
    receiver: Channel<DiscreteEvent>,
) -> Result<ActionDispatcher, DispatchError> {
    let mut event_loop: EventLoop<'static, ActionDispatcher> = EventLoop::try_new()?;
    let signal = event_loop.get_signal();

    event_loop
        .handle()
        .insert_source(receiver, move |event, _, dispatcher| match event {
            channel::Event::Msg(event) => {
                dispatcher.dispatch(&event);
            }
            channel::Event::Closed => {
                debug!("event channel closed");
                signal.stop();
            }
        })
        .map_err(|e| e.error)?;

    let mut dispatcher = dispatcher;
    event_loop.run(None, &mut dispatcher, |_| {})?;

    info!(
        handled = dispatcher.handled_count(),
        unhandled = dispatcher.unhandled_count(),
        "dispatcher thread stopped"
    );
    Ok(dispatcher)
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn event(gesture: &str) -> DiscreteEvent {
        DiscreteEvent {
            slot_index: 1,
            gesture_name: gesture.to_string(),
            confidence: 0.7,
            timestamp_ns: 0,
        }
    }

    #[test]
    fn test_events_reach_handlers() {
        let (sink, thread) = spawn_dispatcher(ActionDispatcher::with_default_labels(), 16).unwrap();
        assert!(sink.post(event("SwipeUp_Right")));
        assert!(sink.post(event("SwipeUp_Right")));
        assert!(sink.post(event("HandsUp_Right")));
        drop(sink);

        let dispatcher = thread.join().unwrap();
        assert_eq!(
            dispatcher.label("SwipeUp_Right").as_deref(),
            Some("swipe up right count: 2")
        );
        assert_eq!(
            dispatcher.label("HandsUp_Right").as_deref(),
            Some("hands up right count: 1")
        );
    }

    #[test]
    fn test_dispatcher_exits_when_sinks_dropped() {
        let (sink, thread) = spawn_dispatcher(ActionDispatcher::new(), 4).unwrap();
        let clone = sink.clone();
        drop(sink);
        assert!(clone.post(event("Wave")));
        drop(clone);

        let dispatcher = thread.join().unwrap();
        assert_eq!(dispatcher.unhandled_count(), 1);
    }

    #[test]
    fn test_post_to_closed_queue_drops() {
        let (sender, receiver) = channel::sync_channel::<DiscreteEvent>(1);
        drop(receiver);
        let sink = EventSink {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        assert!(!sink.post(event("SwipeUp_Left")));
        assert_eq!(sink.dropped(), 1);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        // No event loop drains this channel, so the second post overflows.
        let (sender, _receiver) = channel::sync_channel::<DiscreteEvent>(1);
        let sink = EventSink {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        assert!(sink.post(event("SwipeUp_Left")));
        assert!(!sink.post(event("SwipeUp_Left")));
        assert!(!sink.post(event("SwipeUp_Left")));
        assert_eq!(sink.dropped(), 2);
    }
}
