//! Gesture-name → handler table.
//!
//! The dispatcher owns all side-effect state (counters, labels).  The
//! slot pipeline only produces `DiscreteEvent`s and never sees it.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::body::DiscreteEvent;

/// Side effect bound to a gesture name.
pub trait GestureHandler: Send {
    /// React to one confirmed gesture.
    fn handle(&mut self, event: &DiscreteEvent);

    /// Text an observer would display for this handler, if any.
    fn label(&self) -> Option<String> {
        None
    }
}

// ── Counting handler ───────────────────────────────────────

/// Counts events and renders a "caption: N" label.
#[derive(Debug, Clone)]
pub struct CountingHandler {
    caption: String,
    count: u64,
}

impl CountingHandler {
    pub fn new(caption: &str) -> Self {
        Self {
            caption: caption.to_string(),
            count: 0,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl GestureHandler for CountingHandler {
    fn handle(&mut self, event: &DiscreteEvent) {
        self.count += 1;
        info!(
            gesture = %event.gesture_name,
            slot = event.slot_index,
            count = self.count,
            "{}: {}",
            self.caption,
            self.count
        );
    }

    fn label(&self) -> Option<String> {
        Some(format!("{}: {}", self.caption, self.count))
    }
}

// ── Dispatcher ─────────────────────────────────────────────

/// Default gesture table: name and counter caption.
const DEFAULT_LABELS: &[(&str, &str)] = &[
    ("SwipeUp_Right", "swipe up right count"),
    ("SwipeUp_Left", "swipe up left count"),
    ("SwipeLeft_Right", "swipe left right count"),
    ("SwipeLeft_Left", "swipe left left count"),
    ("SwipeRight_Right", "swipe right right count"),
    ("SwipeRight_Left", "swipe right left count"),
    ("HandsUp_Right", "hands up right count"),
    ("HandsUp_Left", "hands up left count"),
];

/// Gestures that are recognized but deliberately have no action.
const DEFAULT_IGNORED: &[&str] = &["SwipeDown_Right", "SwipeDown_Left"];

/// Routes discrete events to handlers by gesture name.
#[derive(Default)]
pub struct ActionDispatcher {
    handlers: HashMap<String, Box<dyn GestureHandler>>,
    ignored: HashSet<String>,
    observers: Vec<Box<dyn GestureHandler>>,
    fallback: Option<Box<dyn GestureHandler>>,
    handled: u64,
    unhandled: u64,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with a counting handler for each known swipe and
    /// hands-up gesture.
    pub fn with_default_labels() -> Self {
        let mut dispatcher = Self::new();
        for (name, caption) in DEFAULT_LABELS {
            dispatcher.register(name, Box::new(CountingHandler::new(caption)));
        }
        for name in DEFAULT_IGNORED {
            dispatcher.ignore(name);
        }
        dispatcher
    }

    /// Bind a handler to a gesture name, replacing any previous one.
    pub fn register(&mut self, gesture: &str, handler: Box<dyn GestureHandler>) {
        self.ignored.remove(gesture);
        self.handlers.insert(gesture.to_string(), handler);
    }

    /// Remove a handler.  Returns true if one was bound.
    pub fn unregister(&mut self, gesture: &str) -> bool {
        self.handlers.remove(gesture).is_some()
    }

    /// Accept a gesture name without acting on it.
    pub fn ignore(&mut self, gesture: &str) {
        self.handlers.remove(gesture);
        self.ignored.insert(gesture.to_string());
    }

    /// Handler for names with no binding.
    pub fn set_fallback(&mut self, handler: Box<dyn GestureHandler>) {
        self.fallback = Some(handler);
    }

    /// Handler that sees every event, before name routing.
    pub fn add_observer(&mut self, handler: Box<dyn GestureHandler>) {
        self.observers.push(handler);
    }

    /// Route one event.  Returns true if a named or fallback handler ran.
    pub fn dispatch(&mut self, event: &DiscreteEvent) -> bool {
        for observer in &mut self.observers {
            observer.handle(event);
        }

        if let Some(handler) = self.handlers.get_mut(&event.gesture_name) {
            handler.handle(event);
            self.handled += 1;
            return true;
        }

        if self.ignored.contains(&event.gesture_name) {
            debug!(gesture = %event.gesture_name, "gesture has no action");
            self.handled += 1;
            return false;
        }

        self.unhandled += 1;
        match self.fallback.as_mut() {
            Some(fallback) => {
                fallback.handle(event);
                true
            }
            None => {
                debug!(gesture = %event.gesture_name, "no handler for gesture");
                false
            }
        }
    }

    /// Label of the handler bound to a gesture.
    pub fn label(&self, gesture: &str) -> Option<String> {
        self.handlers.get(gesture).and_then(|h| h.label())
    }

    /// All handler labels, sorted by gesture name.
    pub fn labels(&self) -> Vec<(String, String)> {
        let mut labels: Vec<(String, String)> = self
            .handlers
            .iter()
            .filter_map(|(name, h)| h.label().map(|l| (name.clone(), l)))
            .collect();
        labels.sort();
        labels
    }

    /// Events routed to a named handler or explicitly ignored.
    pub fn handled_count(&self) -> u64 {
        self.handled
    }

    /// Events whose gesture name had no binding.
    pub fn unhandled_count(&self) -> u64 {
        self.unhandled
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
fn event(gesture: &str) -> DiscreteEvent {
    DiscreteEvent {
        slot_index: 0,
        gesture_name: gesture.to_string(),
        confidence: 0.8,
        timestamp_ns: 0,
    }
}
