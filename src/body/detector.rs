//! Per-slot gesture detector interface.
//!
//! The recognizer itself (matching joint data against a trained gesture
//! database) lives outside this crate.  A detector here only has to honor
//! the lifecycle: `activate` binds it to a body, `pause` stops all work,
//! and `poll` yields at most one observation per frame while active.

use tracing::{debug, warn};

use super::tracking::{TrackingId, NO_BODY};

/// Raw per-frame output of a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureObservation {
    /// Body the observation was produced for.
    pub tracking_id: TrackingId,
    /// Gesture class name (e.g. "SwipeUp_Right").
    pub gesture_name: String,
    /// Cheap boolean classification; may be true at low confidence.
    pub is_detected: bool,
    /// Normalized score, nominally in [0.0, 1.0].
    pub confidence: f32,
}

/// Lifecycle contract every slot detector implements.
pub trait GestureDetector: Send {
    /// Bind to a body and start producing observations.
    fn activate(&mut self, tracking_id: TrackingId);

    /// Stop recognition and drop any in-flight results.
    fn pause(&mut self);

    /// Whether the detector is currently paused.
    fn is_paused(&self) -> bool;

    /// Body the detector is bound to (`NO_BODY` when paused).
    fn bound_id(&self) -> TrackingId;

    /// Next observation for this frame.  Must return `None` while paused.
    fn poll(&mut self) -> Option<GestureObservation>;

    /// Called once per frame after polling.  Output not consumed by now
    /// belongs to a past frame and must be dropped.
    fn end_frame(&mut self) {}
}

// ── Scripted detector ──────────────────────────────────────

/// Detector fed from outside, at most one observation per frame.
///
/// Used by the replay driver and tests in place of a real recognizer.
/// Anything not polled by the end of the frame is discarded.
#[derive(Debug)]
pub struct ScriptedDetector {
    slot_index: usize,
    tracking_id: TrackingId,
    paused: bool,
    pending: Option<GestureObservation>,
}

impl ScriptedDetector {
    pub fn new(slot_index: usize) -> Self {
        Self {
            slot_index,
            tracking_id: NO_BODY,
            paused: true,
            pending: None,
        }
    }

    /// Set the observation for the next poll.  Ignored while paused, and
    /// a second observation in the same frame is rejected.
    pub fn push(&mut self, observation: GestureObservation) -> bool {
        if self.paused {
            debug!(
                slot = self.slot_index,
                gesture = %observation.gesture_name,
                "detector paused, observation discarded"
            );
            return false;
        }
        if let Some(current) = &self.pending {
            warn!(
                slot = self.slot_index,
                pending = %current.gesture_name,
                rejected = %observation.gesture_name,
                "detector already has an observation this frame"
            );
            return false;
        }
        self.pending = Some(observation);
        true
    }

    /// Whether an observation is waiting to be polled.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl GestureDetector for ScriptedDetector {
    fn activate(&mut self, tracking_id: TrackingId) {
        self.tracking_id = tracking_id;
        self.paused = false;
        self.pending = None;
    }

    fn pause(&mut self) {
        self.tracking_id = NO_BODY;
        self.paused = true;
        self.pending = None;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn bound_id(&self) -> TrackingId {
        self.tracking_id
    }

    fn poll(&mut self) -> Option<GestureObservation> {
        if self.paused {
            return None;
        }
        self.pending.take()
    }

    fn end_frame(&mut self) {
        self.pending = None;
    }
}

// ── Tests ──────────────────────────────────────────────────
