//! Slot manager: binds tracked bodies to a fixed pool of gesture detectors.
//!
//! Slot `i` follows sensor body index `i`.  Whenever the identity reported
//! at that index changes, the slot is explicitly rebound: the detector is
//! paused and the result cleared before any new body can drive it, so no
//! detector state carries over from one body to the next.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::detector::{GestureDetector, ScriptedDetector};
use super::gesture::{DiscreteEvent, EventPolicy, GestureResult};
use super::tracking::{BodyFrame, TrackingId, NO_BODY};
use crate::error::TrackerError;
use crate::sexp::format_event;

// ── Transitions ────────────────────────────────────────────

/// Kind of binding change applied to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    /// Empty slot picked up a body; detector resumed.
    Resumed,
    /// Body left; detector paused and result cleared.
    Paused,
    /// A different body took over; paused, cleared, then resumed.
    Rebound,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resumed => "resumed",
            Self::Paused => "paused",
            Self::Rebound => "rebound",
        }
    }
}

/// One binding change produced by `SlotManager::reconcile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTransition {
    pub slot_index: usize,
    pub from: TrackingId,
    pub to: TrackingId,
    pub kind: TransitionKind,
}

impl SlotTransition {
    fn new(slot_index: usize, from: TrackingId, to: TrackingId) -> Self {
        let kind = match (from == NO_BODY, to == NO_BODY) {
            (true, _) => TransitionKind::Resumed,
            (false, true) => TransitionKind::Paused,
            (false, false) => TransitionKind::Rebound,
        };
        Self {
            slot_index,
            from,
            to,
            kind,
        }
    }

    /// Event line in the IPC event format.
    pub fn to_sexp(&self) -> String {
        format_event(
            &format!("slot-{}", self.kind.as_str()),
            &[
                ("slot", &self.slot_index.to_string()),
                ("from", &self.from.to_string()),
                ("to", &self.to.to_string()),
            ],
        )
    }
}

// ── Slot ───────────────────────────────────────────────────

struct Slot<D> {
    bound_id: TrackingId,
    detector: D,
    result: GestureResult,
}

impl<D: GestureDetector> Slot<D> {
    fn is_active(&self) -> bool {
        self.bound_id != NO_BODY
    }

    /// Apply a binding change.  The order matters: pause and clear the
    /// old body before the new one can resume the detector.
    fn rebind(&mut self, index: usize, new_id: TrackingId) -> SlotTransition {
        let transition = SlotTransition::new(index, self.bound_id, new_id);

        if self.bound_id != NO_BODY {
            self.detector.pause();
            self.result.unbind();
        }

        self.bound_id = new_id;
        if new_id != NO_BODY {
            self.detector.activate(new_id);
            self.result.bind(new_id);
        }

        debug!(
            slot = index,
            from = transition.from,
            to = transition.to,
            kind = transition.kind.as_str(),
            "slot rebound"
        );
        transition
    }
}

// ── Manager ────────────────────────────────────────────────

/// Fixed pool of slots, one per sensor body index.
pub struct SlotManager<D = ScriptedDetector> {
    slots: Vec<Slot<D>>,
}

impl SlotManager<ScriptedDetector> {
    /// Manager backed by externally fed detectors.
    pub fn scripted(slot_count: usize) -> Result<Self, TrackerError> {
        Self::new(slot_count, ScriptedDetector::new)
    }
}

impl<D: GestureDetector> SlotManager<D> {
    /// Create `slot_count` slots, building one detector per slot.
    /// Detectors are paused until a body is bound.
    pub fn new(
        slot_count: usize,
        mut make_detector: impl FnMut(usize) -> D,
    ) -> Result<Self, TrackerError> {
        if slot_count == 0 {
            return Err(TrackerError::NoSlots);
        }
        let slots = (0..slot_count)
            .map(|index| {
                let mut detector = make_detector(index);
                detector.pause();
                Slot {
                    bound_id: NO_BODY,
                    detector,
                    result: GestureResult::new(index),
                }
            })
            .collect();
        Ok(Self { slots })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Fail unless the source reports exactly one body per slot.
    pub fn check_body_count(&self, body_count: usize) -> Result<(), TrackerError> {
        if body_count != self.slots.len() {
            return Err(TrackerError::SnapshotLength {
                expected: self.slots.len(),
                actual: body_count,
            });
        }
        Ok(())
    }

    /// Bring every slot's binding in line with `frame`.
    ///
    /// All slots are reconciled against the same snapshot before any
    /// detector is polled.  Returns the binding changes in slot order;
    /// an unchanged snapshot yields no transitions.
    pub fn reconcile(&mut self, frame: &BodyFrame) -> Result<Vec<SlotTransition>, TrackerError> {
        self.check_body_count(frame.bodies.len())?;

        let mut seen = HashSet::new();
        let mut transitions = Vec::new();

        for (index, (slot, record)) in self.slots.iter_mut().zip(&frame.bodies).enumerate() {
            let mut new_id = record.effective_id();
            if new_id != NO_BODY && !seen.insert(new_id) {
                warn!(
                    slot = index,
                    body = new_id,
                    frame = frame.sequence,
                    "body reported at more than one index, treating as empty"
                );
                new_id = NO_BODY;
            }

            if new_id != slot.bound_id {
                transitions.push(slot.rebind(index, new_id));
            }
        }

        Ok(transitions)
    }

    /// Poll every active detector once and fold its output into the slot
    /// result.  Paused detectors are never polled.  Every detector's
    /// unconsumed output is dropped before returning.
    pub fn collect(
        &mut self,
        timestamp_ns: u64,
        threshold: f32,
        policy: EventPolicy,
    ) -> Vec<DiscreteEvent> {
        let mut events = Vec::new();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let observation = if slot.is_active() {
                slot.detector.poll()
            } else {
                None
            };
            slot.detector.end_frame();
            let Some(observation) = observation else {
                continue;
            };
            if observation.tracking_id != slot.bound_id {
                warn!(
                    slot = index,
                    observed = observation.tracking_id,
                    bound = slot.bound_id,
                    "observation for a body the slot no longer owns, discarded"
                );
                continue;
            }

            if let Some(event) = slot.result.apply(
                &observation.gesture_name,
                observation.is_detected,
                observation.confidence,
                threshold,
                policy,
                timestamp_ns,
            ) {
                debug!(
                    slot = index,
                    gesture = %event.gesture_name,
                    confidence = event.confidence,
                    "gesture confirmed"
                );
                events.push(event);
            }
        }

        events
    }

    /// Result record for a slot.
    pub fn result(&self, index: usize) -> Option<&GestureResult> {
        self.slots.get(index).map(|s| &s.result)
    }

    /// All result records in slot order.
    pub fn results(&self) -> impl Iterator<Item = &GestureResult> {
        self.slots.iter().map(|s| &s.result)
    }

    /// Detector of a slot.
    pub fn detector(&self, index: usize) -> Option<&D> {
        self.slots.get(index).map(|s| &s.detector)
    }

    /// Mutable detector of a slot, for feeding pose data.
    pub fn detector_mut(&mut self, index: usize) -> Result<&mut D, TrackerError> {
        let count = self.slots.len();
        self.slots
            .get_mut(index)
            .map(|s| &mut s.detector)
            .ok_or(TrackerError::NoSuchSlot { index, count })
    }

    /// Whether a slot currently has a body bound.
    pub fn is_active(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|s| s.is_active())
    }

    /// Body bound to a slot (`NO_BODY` if none).
    pub fn bound_id(&self, index: usize) -> TrackingId {
        self.slots.get(index).map_or(NO_BODY, |s| s.bound_id)
    }

    /// Number of slots with a body bound.
    pub fn bound_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_active()).count()
    }

    /// Generate s-expression listing every slot result.
    pub fn status_sexp(&self) -> String {
        let mut s = format!(
            "(:slots {} :bound {} :results (",
            self.slots.len(),
            self.bound_count()
        );
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                s.push(' ');
            }
            s.push_str(&slot.result.status_sexp());
        }
        s.push_str("))");
        s
    }
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
use super::detector::GestureObservation;

#[cfg(test)]
fn frame(sequence: u64, ids: &[TrackingId]) -> BodyFrame {
    BodyFrame::from_ids(sequence, sequence * 33_000_000, ids)
}

#[cfg(test)]
fn feed(
    slots: &mut SlotManager,
    slot: usize,
    gesture: &str,
    is_detected: bool,
    confidence: f32,
) {
    let det = slots.detector_mut(slot).unwrap();
    let tracking_id = det.bound_id();
    det.push(GestureObservation {
        tracking_id,
        gesture_name: gesture.to_string(),
        is_detected,
        confidence,
    });
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::gesture::{DisplayState, DEFAULT_CONFIRMATION_THRESHOLD};

    const T: f32 = DEFAULT_CONFIRMATION_THRESHOLD;

    #[test]
    fn test_new_manager_all_paused() {
        let slots = SlotManager::scripted(6).unwrap();
        assert_eq!(slots.slot_count(), 6);
        assert_eq!(slots.bound_count(), 0);
        for i in 0..6 {
            assert!(slots.detector(i).unwrap().is_paused());
            assert_eq!(slots.result(i).unwrap().state, DisplayState::Unbound);
        }
    }

    #[test]
    fn test_zero_slots_rejected() {
        assert!(matches!(SlotManager::scripted(0), Err(TrackerError::NoSlots)));
    }

    #[test]
    fn test_snapshot_length_mismatch() {
        let mut slots = SlotManager::scripted(6).unwrap();
        let err = slots.reconcile(&frame(1, &[5, 0, 0])).unwrap_err();
        assert_eq!(
            err,
            TrackerError::SnapshotLength {
                expected: 6,
                actual: 3
            }
        );
        assert!(slots.check_body_count(6).is_ok());
    }

    #[test]
    fn test_body_appears() {
        let mut slots = SlotManager::scripted(6).unwrap();
        let transitions = slots.reconcile(&frame(1, &[5, 0, 0, 0, 0, 0])).unwrap();
        assert_eq!(
            transitions,
            vec![SlotTransition {
                slot_index: 0,
                from: NO_BODY,
                to: 5,
                kind: TransitionKind::Resumed,
            }]
        );
        assert!(slots.is_active(0));
        assert!(!slots.detector(0).unwrap().is_paused());
        assert_eq!(slots.detector(0).unwrap().bound_id(), 5);
        assert_eq!(slots.result(0).unwrap().state, DisplayState::BoundIdle);
    }

    #[test]
    fn test_swipe_up_confirmed() {
        let mut slots = SlotManager::scripted(6).unwrap();
        slots.reconcile(&frame(1, &[5, 0, 0, 0, 0, 0])).unwrap();
        feed(&mut slots, 0, "SwipeUp", true, 0.6);
        let events = slots.collect(100, T, EventPolicy::PerFrame);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].slot_index, 0);
        assert_eq!(events[0].gesture_name, "SwipeUp");
        assert_eq!(events[0].confidence, 0.6);

        let result = slots.result(0).unwrap();
        assert!(result.detected);
        assert_eq!(result.confidence, 0.6);
        assert_eq!(result.state, DisplayState::BoundConfirmed);

        // Next frame drops below threshold.
        slots.reconcile(&frame(2, &[5, 0, 0, 0, 0, 0])).unwrap();
        feed(&mut slots, 0, "SwipeUp", true, 0.2);
        let events = slots.collect(200, T, EventPolicy::PerFrame);
        assert!(events.is_empty());
        assert_eq!(
            slots.result(0).unwrap().state,
            DisplayState::BoundConfidenceBelowThreshold
        );
    }

    #[test]
    fn test_identity_change_rebinds() {
        let mut slots = SlotManager::scripted(6).unwrap();
        slots.reconcile(&frame(1, &[5, 0, 0, 0, 0, 0])).unwrap();
        feed(&mut slots, 0, "SwipeUp", true, 0.9);
        slots.collect(100, T, EventPolicy::PerFrame);
        assert_eq!(slots.result(0).unwrap().state, DisplayState::BoundConfirmed);

        let transitions = slots.reconcile(&frame(2, &[7, 0, 0, 0, 0, 0])).unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].kind, TransitionKind::Rebound);
        assert_eq!(transitions[0].from, 5);
        assert_eq!(transitions[0].to, 7);

        // Reset before any observation from body 7 is processed.
        let result = slots.result(0).unwrap();
        assert_eq!(result.bound_id, 7);
        assert_eq!(result.state, DisplayState::BoundIdle);
        assert!(!result.detected);
        assert_eq!(result.confidence, 0.0);
        assert!(result.gesture_name.is_none());
    }

    #[test]
    fn test_stale_observation_discarded() {
        let mut slots = SlotManager::scripted(6).unwrap();
        slots.reconcile(&frame(1, &[7, 0, 0, 0, 0, 0])).unwrap();
        slots
            .detector_mut(0)
            .unwrap()
            .push(GestureObservation {
                tracking_id: 5,
                gesture_name: "SwipeUp".to_string(),
                is_detected: true,
                confidence: 0.9,
            });
        let events = slots.collect(100, T, EventPolicy::PerFrame);
        assert!(events.is_empty());
        assert_eq!(slots.result(0).unwrap().state, DisplayState::BoundIdle);
    }

    #[test]
    fn test_body_leaves_pauses_and_clears() {
        let mut slots = SlotManager::scripted(6).unwrap();
        slots.reconcile(&frame(1, &[5, 0, 0, 0, 0, 0])).unwrap();
        feed(&mut slots, 0, "SwipeUp", true, 0.9);
        slots.collect(100, T, EventPolicy::PerFrame);

        let transitions = slots.reconcile(&frame(2, &[0, 0, 0, 0, 0, 0])).unwrap();
        assert_eq!(transitions[0].kind, TransitionKind::Paused);
        assert!(slots.detector(0).unwrap().is_paused());

        let result = slots.result(0).unwrap();
        assert_eq!(result.state, DisplayState::Unbound);
        assert!(!result.is_bound);
        assert!(!result.detected);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_empty_snapshot() {
        let mut slots = SlotManager::scripted(6).unwrap();
        let transitions = slots.reconcile(&frame(1, &[0; 6])).unwrap();
        assert!(transitions.is_empty());
        let events = slots.collect(100, T, EventPolicy::PerFrame);
        assert!(events.is_empty());
        for i in 0..6 {
            assert!(slots.detector(i).unwrap().is_paused());
            assert_eq!(slots.result(i).unwrap().state, DisplayState::Unbound);
        }
    }

    #[test]
    fn test_repeated_snapshot_idempotent() {
        let mut slots = SlotManager::scripted(6).unwrap();
        let ids = [5, 0, 9, 0, 11, 0];
        assert_eq!(slots.reconcile(&frame(1, &ids)).unwrap().len(), 3);
        feed(&mut slots, 2, "HandsUp_Right", true, 0.3);
        slots.collect(100, T, EventPolicy::PerFrame);

        for seq in 2..10 {
            assert!(slots.reconcile(&frame(seq, &ids)).unwrap().is_empty());
        }
        // Result survived: no rebind reset happened.
        assert_eq!(
            slots.result(2).unwrap().state,
            DisplayState::BoundConfidenceBelowThreshold
        );
    }

    #[test]
    fn test_bound_count_matches_snapshot() {
        let mut slots = SlotManager::scripted(6).unwrap();
        let frames: [[TrackingId; 6]; 4] = [
            [5, 0, 0, 0, 0, 0],
            [5, 6, 0, 8, 0, 0],
            [0, 6, 7, 8, 9, 10],
            [0, 0, 0, 0, 0, 0],
        ];
        for (seq, ids) in frames.iter().enumerate() {
            let f = frame(seq as u64, ids);
            slots.reconcile(&f).unwrap();
            assert_eq!(slots.bound_count(), f.tracked_count());

            let mut bound = HashSet::new();
            for i in 0..6 {
                let id = slots.bound_id(i);
                if id != NO_BODY {
                    assert!(bound.insert(id), "body {} bound twice", id);
                }
            }
        }
    }

    #[test]
    fn test_duplicate_id_bound_once() {
        let mut slots = SlotManager::scripted(6).unwrap();
        slots.reconcile(&frame(1, &[5, 5, 0, 0, 0, 0])).unwrap();
        assert_eq!(slots.bound_id(0), 5);
        assert_eq!(slots.bound_id(1), NO_BODY);
        assert_eq!(slots.bound_count(), 1);
    }

    #[test]
    fn test_invalid_tracking_treated_as_empty() {
        let mut slots = SlotManager::scripted(2).unwrap();
        let mut f = frame(1, &[5, 6]);
        f.bodies[1].tracking_valid = false;
        slots.reconcile(&f).unwrap();
        assert!(slots.is_active(0));
        assert!(!slots.is_active(1));
    }

    #[test]
    fn test_paused_detector_never_polled() {
        let mut slots = SlotManager::scripted(6).unwrap();
        slots.reconcile(&frame(1, &[5, 0, 0, 0, 0, 0])).unwrap();
        feed(&mut slots, 0, "SwipeUp", true, 0.9);
        // Body leaves before the observation is collected.
        slots.reconcile(&frame(2, &[0; 6])).unwrap();
        assert!(slots.collect(100, T, EventPolicy::PerFrame).is_empty());
    }

    #[test]
    fn test_extra_observation_does_not_leak_into_later_frames() {
        let mut slots = SlotManager::scripted(2).unwrap();
        let mut fired = Vec::new();
        for seq in 1..=4 {
            slots.reconcile(&frame(seq, &[5, 0])).unwrap();
            if seq <= 2 {
                feed(&mut slots, 0, "SwipeUp_Right", seq == 1, 0.9);
                feed(&mut slots, 0, "HandsUp_Left", true, 0.9);
            }
            let events = slots.collect(seq * 33_000_000, T, EventPolicy::PerFrame);
            assert!(!slots.detector(0).unwrap().has_pending());
            fired.push(events.len());
        }
        assert_eq!(fired, vec![1, 0, 0, 0]);
        let result = slots.result(0).unwrap();
        assert_eq!(result.gesture_name.as_deref(), Some("SwipeUp_Right"));
        assert_eq!(result.state, DisplayState::BoundIdle);
    }

    #[test]
    fn test_transition_sexp() {
        let t = SlotTransition::new(3, 5, 7);
        assert_eq!(
            t.to_sexp(),
            "(:type :event :event :slot-rebound :slot 3 :from 5 :to 7)"
        );
    }

    #[test]
    fn test_status_sexp() {
        let mut slots = SlotManager::scripted(2).unwrap();
        slots.reconcile(&frame(1, &[5, 0])).unwrap();
        let sexp = slots.status_sexp();
        assert!(sexp.starts_with("(:slots 2 :bound 1 :results ("));
        assert!(sexp.contains(":slot 0 :body 5 :bound t"));
        assert!(sexp.contains(":slot 1 :body 0 :bound nil"));
    }

    #[test]
    fn test_detector_mut_out_of_range() {
        let mut slots = SlotManager::scripted(2).unwrap();
        assert!(matches!(
            slots.detector_mut(4),
            Err(TrackerError::NoSuchSlot { index: 4, count: 2 })
        ));
    }
}
