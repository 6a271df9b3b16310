//! Discrete gesture result state machine.
//!
//! Folds a detector's raw `(name, detected, confidence)` output into a
//! per-slot result record and decides when a confirmed gesture becomes a
//! `DiscreteEvent`.  One `GestureResult` exists per slot for the lifetime
//! of the tracker.

use tracing::{debug, warn};

use super::tracking::{BodyColor, TrackingId, NO_BODY};
use crate::sexp::{escape_string, format_event};

/// Default confidence a detection must exceed to be confirmed.
pub const DEFAULT_CONFIRMATION_THRESHOLD: f32 = 0.4;

// ── Display state ──────────────────────────────────────────

/// Observer-facing summary of a slot's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayState {
    /// No body bound to the slot.
    Unbound,
    /// Body bound, gesture not detected.
    BoundIdle,
    /// Gesture detected, confidence at or below the threshold.
    BoundConfidenceBelowThreshold,
    /// Gesture detected above the threshold.
    BoundConfirmed,
}

impl DisplayState {
    /// String representation for s-expression output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unbound => "unbound",
            Self::BoundIdle => "idle",
            Self::BoundConfidenceBelowThreshold => "below-threshold",
            Self::BoundConfirmed => "confirmed",
        }
    }
}

// ── Event policy ───────────────────────────────────────────

/// When a confirmed frame turns into a `DiscreteEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventPolicy {
    /// Every confirmed frame fires.
    #[default]
    PerFrame,
    /// Only the first confirmed frame of a detection episode fires.
    RisingEdge,
    /// A confirmed frame fires unless the slot fired within the window.
    Cooldown { ms: u64 },
}

impl EventPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerFrame => "per-frame",
            Self::RisingEdge => "rising-edge",
            Self::Cooldown { .. } => "cooldown",
        }
    }

    /// Parse a policy name.  `cooldown_ms` applies to `"cooldown"` only.
    pub fn parse(name: &str, cooldown_ms: u64) -> Option<Self> {
        match name {
            "per-frame" => Some(Self::PerFrame),
            "rising-edge" => Some(Self::RisingEdge),
            "cooldown" => Some(Self::Cooldown { ms: cooldown_ms }),
            _ => None,
        }
    }

    fn admits(&self, previous: DisplayState, last_event_ns: Option<u64>, now_ns: u64) -> bool {
        match self {
            Self::PerFrame => true,
            Self::RisingEdge => previous != DisplayState::BoundConfirmed,
            Self::Cooldown { ms } => match last_event_ns {
                None => true,
                Some(last) => now_ns.saturating_sub(last) >= ms.saturating_mul(1_000_000),
            },
        }
    }
}

// ── Discrete event ─────────────────────────────────────────

/// A confirmed gesture, handed to the action dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteEvent {
    pub slot_index: usize,
    pub gesture_name: String,
    pub confidence: f32,
    pub timestamp_ns: u64,
}

impl DiscreteEvent {
    /// Event line in the IPC event format.
    pub fn to_sexp(&self) -> String {
        format_event(
            "gesture",
            &[
                ("slot", &self.slot_index.to_string()),
                ("gesture", &format!("\"{}\"", escape_string(&self.gesture_name))),
                ("confidence", &format!("{:.3}", self.confidence)),
                ("timestamp-ns", &self.timestamp_ns.to_string()),
            ],
        )
    }
}

// ── Gesture result ─────────────────────────────────────────

/// Per-slot result record.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureResult {
    /// Slot this result belongs to.
    pub slot_index: usize,
    /// Body currently bound to the slot (`NO_BODY` when unbound).
    pub bound_id: TrackingId,
    /// Whether a body is bound.
    pub is_bound: bool,
    /// Name of the last gesture observed for the bound body.
    pub gesture_name: Option<String>,
    /// Whether the gesture is currently detected.
    pub detected: bool,
    /// Current confidence; 0 unless bound and detected.
    pub confidence: f32,
    /// Derived display state.
    pub state: DisplayState,
    /// Frame time of the last emitted event (cooldown policy).
    last_event_ns: Option<u64>,
}

impl GestureResult {
    pub fn new(slot_index: usize) -> Self {
        Self {
            slot_index,
            bound_id: NO_BODY,
            is_bound: false,
            gesture_name: None,
            detected: false,
            confidence: 0.0,
            state: DisplayState::Unbound,
            last_event_ns: None,
        }
    }

    /// Clear everything back to `Unbound`.
    pub fn unbind(&mut self) {
        *self = Self::new(self.slot_index);
    }

    /// Reset, then bind to a new body in the idle state.
    pub fn bind(&mut self, tracking_id: TrackingId) {
        self.unbind();
        if tracking_id == NO_BODY {
            return;
        }
        self.bound_id = tracking_id;
        self.is_bound = true;
        self.state = DisplayState::BoundIdle;
    }

    /// Color observers should use for this slot.
    pub fn color(&self) -> BodyColor {
        if self.is_bound {
            BodyColor::for_index(self.slot_index)
        } else {
            BodyColor::Gray
        }
    }

    /// Apply one frame of detector output.
    ///
    /// Returns the event to dispatch, if this frame confirmed the gesture
    /// and the policy admits it.
    pub fn apply(
        &mut self,
        gesture_name: &str,
        is_detected: bool,
        raw_confidence: f32,
        threshold: f32,
        policy: EventPolicy,
        now_ns: u64,
    ) -> Option<DiscreteEvent> {
        if !self.is_bound {
            self.unbind();
            return None;
        }

        let previous = self.state;
        self.gesture_name = Some(gesture_name.to_string());

        if !is_detected {
            self.detected = false;
            self.confidence = 0.0;
            self.state = DisplayState::BoundIdle;
            return None;
        }

        self.detected = true;
        self.confidence = clamp_confidence(self.slot_index, raw_confidence);

        if self.confidence <= threshold {
            self.state = DisplayState::BoundConfidenceBelowThreshold;
            return None;
        }

        self.state = DisplayState::BoundConfirmed;
        if !policy.admits(previous, self.last_event_ns, now_ns) {
            debug!(
                slot = self.slot_index,
                gesture = gesture_name,
                policy = policy.as_str(),
                "confirmed frame suppressed"
            );
            return None;
        }

        self.last_event_ns = Some(now_ns);
        Some(DiscreteEvent {
            slot_index: self.slot_index,
            gesture_name: gesture_name.to_string(),
            confidence: self.confidence,
            timestamp_ns: now_ns,
        })
    }

    /// Generate s-expression for IPC status.
    pub fn status_sexp(&self) -> String {
        let gesture = match &self.gesture_name {
            Some(name) => format!("\"{}\"", escape_string(name)),
            None => "nil".to_string(),
        };
        format!(
            "(:slot {} :body {} :bound {} :color :{} :state :{} :gesture {} :detected {} :confidence {:.3})",
            self.slot_index,
            self.bound_id,
            if self.is_bound { "t" } else { "nil" },
            self.color().as_str(),
            self.state.as_str(),
            gesture,
            if self.detected { "t" } else { "nil" },
            self.confidence,
        )
    }
}

/// Clamp a detector confidence into [0, 1], logging contract violations.
fn clamp_confidence(slot_index: usize, raw: f32) -> f32 {
    if raw.is_nan() {
        warn!(slot = slot_index, "detector reported NaN confidence, using 0");
        return 0.0;
    }
    if !(0.0..=1.0).contains(&raw) {
        warn!(slot = slot_index, confidence = raw, "detector confidence out of range, clamping");
        return raw.clamp(0.0, 1.0);
    }
    raw
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
fn bound_result(slot: usize, id: TrackingId) -> GestureResult {
    let mut result = GestureResult::new(slot);
    result.bind(id);
    result
}
