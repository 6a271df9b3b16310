//! Body tracking core: slot binding, detector lifecycle, and gesture results.
//!
//! Provides:
//! - `tracking`: body frame data model
//! - `detector`: per-slot detector lifecycle trait and a scripted detector
//! - `gesture`: per-slot result state machine and discrete events
//! - `slot`: slot manager reconciling frames against the detector pool

pub mod detector;
pub mod gesture;
pub mod slot;
pub mod tracking;

pub use detector::{GestureDetector, GestureObservation, ScriptedDetector};
pub use gesture::{
    DiscreteEvent, DisplayState, EventPolicy, GestureResult, DEFAULT_CONFIRMATION_THRESHOLD,
};
pub use slot::{SlotManager, SlotTransition, TransitionKind};
pub use tracking::{BodyColor, BodyFrame, BodyRecord, TrackingId, DEFAULT_BODY_COUNT, NO_BODY};
