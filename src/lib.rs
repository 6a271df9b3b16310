//! Body gesture slots: per-body gesture detector pool for depth-sensor tracking.
//!
//! Bodies reported by the sensor are bound to a fixed set of slots, each
//! owning one gesture detector.  Detector output is folded into per-slot
//! results, and confirmed gestures are posted to an action dispatcher
//! running on its own thread.

pub mod body;
pub mod dispatch;
pub mod error;
pub mod replay;
pub mod sexp;
pub mod state;

pub use error::{DispatchError, ReplayError, TrackerError};
pub use state::{FrameReport, Tracker, TrackerConfig, TrackerStats};
