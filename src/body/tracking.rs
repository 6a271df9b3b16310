//! Body snapshot data model.
//!
//! A depth sensor reports a fixed number of body records per frame.  Each
//! record carries a tracking id assigned (and recycled) by the sensor;
//! id `0` marks an empty record.

/// Opaque identity assigned by the sensor to one tracked body.
pub type TrackingId = u64;

/// Tracking id meaning "no body at this index".
pub const NO_BODY: TrackingId = 0;

/// Default number of bodies a sensor reports per frame.
pub const DEFAULT_BODY_COUNT: usize = 6;

// ── Body record ────────────────────────────────────────────

/// One entry of a body frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyRecord {
    /// Id assigned by the sensor (0 = empty).
    pub tracking_id: TrackingId,
    /// Whether the sensor currently tracks this body.
    pub tracking_valid: bool,
}

impl BodyRecord {
    /// A tracked body with the given id.  Id 0 yields an empty record.
    pub fn tracked(tracking_id: TrackingId) -> Self {
        Self {
            tracking_id,
            tracking_valid: tracking_id != NO_BODY,
        }
    }

    /// An empty record.
    pub fn empty() -> Self {
        Self {
            tracking_id: NO_BODY,
            tracking_valid: false,
        }
    }

    /// Identity used for slot binding: the tracking id when valid, else `NO_BODY`.
    pub fn effective_id(&self) -> TrackingId {
        if self.tracking_valid {
            self.tracking_id
        } else {
            NO_BODY
        }
    }
}

impl Default for BodyRecord {
    fn default() -> Self {
        Self::empty()
    }
}

// ── Body frame ─────────────────────────────────────────────

/// A complete snapshot from the sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyFrame {
    /// Monotonic frame number from the source.
    pub sequence: u64,
    /// Capture time in nanoseconds.
    pub timestamp_ns: u64,
    /// One record per sensor body index.
    pub bodies: Vec<BodyRecord>,
}

impl BodyFrame {
    /// Build a frame from raw ids, one per body index.
    pub fn from_ids(sequence: u64, timestamp_ns: u64, ids: &[TrackingId]) -> Self {
        Self {
            sequence,
            timestamp_ns,
            bodies: ids.iter().map(|&id| BodyRecord::tracked(id)).collect(),
        }
    }

    /// Number of records with a valid identity.
    pub fn tracked_count(&self) -> usize {
        self.bodies
            .iter()
            .filter(|b| b.effective_id() != NO_BODY)
            .count()
    }
}

// ── Body colors ────────────────────────────────────────────

/// Display color for a body index, used by observers of slot results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyColor {
    Red,
    Orange,
    Green,
    Blue,
    Indigo,
    Violet,
    Gray,
}

impl BodyColor {
    const TRACKED: [BodyColor; 6] = [
        Self::Red,
        Self::Orange,
        Self::Green,
        Self::Blue,
        Self::Indigo,
        Self::Violet,
    ];

    /// Color of a tracked body at `index`.  Wraps past the palette.
    pub fn for_index(index: usize) -> Self {
        Self::TRACKED[index % Self::TRACKED.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Indigo => "indigo",
            Self::Violet => "violet",
            Self::Gray => "gray",
        }
    }
}

// ── Tests ──────────────────────────────────────────────────
