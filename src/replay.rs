//! Frame script reader: stands in for the depth sensor.
//!
//! One frame per line, as an s-expression plist:
//!
//! ```text
//! (:frame 1 :time-ms 33 :bodies (5 0 0 0 0 0)
//!  :observations ((:slot 0 :gesture "SwipeUp_Right" :detected t :confidence 0.6)))
//! ```
//!
//! Blank lines and lines starting with `;` are skipped.  An observation
//! may name the `:body` it was produced for; by default it is tagged with
//! whichever body the slot is bound to when it is fed.

use std::io::BufRead;

use lexpr::Value;
use tracing::warn;

use crate::body::{BodyFrame, GestureDetector, GestureObservation, ScriptedDetector, SlotManager};
use crate::error::{ReplayError, TrackerError};
use crate::sexp::{get_bool, get_float, get_keyword, get_uint, get_value, list_items};

/// Nominal frame interval when a line has no `:time-ms` (30 Hz).
const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

/// One observation line item.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptObservation {
    pub slot: usize,
    pub body: Option<u64>,
    pub gesture: String,
    pub detected: bool,
    pub confidence: f32,
}

/// A parsed frame plus the detector output scripted for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedFrame {
    pub frame: BodyFrame,
    pub observations: Vec<ScriptObservation>,
}

impl ScriptedFrame {
    /// Hand this frame's observations to the slot detectors.
    ///
    /// Observations for paused slots are discarded by the detector, as is
    /// any observation after the first for the same slot.
    pub fn feed(&self, slots: &mut SlotManager<ScriptedDetector>) -> Result<(), TrackerError> {
        for obs in &self.observations {
            let detector = slots.detector_mut(obs.slot)?;
            let tracking_id = obs.body.unwrap_or_else(|| detector.bound_id());
            detector.push(GestureObservation {
                tracking_id,
                gesture_name: obs.gesture.clone(),
                is_detected: obs.detected,
                confidence: obs.confidence,
            });
        }
        Ok(())
    }
}

/// Parse one script line.  Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<ScriptedFrame>, ReplayError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(';') {
        return Ok(None);
    }

    let value = lexpr::from_str(trimmed).map_err(|e| ReplayError::Malformed {
        line: line_no,
        reason: e.to_string(),
    })?;

    let sequence = get_uint(&value, "frame").unwrap_or(line_no as u64);
    let time_ms = get_uint(&value, "time-ms")
        .unwrap_or_else(|| sequence.saturating_mul(DEFAULT_FRAME_INTERVAL_MS));

    let bodies = get_value(&value, "bodies").ok_or(ReplayError::MissingKey {
        line: line_no,
        key: "bodies",
    })?;
    let ids = list_items(bodies)
        .into_iter()
        .map(|v| v.as_u64())
        .collect::<Option<Vec<u64>>>()
        .ok_or(ReplayError::InvalidValue {
            line: line_no,
            key: "bodies",
        })?;

    let observations = match get_value(&value, "observations") {
        Some(list) => list_items(list)
            .into_iter()
            .map(|item| parse_observation(line_no, item))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(Some(ScriptedFrame {
        frame: BodyFrame::from_ids(sequence, time_ms.saturating_mul(1_000_000), &ids),
        observations,
    }))
}

fn parse_observation(line_no: usize, item: &Value) -> Result<ScriptObservation, ReplayError> {
    let slot = get_uint(item, "slot").ok_or(ReplayError::MissingKey {
        line: line_no,
        key: "slot",
    })? as usize;
    let gesture = get_keyword(item, "gesture").ok_or(ReplayError::MissingKey {
        line: line_no,
        key: "gesture",
    })?;
    let detected = get_bool(item, "detected").unwrap_or(false);
    let confidence = match get_value(item, "confidence") {
        Some(_) => get_float(item, "confidence").ok_or(ReplayError::InvalidValue {
            line: line_no,
            key: "confidence",
        })? as f32,
        None => 0.0,
    };

    Ok(ScriptObservation {
        slot,
        body: get_uint(item, "body"),
        gesture,
        detected,
        confidence,
    })
}

/// Iterator over the frames of a script.
pub struct FrameReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Result<ScriptedFrame, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            match parse_line(self.line_no, &line) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(e) => {
                    warn!(line = self.line_no, "bad frame script line: {}", e);
                    return Some(Err(e));
                }
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────
