//! Tracker state: the central struct tying the slot pool to the event sink.
//!
//! A single `Tracker` owns the slot manager and processes frames in
//! arrival order: reconcile all slots, let detectors produce this frame's
//! observations, fold them into results, and post confirmed gestures to
//! the dispatcher queue.

use tracing::{debug, info};

use crate::body::{
    BodyFrame, DiscreteEvent, EventPolicy, GestureDetector, GestureResult, ScriptedDetector,
    SlotManager, SlotTransition, DEFAULT_BODY_COUNT, DEFAULT_CONFIRMATION_THRESHOLD,
};
use crate::dispatch::{EventSink, DEFAULT_QUEUE_CAPACITY};
use crate::error::TrackerError;

// ── Config ─────────────────────────────────────────────────

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Number of slots; must match the sensor's body count.
    pub slot_count: usize,
    /// Confidence a detection must exceed to be confirmed.
    pub confirmation_threshold: f32,
    /// How confirmed frames become events.
    pub event_policy: EventPolicy,
    /// Bound of the dispatcher queue.
    pub queue_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_BODY_COUNT,
            confirmation_threshold: DEFAULT_CONFIRMATION_THRESHOLD,
            event_policy: EventPolicy::PerFrame,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl TrackerConfig {
    /// Reject configurations the tracker cannot run with.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.slot_count == 0 {
            return Err(TrackerError::NoSlots);
        }
        if !(0.0..=1.0).contains(&self.confirmation_threshold) {
            return Err(TrackerError::InvalidThreshold(self.confirmation_threshold));
        }
        if self.queue_capacity == 0 {
            return Err(TrackerError::ZeroQueueCapacity);
        }
        Ok(())
    }

    /// Generate s-expression for IPC config.
    pub fn config_sexp(&self) -> String {
        let cooldown = match self.event_policy {
            EventPolicy::Cooldown { ms } => format!(" :cooldown-ms {}", ms),
            _ => String::new(),
        };
        format!(
            "(:slots {} :threshold {:.2} :policy :{}{} :queue-capacity {})",
            self.slot_count,
            self.confirmation_threshold,
            self.event_policy.as_str(),
            cooldown,
            self.queue_capacity,
        )
    }
}

// ── Frame report ───────────────────────────────────────────

/// What one frame changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub sequence: u64,
    pub transitions: Vec<SlotTransition>,
    pub events: Vec<DiscreteEvent>,
}

/// Running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub frames: u64,
    pub transitions: u64,
    pub events: u64,
}

// ── Tracker ────────────────────────────────────────────────

/// Central tracker state.
pub struct Tracker<D = ScriptedDetector> {
    config: TrackerConfig,
    slots: SlotManager<D>,
    sink: Option<EventSink>,
    stats: TrackerStats,
}

impl Tracker<ScriptedDetector> {
    /// Tracker with externally fed detectors.
    pub fn scripted(config: TrackerConfig, source_body_count: usize) -> Result<Self, TrackerError> {
        Self::new(config, source_body_count, ScriptedDetector::new)
    }
}

impl<D: GestureDetector> Tracker<D> {
    /// Create a tracker for a source reporting `source_body_count` bodies.
    ///
    /// Fails if the configuration is invalid or the body count does not
    /// match the configured slot count.
    pub fn new(
        config: TrackerConfig,
        source_body_count: usize,
        make_detector: impl FnMut(usize) -> D,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        let slots = SlotManager::new(config.slot_count, make_detector)?;
        slots.check_body_count(source_body_count)?;

        info!(
            slots = config.slot_count,
            threshold = config.confirmation_threshold,
            policy = config.event_policy.as_str(),
            "tracker initialized"
        );

        Ok(Self {
            config,
            slots,
            sink: None,
            stats: TrackerStats::default(),
        })
    }

    /// Post confirmed gestures to `sink` from now on.
    pub fn attach_sink(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    /// Stop posting events; returns the sink so the caller can drop it.
    pub fn detach_sink(&mut self) -> Option<EventSink> {
        self.sink.take()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    pub fn slots(&self) -> &SlotManager<D> {
        &self.slots
    }

    pub fn result(&self, index: usize) -> Option<&GestureResult> {
        self.slots.result(index)
    }

    /// Process one frame.
    pub fn process_frame(&mut self, frame: &BodyFrame) -> Result<FrameReport, TrackerError> {
        self.process_frame_with(frame, |_| Ok(()))
    }

    /// Process one frame, letting `feed` hand pose data to detectors after
    /// the slots are reconciled and before they are polled.
    pub fn process_frame_with<F>(
        &mut self,
        frame: &BodyFrame,
        feed: F,
    ) -> Result<FrameReport, TrackerError>
    where
        F: FnOnce(&mut SlotManager<D>) -> Result<(), TrackerError>,
    {
        let transitions = self.slots.reconcile(frame)?;
        feed(&mut self.slots)?;
        let events = self.slots.collect(
            frame.timestamp_ns,
            self.config.confirmation_threshold,
            self.config.event_policy,
        );

        if let Some(sink) = &self.sink {
            for event in &events {
                sink.post(event.clone());
            }
        }

        self.stats.frames += 1;
        self.stats.transitions += transitions.len() as u64;
        self.stats.events += events.len() as u64;

        if !transitions.is_empty() || !events.is_empty() {
            debug!(
                frame = frame.sequence,
                transitions = transitions.len(),
                events = events.len(),
                bound = self.slots.bound_count(),
                "frame processed"
            );
        }

        Ok(FrameReport {
            sequence: frame.sequence,
            transitions,
            events,
        })
    }

    /// Generate s-expression for IPC status.
    pub fn status_sexp(&self) -> String {
        let dropped = self.sink.as_ref().map_or(0, |s| s.dropped());
        format!(
            "(:frames {} :transitions {} :events {} :dropped {} :state {})",
            self.stats.frames,
            self.stats.transitions,
            self.stats.events,
            dropped,
            self.slots.status_sexp(),
        )
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{DisplayState, GestureObservation, TransitionKind};
    use crate::dispatch::{spawn_dispatcher, ActionDispatcher};

    fn swipe(slots: &mut SlotManager, slot: usize, confidence: f32) -> Result<(), TrackerError> {
        let det = slots.detector_mut(slot)?;
        let tracking_id = det.bound_id();
        det.push(GestureObservation {
            tracking_id,
            gesture_name: "SwipeUp_Right".to_string(),
            is_detected: true,
            confidence,
        });
        Ok(())
    }

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.slot_count, 6);
        assert_eq!(config.confirmation_threshold, 0.4);
        assert_eq!(config.event_policy, EventPolicy::PerFrame);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = TrackerConfig::default();
        config.confirmation_threshold = 1.5;
        assert_eq!(config.validate(), Err(TrackerError::InvalidThreshold(1.5)));

        let mut config = TrackerConfig::default();
        config.queue_capacity = 0;
        assert_eq!(config.validate(), Err(TrackerError::ZeroQueueCapacity));
    }

    #[test]
    fn test_body_count_mismatch_fails_at_startup() {
        let err = Tracker::scripted(TrackerConfig::default(), 4).err();
        assert_eq!(
            err,
            Some(TrackerError::SnapshotLength {
                expected: 6,
                actual: 4
            })
        );
    }

    #[test]
    fn test_config_sexp() {
        let mut config = TrackerConfig::default();
        assert_eq!(
            config.config_sexp(),
            "(:slots 6 :threshold 0.40 :policy :per-frame :queue-capacity 64)"
        );
        config.event_policy = EventPolicy::Cooldown { ms: 500 };
        assert!(config.config_sexp().contains(":policy :cooldown :cooldown-ms 500"));
    }

    #[test]
    fn test_process_frame_reports() {
        let mut tracker = Tracker::scripted(TrackerConfig::default(), 6).unwrap();
        let frame = BodyFrame::from_ids(1, 33, &[5, 0, 0, 0, 0, 0]);
        let report = tracker
            .process_frame_with(&frame, |slots| swipe(slots, 0, 0.6))
            .unwrap();

        assert_eq!(report.sequence, 1);
        assert_eq!(report.transitions.len(), 1);
        assert_eq!(report.transitions[0].kind, TransitionKind::Resumed);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].timestamp_ns, 33);
        assert_eq!(
            tracker.result(0).unwrap().state,
            DisplayState::BoundConfirmed
        );
        assert_eq!(
            tracker.stats(),
            TrackerStats {
                frames: 1,
                transitions: 1,
                events: 1
            }
        );
    }

    #[test]
    fn test_feed_error_propagates() {
        let mut tracker = Tracker::scripted(TrackerConfig::default(), 6).unwrap();
        let frame = BodyFrame::from_ids(1, 33, &[5, 0, 0, 0, 0, 0]);
        let err = tracker
            .process_frame_with(&frame, |slots| swipe(slots, 9, 0.6))
            .unwrap_err();
        assert_eq!(err, TrackerError::NoSuchSlot { index: 9, count: 6 });
    }

    #[test]
    fn test_events_posted_to_dispatcher() {
        let mut tracker = Tracker::scripted(TrackerConfig::default(), 6).unwrap();
        let (sink, thread) = spawn_dispatcher(ActionDispatcher::with_default_labels(), 8).unwrap();
        tracker.attach_sink(sink);

        for seq in 0..3 {
            let frame = BodyFrame::from_ids(seq, seq * 33, &[5, 0, 0, 0, 0, 0]);
            tracker
                .process_frame_with(&frame, |slots| swipe(slots, 0, 0.9))
                .unwrap();
        }
        assert!(tracker.status_sexp().contains(":events 3 :dropped 0"));

        drop(tracker.detach_sink());
        let dispatcher = thread.join().unwrap();
        assert_eq!(
            dispatcher.label("SwipeUp_Right").as_deref(),
            Some("swipe up right count: 3")
        );
    }
}
