//! Per-frame loop: bootstrap detection, then sampled tracking and output.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::detector::{Detector, select_target};
use crate::error::TrackError;
use crate::preprocess::BBox;
use crate::sampler::FrameSampler;
use crate::sink::{KeyAction, LogEntry, RenderSink};
use crate::source::{Frame, FrameSource};
use crate::state::{TrackState, TrackStateMachine};
use crate::tracker::Tracker;

/// Cancel flag shared with whoever may stop the run.
///
/// Checked once per processed frame, never in the middle of detection or
/// tracking.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    EndOfStream,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Box the tracker was first seeded with.
    pub target: BBox,
    /// Frames pulled after the bootstrap frame.
    pub frames_read: u64,
    pub processed: u64,
    pub active: u64,
    pub lost: u64,
    pub redetections: u64,
    pub outcome: RunOutcome,
}

/// Owns every collaborator of a run and drives the frame loop.
///
/// All resources are moved in and dropped when `run` returns, whichever way
/// it returns.
pub struct Pipeline<S: FrameSource, D, T> {
    config: RunConfig,
    source: S,
    detector: D,
    tracker: T,
    sink: RenderSink<S::Image>,
    cancel: CancelFlag,
}

impl<S, D, T> Pipeline<S, D, T>
where
    S: FrameSource,
    D: Detector<S::Image>,
    T: Tracker<S::Image>,
{
    pub fn new(
        config: RunConfig,
        source: S,
        detector: D,
        tracker: T,
        sink: RenderSink<S::Image>,
    ) -> Result<Self, TrackError> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            detector,
            tracker,
            sink,
            cancel: CancelFlag::default(),
        })
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn run(mut self) -> Result<RunSummary, TrackError> {
        let target = self.acquire_target()?;

        let mut sampler = FrameSampler::new(self.config.skip_rate);
        let mut machine = TrackStateMachine::new(target);
        let mut redetections = 0u64;

        let outcome = loop {
            let Some(mut frame) = self.source.next_frame()? else {
                break RunOutcome::EndOfStream;
            };
            if !sampler.admit() {
                continue;
            }

            let state = self.track(&frame, &mut machine, &mut redetections);
            debug!(frame = frame.index, %state, "frame processed");

            let entry = LogEntry::now(state);
            let action = self.sink.consume(&mut frame.image, &entry)?;

            if action == KeyAction::Quit || self.cancel.is_cancelled() {
                info!(frame = frame.index, "cancelled by user");
                break RunOutcome::Cancelled;
            }
        };

        self.sink.finish()?;

        let summary = RunSummary {
            target,
            frames_read: sampler.counter(),
            processed: self.sink.frames_written(),
            active: machine.active_frames(),
            lost: machine.lost_frames(),
            redetections,
            outcome,
        };
        info!(
            frames_read = summary.frames_read,
            processed = summary.processed,
            active = summary.active,
            lost = summary.lost,
            redetections = summary.redetections,
            outcome = ?summary.outcome,
            "run finished"
        );
        Ok(summary)
    }

    /// Detect on the first frame, pick the target and seed the tracker.
    /// The bootstrap frame is never sent to the outputs.
    fn acquire_target(&mut self) -> Result<BBox, TrackError> {
        let first = self.source.next_frame()?.ok_or(TrackError::EmptyStream)?;

        let detections = self.detector.detect(&first.image)?;
        let target = select_target(
            &detections,
            &self.config.target_class,
            self.config.confidence_threshold,
        )?;

        self.tracker.init(&first.image, target)?;
        info!(
            class = %self.config.target_class,
            x = target.x,
            y = target.y,
            width = target.width,
            height = target.height,
            "target acquired"
        );
        Ok(target)
    }

    fn track(
        &mut self,
        frame: &Frame<S::Image>,
        machine: &mut TrackStateMachine,
        redetections: &mut u64,
    ) -> TrackState {
        let state = match self.tracker.update(&frame.image) {
            Ok(result) => TrackState::from(result),
            Err(e) => {
                warn!(frame = frame.index, error = %e, "tracker update failed");
                TrackState::Lost
            }
        };

        let redetect_due = self
            .config
            .redetect_after
            .is_some_and(|n| machine.consecutive_lost().saturating_add(1) >= n);

        if state.is_active() || !redetect_due {
            return machine.record(state, frame.index);
        }

        match self.reacquire(frame) {
            Some(target) => {
                *redetections += 1;
                machine.record(TrackState::Active(target), frame.index)
            }
            None => {
                let state = machine.record(TrackState::Lost, frame.index);
                machine.reset_streak();
                state
            }
        }
    }

    /// Run the detector again on a lost frame and re-seed the tracker if a
    /// target qualifies.
    fn reacquire(&mut self, frame: &Frame<S::Image>) -> Option<BBox> {
        let detections = match self.detector.detect(&frame.image) {
            Ok(detections) => detections,
            Err(e) => {
                warn!(frame = frame.index, error = %e, "re-detection failed");
                return None;
            }
        };

        let target = match select_target(
            &detections,
            &self.config.target_class,
            self.config.confidence_threshold,
        ) {
            Ok(target) => target,
            Err(_) => {
                debug!(frame = frame.index, "re-detection found no target");
                return None;
            }
        };

        if let Err(e) = self.tracker.init(&frame.image, target) {
            warn!(frame = frame.index, error = %e, "tracker re-initialization failed");
            return None;
        }

        info!(frame = frame.index, ?target, "target re-acquired");
        Some(target)
    }
}
