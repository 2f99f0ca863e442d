use std::fmt;

use tracing::{info, warn};

use crate::postprocess::TrackingResult;
use crate::preprocess::BBox;

/// Outcome of tracking on one processed frame. Only a successful update
/// carries a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Active(BBox),
    Lost,
}

impl TrackState {
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            TrackState::Active(bbox) => Some(*bbox),
            TrackState::Lost => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TrackState::Active(_))
    }
}

impl From<TrackingResult> for TrackState {
    fn from(result: TrackingResult) -> Self {
        if result.success {
            TrackState::Active(result.bbox)
        } else {
            TrackState::Lost
        }
    }
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackState::Active(_) => f.write_str("ACTIVE"),
            TrackState::Lost => f.write_str("LOST"),
        }
    }
}

/// Records the track state of each processed frame.
///
/// Classification looks only at the current update; the counters kept here
/// are for reporting and the optional re-detection policy.
#[derive(Debug, Clone)]
pub struct TrackStateMachine {
    current: TrackState,
    active_frames: u64,
    lost_frames: u64,
    consecutive_lost: u32,
}

impl TrackStateMachine {
    /// Starts `Active` on the box the tracker was seeded with.
    pub fn new(target: BBox) -> Self {
        Self {
            current: TrackState::Active(target),
            active_frames: 0,
            lost_frames: 0,
            consecutive_lost: 0,
        }
    }

    pub fn record(&mut self, state: TrackState, frame_index: u64) -> TrackState {
        match (self.current.is_active(), state.is_active()) {
            (true, false) => warn!(frame = frame_index, "track lost"),
            (false, true) => info!(
                frame = frame_index,
                lost_for = self.consecutive_lost,
                "track recovered"
            ),
            _ => {}
        }

        match state {
            TrackState::Active(_) => {
                self.active_frames += 1;
                self.consecutive_lost = 0;
            }
            TrackState::Lost => {
                self.lost_frames += 1;
                self.consecutive_lost = self.consecutive_lost.saturating_add(1);
            }
        }

        self.current = state;
        state
    }

    /// Restart the loss streak without touching the totals.
    pub fn reset_streak(&mut self) {
        self.consecutive_lost = 0;
    }

    pub fn current(&self) -> TrackState {
        self.current
    }

    pub fn consecutive_lost(&self) -> u32 {
        self.consecutive_lost
    }

    pub fn active_frames(&self) -> u64 {
        self.active_frames
    }

    pub fn lost_frames(&self) -> u64 {
        self.lost_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_update_drops_box() {
        let result = TrackingResult {
            success: false,
            bbox: BBox::new(1, 2, 3, 4),
            score: 0.1,
        };
        let state = TrackState::from(result);
        assert_eq!(state, TrackState::Lost);
        assert_eq!(state.bbox(), None);
    }

    #[test]
    fn test_successful_update_keeps_box() {
        let result = TrackingResult {
            success: true,
            bbox: BBox::new(1, 2, 3, 4),
            score: 0.9,
        };
        assert_eq!(
            TrackState::from(result).bbox(),
            Some(BBox::new(1, 2, 3, 4))
        );
    }

    #[test]
    fn test_starts_active() {
        let machine = TrackStateMachine::new(BBox::new(0, 0, 5, 5));
        assert_eq!(machine.current(), TrackState::Active(BBox::new(0, 0, 5, 5)));
        assert_eq!(machine.active_frames(), 0);
    }

    #[test]
    fn test_no_hysteresis() {
        let mut machine = TrackStateMachine::new(BBox::new(0, 0, 5, 5));
        let boxed = TrackState::Active(BBox::new(1, 1, 5, 5));

        machine.record(TrackState::Lost, 3);
        assert_eq!(machine.current(), TrackState::Lost);
        machine.record(TrackState::Lost, 6);
        assert_eq!(machine.consecutive_lost(), 2);

        // A single success is enough to become active again
        machine.record(boxed, 9);
        assert_eq!(machine.current(), boxed);
        assert_eq!(machine.consecutive_lost(), 0);

        machine.record(TrackState::Lost, 12);
        assert_eq!(machine.current(), TrackState::Lost);

        assert_eq!(machine.active_frames(), 1);
        assert_eq!(machine.lost_frames(), 3);
    }

    #[test]
    fn test_reset_streak_keeps_totals() {
        let mut machine = TrackStateMachine::new(BBox::default());
        machine.record(TrackState::Lost, 1);
        machine.record(TrackState::Lost, 2);
        machine.reset_streak();
        assert_eq!(machine.consecutive_lost(), 0);
        assert_eq!(machine.lost_frames(), 2);
        assert_eq!(TrackState::Lost.to_string(), "LOST");
    }
}
