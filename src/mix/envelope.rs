//! Crossfade envelope: per-track gains converging on the active selection
//!
//! Gains move at most `step` percent per mix iteration, producing a
//! click-free ramp when the caller flips the active track mid-playback.
//! The envelope advances once per iteration regardless of which tracks
//! still have data, so a switch keeps progressing even while one side is
//! draining alone.

/// Target configuration for one active-track selection.
const FULL: i32 = 100;
const MUTED: i32 = 0;

#[derive(Debug, Clone)]
pub struct VolumeEnvelope {
    vocal_gain: i32,
    accomp_gain: i32,
    step: i32,
}

impl VolumeEnvelope {
    /// Envelope already settled at the targets for the given selection.
    /// Used at prepare time so playback starts without an audible ramp.
    pub fn at_target(vocal_active: bool, step: i32) -> Self {
        let (vocal_gain, accomp_gain) = Self::targets(vocal_active);
        Self {
            vocal_gain,
            accomp_gain,
            step,
        }
    }

    fn targets(vocal_active: bool) -> (i32, i32) {
        if vocal_active {
            (FULL, MUTED)
        } else {
            (MUTED, FULL)
        }
    }

    /// Move both gains one step toward the targets for the given selection.
    pub fn advance(&mut self, vocal_active: bool) {
        let (vocal_target, accomp_target) = Self::targets(vocal_active);
        self.vocal_gain = step_toward(self.vocal_gain, vocal_target, self.step);
        self.accomp_gain = step_toward(self.accomp_gain, accomp_target, self.step);
    }

    pub fn vocal_gain(&self) -> i32 {
        self.vocal_gain
    }

    pub fn accomp_gain(&self) -> i32 {
        self.accomp_gain
    }

    /// True once both gains sit exactly on their targets.
    pub fn settled(&self, vocal_active: bool) -> bool {
        let (vocal_target, accomp_target) = Self::targets(vocal_active);
        self.vocal_gain == vocal_target && self.accomp_gain == accomp_target
    }
}

/// One bounded step toward `target`, never overshooting.
fn step_toward(current: i32, target: i32, step: i32) -> i32 {
    if current < target {
        (current + step).min(target)
    } else if current > target {
        (current - step).max(target)
    } else {
        current
    }
}
