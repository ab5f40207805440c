//! Mood state machine for the eating character.
//!
//! The scale is a bounded "bloat" factor in [0.5, 2.5]. Strong scores shrink
//! it (serene), weak scores grow it (overwhelmed), and the middle band drifts
//! it back toward 1.0. Transitions are pure; the session applies one per
//! aggregate-score recomputation.

use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 2.5;

const SERENE_THRESHOLD: f64 = 0.6;
const OVERWHELMED_THRESHOLD: f64 = 0.4;
const NEUTRAL_DRIFT: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Serene,
    Neutral,
    Overwhelmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodState {
    pub scale: f64,
    pub mood: Mood,
}

impl MoodState {
    /// Baseline state, also the reset target when the day has no meals.
    pub fn neutral() -> Self {
        Self {
            scale: 1.0,
            mood: Mood::Neutral,
        }
    }
}

impl Default for MoodState {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Advances the state for a new aggregate health score. `sensitivity` scales
/// the serene/overwhelmed step sizes; the neutral drift is unscaled.
pub fn transition(current: MoodState, health_score: f64, sensitivity: f64) -> MoodState {
    if health_score > SERENE_THRESHOLD {
        MoodState {
            mood: Mood::Serene,
            scale: (current.scale - 0.1 * sensitivity).max(MIN_SCALE),
        }
    } else if health_score < OVERWHELMED_THRESHOLD {
        MoodState {
            mood: Mood::Overwhelmed,
            scale: (current.scale + 0.2 * sensitivity).min(MAX_SCALE),
        }
    } else {
        let scale = if current.scale > 1.0 {
            (current.scale - NEUTRAL_DRIFT).max(1.0)
        } else if current.scale < 1.0 {
            (current.scale + NEUTRAL_DRIFT).min(1.0)
        } else {
            current.scale
        };
        MoodState {
            mood: Mood::Neutral,
            scale,
        }
    }
}
