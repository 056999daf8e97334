//! Confidence calibration against recorded outcomes.

use std::collections::VecDeque;

use serde_json::{Map, Value};

use crate::constants::confidence::CALIBRATION_WINDOW;

/// Adjusts raw confidence by evidence strength, task complexity and how
/// accurate past predictions turned out to be.
#[derive(Debug, Default)]
pub struct ConfidenceCalibrator {
    /// Accuracy of the most recent outcomes, oldest first
    history: VecDeque<f64>,
}

impl ConfidenceCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `raw * strength / complexity * historical_adjustment`, clamped to [0, 1].
    ///
    /// Non-positive complexity is treated as 1.0.
    pub fn calibrate(&self, raw: f64, evidence_strength: f64, complexity: f64) -> f64 {
        let complexity = if complexity > 0.0 { complexity } else { 1.0 };
        let calibrated = raw * evidence_strength / complexity * self.historical_adjustment();
        calibrated.clamp(0.0, 1.0)
    }

    /// Record how a prediction compared with the actual outcome.
    ///
    /// Accuracy is the share of predicted keys present in the outcome whose
    /// values match; 0.0 when no keys overlap.
    pub fn record_outcome(&mut self, prediction: &Map<String, Value>, actual: &Map<String, Value>) {
        let mut compared = 0usize;
        let mut correct = 0usize;
        for (key, predicted) in prediction {
            if let Some(observed) = actual.get(key) {
                compared += 1;
                if predicted == observed {
                    correct += 1;
                }
            }
        }

        let accuracy = if compared > 0 {
            correct as f64 / compared as f64
        } else {
            0.0
        };

        if self.history.len() >= CALIBRATION_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(accuracy);
    }

    /// Multiplier from recent accuracy: 0.85 below 0.7, 1.1 above 0.9
    pub fn historical_adjustment(&self) -> f64 {
        if self.history.is_empty() {
            return 1.0;
        }

        let avg = self.history.iter().sum::<f64>() / self.history.len() as f64;

        if avg < 0.7 {
            0.85
        } else if avg > 0.9 {
            1.1
        } else {
            1.0
        }
    }

    pub fn recorded(&self) -> usize {
        self.history.len()
    }
}
