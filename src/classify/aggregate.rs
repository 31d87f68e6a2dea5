// SPDX-License-Identifier: GPL-3.0-only

//! Per-photo score aggregation
//!
//! Collapses the per-patch infected confidences into one verdict: the
//! arithmetic mean against a fixed threshold. The mean is strictly
//! greater-than; a photo sitting exactly on the threshold is not
//! infected.

use tracing::info;

use crate::constants::INFECTED_THRESHOLD;
use crate::errors::AggregationError;

/// Final classification label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Infected,
    NotInfected,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Infected => write!(f, "Infected"),
            Label::NotInfected => write!(f, "Not infected"),
        }
    }
}

/// Photo-level verdict with the evidence behind it
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub label: Label,
    pub mean_score: f32,
    pub per_patch_scores: Vec<f32>,
}

/// Mean-threshold aggregation over per-patch scores
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreAggregator;

impl ScoreAggregator {
    /// Aggregate per-patch infected confidences into a verdict
    ///
    /// Order-independent. An empty score list is an error; it means no
    /// patch survived inference and there is no evidence to decide on.
    pub fn aggregate(&self, scores: Vec<f32>) -> Result<Verdict, AggregationError> {
        if scores.is_empty() {
            return Err(AggregationError::NoValidPatches);
        }

        let mean_score = scores.iter().sum::<f32>() / scores.len() as f32;
        let label = if mean_score > INFECTED_THRESHOLD {
            Label::Infected
        } else {
            Label::NotInfected
        };

        info!(
            mean_score,
            patches = scores.len(),
            verdict = %label,
            "Aggregated photo verdict"
        );

        Ok(Verdict {
            label,
            mean_score,
            per_patch_scores: scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_mean_is_infected() {
        let verdict = ScoreAggregator.aggregate(vec![0.6, 0.6]).unwrap();
        assert_eq!(verdict.label, Label::Infected);
        assert!((verdict.mean_score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_low_mean_is_not_infected() {
        let verdict = ScoreAggregator.aggregate(vec![0.4, 0.4]).unwrap();
        assert_eq!(verdict.label, Label::NotInfected);
    }

    #[test]
    fn test_threshold_boundary_is_not_infected() {
        let verdict = ScoreAggregator.aggregate(vec![0.5]).unwrap();
        assert_eq!(verdict.label, Label::NotInfected);
    }

    #[test]
    fn test_empty_scores_are_an_error() {
        assert_eq!(
            ScoreAggregator.aggregate(Vec::new()),
            Err(AggregationError::NoValidPatches)
        );
    }

    #[test]
    fn test_order_independence() {
        let a = ScoreAggregator.aggregate(vec![0.9, 0.1, 0.6]).unwrap();
        let b = ScoreAggregator.aggregate(vec![0.6, 0.9, 0.1]).unwrap();
        assert_eq!(a.label, b.label);
        assert!((a.mean_score - b.mean_score).abs() < 1e-6);
    }

    #[test]
    fn test_verdict_keeps_evidence() {
        let verdict = ScoreAggregator.aggregate(vec![0.2, 0.8]).unwrap();
        assert_eq!(verdict.per_patch_scores, vec![0.2, 0.8]);
    }
}
