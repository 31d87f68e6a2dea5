// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for verdict aggregation

use patchscan::classify::{Label, ScoreAggregator};
use patchscan::errors::AggregationError;

#[test]
fn test_majority_infected_scores() {
    let verdict = ScoreAggregator
        .aggregate(vec![0.9, 0.8, 0.7, 0.2])
        .unwrap();
    assert_eq!(verdict.label, Label::Infected);
}

#[test]
fn test_majority_clean_scores() {
    let verdict = ScoreAggregator
        .aggregate(vec![0.1, 0.2, 0.3, 0.9])
        .unwrap();
    assert_eq!(verdict.label, Label::NotInfected);
}

#[test]
fn test_exact_threshold_mean_is_not_infected() {
    let verdict = ScoreAggregator.aggregate(vec![0.4, 0.6]).unwrap();
    assert_eq!(verdict.label, Label::NotInfected);
}

#[test]
fn test_single_score_photo() {
    let verdict = ScoreAggregator.aggregate(vec![0.51]).unwrap();
    assert_eq!(verdict.label, Label::Infected);
}

#[test]
fn test_no_scores_is_an_error() {
    assert_eq!(
        ScoreAggregator.aggregate(Vec::new()),
        Err(AggregationError::NoValidPatches)
    );
}

#[test]
fn test_verdict_is_order_independent() {
    let mut scores = vec![0.85, 0.05, 0.45, 0.65, 0.25];
    let forward = ScoreAggregator.aggregate(scores.clone()).unwrap();
    scores.reverse();
    let backward = ScoreAggregator.aggregate(scores).unwrap();
    assert_eq!(forward.label, backward.label);
    assert!((forward.mean_score - backward.mean_score).abs() < 1e-6);
}

#[test]
fn test_label_display_strings() {
    assert_eq!(Label::Infected.to_string(), "Infected");
    assert_eq!(Label::NotInfected.to_string(), "Not infected");
}
