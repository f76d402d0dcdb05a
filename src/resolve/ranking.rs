use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::executor::AttemptState;
use super::types::Answer;

/// Ordering between two hits: higher confidence first, then source priority.
pub fn rank(a: &Answer, b: &Answer) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.source.priority().cmp(&b.source.priority()))
}

/// Pick the best completed hit at or above `min_confidence`.
///
/// Depends only on which attempts completed, never on the order they
/// arrived in.
pub fn select(outcomes: &BTreeMap<String, AttemptState>, min_confidence: f64) -> Option<Answer> {
    outcomes
        .values()
        .filter_map(|state| match state {
            AttemptState::Completed(answer)
                if answer.is_hit() && answer.confidence >= min_confidence =>
            {
                Some(answer)
            }
            _ => None,
        })
        .min_by(|a, b| rank(a, b))
        .cloned()
}
