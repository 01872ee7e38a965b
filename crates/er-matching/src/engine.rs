//! The matching engine: `compare` aggregates per-field comparisons into a
//! weighted score, and `classify` turns a raw total into a classification
//! (spec §4.2).

use er_core::{get_path, Value};
use er_comparators::compare_with;

use crate::types::{
    FieldScore, MatchClassification, MatchingConfig, MatchingError, RecordPair, ScoreBreakdown,
};

/// Compare a pair of records against a matching config, producing the full
/// per-field breakdown plus the aggregate total.
pub fn compare(pair: &RecordPair, config: &MatchingConfig) -> Result<ScoreBreakdown, MatchingError> {
    let mut fields = Vec::with_capacity(config.fields.len());
    let mut total = 0.0f64;
    let mut sum_weight = 0.0f64;

    for field_config in &config.fields {
        let left_value = get_path(&pair.left.record, &field_config.path).cloned();
        let right_value = get_path(&pair.right.record, &field_config.path).cloned();

        sum_weight += field_config.weight;

        let similarity = if left_value.is_none() && right_value.is_none() {
            // Vacuous match: both sides lack the field entirely.
            1.0
        } else {
            let left_for_compare = left_value.clone().unwrap_or(Value::Null);
            let right_for_compare = right_value.clone().unwrap_or(Value::Null);
            compare_with(
                field_config.comparator,
                &left_for_compare,
                &right_for_compare,
                &field_config.options,
            )
            .map_err(|e| MatchingError::InvalidStrategy(e.to_string()))?
        };

        let vetoed = field_config
            .threshold
            .is_some_and(|threshold| similarity < threshold);

        let weighted_score = if vetoed {
            0.0
        } else {
            similarity * field_config.weight
        };

        total += weighted_score;

        fields.push(FieldScore {
            field: field_config.path.clone(),
            strategy: field_config.comparator.name().to_string(),
            left_value,
            right_value,
            similarity,
            weight: field_config.weight,
            weighted_score,
        });
    }

    let normalized_total = if sum_weight > 0.0 {
        total / sum_weight
    } else {
        0.0
    };

    Ok(ScoreBreakdown {
        fields,
        total,
        normalized_total,
    })
}

/// Classify a raw `total` against the config's thresholds. The thresholds
/// operate in the same (unnormalized) units as `total`, per the resolution
/// of the open question in spec §9 recorded in `DESIGN.md`.
pub fn classify(total: f64, config: &MatchingConfig) -> MatchClassification {
    if total < config.no_match_threshold {
        MatchClassification::NoMatch
    } else if total > config.definite_match_threshold {
        MatchClassification::DefiniteMatch
    } else {
        MatchClassification::PossibleMatch
    }
}

/// Sort a candidate list by `total` descending, breaking ties by left-side
/// id then right-side id (lexicographic ascending) for stable output
/// (spec §4.2 "Tie-break policy").
pub fn sort_candidates<T>(
    candidates: &mut [T],
    total_of: impl Fn(&T) -> f64,
    left_id_of: impl Fn(&T) -> &str,
    right_id_of: impl Fn(&T) -> &str,
) {
    candidates.sort_by(|a, b| {
        total_of(b)
            .partial_cmp(&total_of(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| left_id_of(a).cmp(left_id_of(b)))
            .then_with(|| right_id_of(a).cmp(right_id_of(b)))
    });
}

#[cfg(test)]
mod tests;
