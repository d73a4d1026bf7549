use serde::{Deserialize, Serialize};

use super::{criteria, clamp_unit, CriterionScore};
use crate::config::{CriterionWeights, MatchingConfig};
use crate::matching::domain::{PatientProfile, TreatmentProtocol};

/// Per-criterion sub-scores and the terms that produce the final weighted total.
///
/// `total_weighted_score == clamp(weighted_sum - contraindication_penalty + evidence_bonus, 0, 1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScoreBreakdown {
    pub performance_status: CriterionScore,
    pub biomarkers: CriterionScore,
    pub stage: CriterionScore,
    pub organ_function: CriterionScore,
    pub treatment_history: CriterionScore,
    pub age: CriterionScore,
    pub weights: CriterionWeights,
    pub contraindication_penalty: f64,
    pub evidence_bonus: f64,
    pub total_weighted_score: f64,
}

impl MatchScoreBreakdown {
    pub fn components(&self) -> [&CriterionScore; 6] {
        [
            &self.performance_status,
            &self.biomarkers,
            &self.stage,
            &self.organ_function,
            &self.treatment_history,
            &self.age,
        ]
    }

    /// `Σ score_i * weight_i`, always summed in declaration order.
    pub fn weighted_sum(&self) -> f64 {
        self.components()
            .iter()
            .zip(self.weights.entries())
            .map(|(component, (_, weight))| component.score * weight)
            .sum()
    }

    /// Rebuilds the total from its parts.
    pub fn recompute_total(&self) -> f64 {
        combine(
            self.weighted_sum(),
            self.contraindication_penalty,
            self.evidence_bonus,
        )
    }

    pub fn strongest(&self) -> &CriterionScore {
        self.components()
            .into_iter()
            .max_by(|left, right| left.score.total_cmp(&right.score))
            .unwrap_or(&self.performance_status)
    }

    pub fn weakest(&self) -> &CriterionScore {
        self.components()
            .into_iter()
            .min_by(|left, right| left.score.total_cmp(&right.score))
            .unwrap_or(&self.performance_status)
    }
}

fn combine(weighted_sum: f64, penalty: f64, bonus: f64) -> f64 {
    clamp_unit(weighted_sum - penalty + bonus)
}

/// Runs every criterion scorer and folds the results with the given weights.
pub fn score_breakdown(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
    config: &MatchingConfig,
    weights: &CriterionWeights,
    contraindication_count: usize,
) -> MatchScoreBreakdown {
    let mut breakdown = MatchScoreBreakdown {
        performance_status: criteria::performance_status(patient, protocol),
        biomarkers: criteria::biomarkers(patient, protocol),
        stage: criteria::stage(patient, protocol),
        organ_function: criteria::organ_function(patient, protocol),
        treatment_history: criteria::treatment_history(patient, protocol),
        age: criteria::age(patient, protocol),
        weights: *weights,
        contraindication_penalty: criteria::contraindication_penalty(
            contraindication_count,
            &config.contraindication_penalty,
        ),
        evidence_bonus: config.evidence_bonus.bonus_for(protocol.evidence_level),
        total_weighted_score: 0.0,
    };
    breakdown.total_weighted_score = breakdown.recompute_total();
    breakdown
}
