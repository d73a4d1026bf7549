mod aggregate;
mod criteria;
pub(crate) mod organ;

pub use aggregate::{score_breakdown, MatchScoreBreakdown};
pub use criteria::{
    age, biomarkers, contraindication_penalty, organ_function, performance_status, stage,
    treatment_history,
};
pub use organ::{assess_organ_systems, OrganStatus, OrganSystemScore};

use serde::{Deserialize, Serialize};

/// Score assigned when a criterion cannot be evaluated from the data on hand.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Clinical dimensions that contribute to the weighted match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    PerformanceStatus,
    Biomarkers,
    Stage,
    OrganFunction,
    TreatmentHistory,
    Age,
}

impl Criterion {
    pub const fn label(self) -> &'static str {
        match self {
            Criterion::PerformanceStatus => "performance status",
            Criterion::Biomarkers => "biomarkers",
            Criterion::Stage => "stage",
            Criterion::OrganFunction => "organ function",
            Criterion::TreatmentHistory => "treatment history",
            Criterion::Age => "age",
        }
    }
}

/// Normalized score in [0, 1] for one criterion, with an audit note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: Criterion,
    pub score: f64,
    pub explanation: String,
}

impl CriterionScore {
    pub(crate) fn new(criterion: Criterion, score: f64, explanation: impl Into<String>) -> Self {
        Self {
            criterion,
            score: clamp_unit(score),
            explanation: explanation.into(),
        }
    }

    pub(crate) fn neutral(criterion: Criterion, gap: impl Into<String>) -> Self {
        Self::new(
            criterion,
            NEUTRAL_SCORE,
            format!("{} (scored neutral)", gap.into()),
        )
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
