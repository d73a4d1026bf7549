use serde::{Deserialize, Serialize};

use super::contraindications::{has_absolute, relative_count, ContraindicationResult};
use super::eligibility::EligibilityAssessment;
use super::scoring::{OrganStatus, OrganSystemScore};
use crate::config::ScoreThresholds;

/// Organ sub-score below which function is treated as borderline for safety purposes.
const BORDERLINE_ORGAN_SCORE: f64 = 0.8;

/// Final four-state eligibility classification of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    Eligible,
    PartiallyEligible,
    Ineligible,
    Contraindicated,
}

impl EligibilityStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EligibilityStatus::Eligible => "eligible",
            EligibilityStatus::PartiallyEligible => "partially eligible",
            EligibilityStatus::Ineligible => "ineligible",
            EligibilityStatus::Contraindicated => "contraindicated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLabel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringIntensity {
    Standard,
    Enhanced,
    Intensive,
}

impl From<RiskLevel> for MonitoringIntensity {
    fn from(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Low => MonitoringIntensity::Standard,
            RiskLevel::Moderate => MonitoringIntensity::Enhanced,
            RiskLevel::High | RiskLevel::VeryHigh => MonitoringIntensity::Intensive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyAssessment {
    pub risk_level: RiskLevel,
    pub monitoring: MonitoringIntensity,
    pub absolute_contraindications: usize,
    pub relative_contraindications: usize,
    pub organ_function_score: f64,
    pub recommendations: Vec<String>,
}

/// Precedence: absolute contraindication, then hard ineligibility, then score bands.
pub fn classify_eligibility(
    score: f64,
    eligibility: &EligibilityAssessment,
    contraindications: &[ContraindicationResult],
    thresholds: &ScoreThresholds,
) -> EligibilityStatus {
    if has_absolute(contraindications) {
        EligibilityStatus::Contraindicated
    } else if !eligibility.eligible {
        EligibilityStatus::Ineligible
    } else if score >= thresholds.good {
        EligibilityStatus::Eligible
    } else if score >= thresholds.acceptable {
        EligibilityStatus::PartiallyEligible
    } else {
        EligibilityStatus::Ineligible
    }
}

pub fn classify_confidence(
    score: f64,
    contraindications: &[ContraindicationResult],
    thresholds: &ScoreThresholds,
) -> ConfidenceLabel {
    if has_absolute(contraindications) {
        ConfidenceLabel::Low
    } else if score >= thresholds.excellent {
        ConfidenceLabel::High
    } else if score >= thresholds.good {
        ConfidenceLabel::Medium
    } else {
        ConfidenceLabel::Low
    }
}

pub fn classify_risk(
    organ_function_score: f64,
    contraindications: &[ContraindicationResult],
    thresholds: &ScoreThresholds,
) -> RiskLevel {
    let relative = relative_count(contraindications);
    if has_absolute(contraindications)
        || organ_function_score < thresholds.safety_exclusion_threshold
    {
        RiskLevel::VeryHigh
    } else if relative >= 2 || organ_function_score < thresholds.organ_function_minimum {
        RiskLevel::High
    } else if relative == 1 || organ_function_score < BORDERLINE_ORGAN_SCORE {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

/// Derives risk, monitoring intensity and concrete monitoring recommendations.
pub fn assess_safety(
    organ_function_score: f64,
    organ_systems: &[OrganSystemScore],
    contraindications: &[ContraindicationResult],
    thresholds: &ScoreThresholds,
) -> SafetyAssessment {
    let risk_level = classify_risk(organ_function_score, contraindications, thresholds);
    let monitoring = MonitoringIntensity::from(risk_level);
    let mut recommendations = Vec::new();

    for system in organ_systems {
        let label = system.system.label();
        match system.status {
            OrganStatus::Impaired { .. } => recommendations.push(format!(
                "repeat {label} function tests before each cycle"
            )),
            OrganStatus::Borderline => {
                recommendations.push(format!("trend {label} function during treatment"))
            }
            OrganStatus::Unknown => {
                recommendations.push(format!("complete {label} baseline before first dose"))
            }
            OrganStatus::Adequate => {}
        }
    }

    for contraindication in contraindications.iter().filter(|result| !result.is_absolute()) {
        recommendations.push(format!(
            "document mitigation for {} ({})",
            contraindication.description, contraindication.matched_term
        ));
    }

    if monitoring == MonitoringIntensity::Intensive {
        recommendations.push("weekly clinical review during the first cycle".to_string());
    }

    SafetyAssessment {
        risk_level,
        monitoring,
        absolute_contraindications: contraindications.len() - relative_count(contraindications),
        relative_contraindications: relative_count(contraindications),
        organ_function_score,
        recommendations,
    }
}
