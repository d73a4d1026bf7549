use serde::{Deserialize, Serialize};

use super::{clamp_unit, NEUTRAL_SCORE};
use crate::matching::domain::{
    CardiacFloor, HematologicFloor, HepaticFloor, LaboratoryValues, OrganFunctionCriteria,
    OrganSystem, PatientProfile, PulmonaryFloor, RenalFloor,
};

/// Multiplier applied for each lab value outside the protocol floor.
const OUT_OF_RANGE_PENALTY: f64 = 0.5;
/// Multiplier applied for values passing within the borderline margin.
const BORDERLINE_PENALTY: f64 = 0.85;
/// Relative distance from the limit treated as borderline.
const BORDERLINE_MARGIN: f64 = 0.10;
/// Largest relative shortfall still considered mild (dose-modifiable).
const MILD_SHORTFALL: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum OrganStatus {
    Adequate,
    Borderline,
    Impaired { mild: bool },
    Unknown,
}

/// Typed result of checking one organ system against its protocol floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganSystemScore {
    pub system: OrganSystem,
    pub score: f64,
    pub status: OrganStatus,
    pub findings: Vec<String>,
    pub missing_measures: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Max,
    Min,
}

struct LabCheck {
    measure: &'static str,
    value: Option<f64>,
    limit: f64,
    bound: Bound,
}

enum LabOutcome {
    Within,
    Borderline,
    Exceeded { shortfall: f64 },
    Missing,
}

impl LabCheck {
    fn max(measure: &'static str, value: Option<f64>, limit: f64) -> Self {
        Self {
            measure,
            value,
            limit,
            bound: Bound::Max,
        }
    }

    fn min(measure: &'static str, value: Option<f64>, limit: f64) -> Self {
        Self {
            measure,
            value,
            limit,
            bound: Bound::Min,
        }
    }

    fn outcome(&self) -> LabOutcome {
        let Some(value) = self.value.filter(|value| value.is_finite()) else {
            return LabOutcome::Missing;
        };
        let scale = self.limit.abs().max(f64::EPSILON);
        let (excess, headroom) = match self.bound {
            Bound::Max => (value - self.limit, self.limit - value),
            Bound::Min => (self.limit - value, value - self.limit),
        };
        if excess > 0.0 {
            LabOutcome::Exceeded {
                shortfall: excess / scale,
            }
        } else if headroom / scale <= BORDERLINE_MARGIN {
            LabOutcome::Borderline
        } else {
            LabOutcome::Within
        }
    }

    fn describe_limit(&self) -> String {
        match self.bound {
            Bound::Max => format!("<= {}", self.limit),
            Bound::Min => format!(">= {}", self.limit),
        }
    }
}

/// Checks every organ system the protocol constrains. Unconstrained systems are skipped.
pub fn assess_organ_systems(
    patient: &PatientProfile,
    criteria: &OrganFunctionCriteria,
) -> Vec<OrganSystemScore> {
    let labs = &patient.laboratory;
    let mut scores = Vec::new();
    if let Some(floor) = &criteria.hepatic {
        scores.push(hepatic(labs, floor));
    }
    if let Some(floor) = &criteria.renal {
        scores.push(renal(labs, floor));
    }
    if let Some(floor) = &criteria.cardiac {
        scores.push(cardiac(labs, floor));
    }
    if let Some(floor) = &criteria.pulmonary {
        scores.push(pulmonary(labs, floor));
    }
    if let Some(floor) = &criteria.hematologic {
        scores.push(hematologic(labs, floor));
    }
    scores
}

fn hepatic(labs: &LaboratoryValues, floor: &HepaticFloor) -> OrganSystemScore {
    let mut checks = vec![LabCheck::max(
        "total bilirubin",
        labs.liver.total_bilirubin,
        floor.max_bilirubin,
    )];
    if let Some(max_alt) = floor.max_alt {
        checks.push(LabCheck::max("ALT", labs.liver.alt, max_alt));
    }
    if let Some(max_ast) = floor.max_ast {
        checks.push(LabCheck::max("AST", labs.liver.ast, max_ast));
    }
    score_checks(OrganSystem::Hepatic, &checks)
}

fn renal(labs: &LaboratoryValues, floor: &RenalFloor) -> OrganSystemScore {
    score_checks(
        OrganSystem::Renal,
        &[LabCheck::min(
            "creatinine clearance",
            labs.metabolic.creatinine_clearance,
            floor.min_creatinine_clearance,
        )],
    )
}

fn cardiac(labs: &LaboratoryValues, floor: &CardiacFloor) -> OrganSystemScore {
    score_checks(
        OrganSystem::Cardiac,
        &[LabCheck::min("LVEF", labs.cardiac.lvef, floor.min_lvef)],
    )
}

fn pulmonary(labs: &LaboratoryValues, floor: &PulmonaryFloor) -> OrganSystemScore {
    score_checks(
        OrganSystem::Pulmonary,
        &[LabCheck::min("DLCO", labs.pulmonary.dlco, floor.min_dlco)],
    )
}

fn hematologic(labs: &LaboratoryValues, floor: &HematologicFloor) -> OrganSystemScore {
    let mut checks = vec![
        LabCheck::min("ANC", labs.hematology.anc, floor.min_anc),
        LabCheck::min("platelets", labs.hematology.platelets, floor.min_platelets),
    ];
    if let Some(min_hemoglobin) = floor.min_hemoglobin {
        checks.push(LabCheck::min(
            "hemoglobin",
            labs.hematology.hemoglobin,
            min_hemoglobin,
        ));
    }
    score_checks(OrganSystem::Hematologic, &checks)
}

fn score_checks(system: OrganSystem, checks: &[LabCheck]) -> OrganSystemScore {
    let mut score = 1.0;
    let mut findings = Vec::new();
    let mut missing_measures = Vec::new();
    let mut borderline = false;
    let mut worst_shortfall: Option<f64> = None;

    for check in checks {
        match check.outcome() {
            LabOutcome::Within => {}
            LabOutcome::Borderline => {
                borderline = true;
                score *= BORDERLINE_PENALTY;
                findings.push(format!(
                    "{} borderline against limit {}",
                    check.measure,
                    check.describe_limit()
                ));
            }
            LabOutcome::Exceeded { shortfall } => {
                score *= OUT_OF_RANGE_PENALTY;
                worst_shortfall = Some(worst_shortfall.map_or(shortfall, |w| w.max(shortfall)));
                findings.push(format!(
                    "{} {:.2} outside limit {}",
                    check.measure,
                    check.value.unwrap_or_default(),
                    check.describe_limit()
                ));
            }
            LabOutcome::Missing => {
                missing_measures.push(check.measure.to_string());
                findings.push(format!("{} not on record", check.measure));
            }
        }
    }

    let status = match worst_shortfall {
        Some(shortfall) => OrganStatus::Impaired {
            mild: shortfall <= MILD_SHORTFALL,
        },
        None if !missing_measures.is_empty() => {
            score = f64::min(score, NEUTRAL_SCORE);
            OrganStatus::Unknown
        }
        None if borderline => OrganStatus::Borderline,
        None => OrganStatus::Adequate,
    };

    OrganSystemScore {
        system,
        score: clamp_unit(score),
        status,
        findings,
        missing_measures,
    }
}
