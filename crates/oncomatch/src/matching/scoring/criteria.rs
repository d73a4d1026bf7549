//! One pure scorer per clinical dimension.
//!
//! Each scorer returns a [`CriterionScore`] in [0, 1]. Gaps in protocol data degrade the
//! affected criterion to [`NEUTRAL_SCORE`] instead of failing the whole evaluation.

use super::organ::assess_organ_systems;
use super::{Criterion, CriterionScore};
use crate::config::ContraindicationPenalty;
use crate::matching::domain::{
    normalize_term, terms_match, PatientProfile, ResponseCategory, TreatmentProtocol,
};

const ECOG_WEIGHT: f64 = 0.7;
const KARNOFSKY_WEIGHT: f64 = 0.3;

const BIOMARKER_MISSING_PENALTY: f64 = 0.4;
const BIOMARKER_MISMATCH_PENALTY: f64 = 0.25;
const BIOMARKER_INCONCLUSIVE_PENALTY: f64 = 0.15;
const BIOMARKER_EXCLUDED_PENALTY: f64 = 0.5;

const STAGE_STEP_PENALTY: f64 = 0.2;
const STAGE_SUBSTAGE_SCORE: f64 = 0.9;
const STAGE_FLOOR: f64 = 0.2;
/// Whole-stage distance at which disease extent is treated as incompatible.
const STAGE_INCOMPATIBLE_DISTANCE: u8 = 4;

const HISTORY_PROGRESSED_PENALTY: f64 = 0.2;
const HISTORY_STABLE_PENALTY: f64 = 0.6;
const HISTORY_CROSS_RESISTANCE_PENALTY: f64 = 0.8;
const HISTORY_TOXICITY_PENALTY: f64 = 0.85;
const HISTORY_FLOOR: f64 = 0.1;

const AGE_BELOW_MIN_STEP: f64 = 0.2;
const AGE_ABOVE_MAX_STEP: f64 = 0.05;
const AGE_ABOVE_MAX_FLOOR: f64 = 0.2;

pub fn performance_status(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
) -> CriterionScore {
    let criteria = &protocol.eligibility.performance;
    let ecog = patient.performance.ecog;

    let Some(max_allowed) = criteria.max_ecog() else {
        return CriterionScore::neutral(
            Criterion::PerformanceStatus,
            "protocol declares no allowed ECOG grades",
        );
    };

    let (ecog_score, ecog_note) = if criteria.allows(ecog) || ecog <= max_allowed {
        (1.0, format!("{ecog} within allowed range (max {})", max_allowed.grade()))
    } else {
        let excess = ecog.grade() - max_allowed.grade();
        let score = match excess {
            1 => 0.7,
            2 => 0.4,
            _ => 0.1,
        };
        (
            score,
            format!("{ecog} is {excess} grade(s) above maximum {}", max_allowed.grade()),
        )
    };

    let karnofsky = patient.performance.karnofsky.score();
    let (karnofsky_score, karnofsky_note) = match criteria.min_karnofsky {
        None => (1.0, "no Karnofsky floor".to_string()),
        Some(required) => {
            let required = required.score();
            let deficit = required.saturating_sub(karnofsky);
            let score = match deficit {
                0 => 1.0,
                1..=10 => 0.8,
                11..=20 => 0.5,
                _ => 0.2,
            };
            (score, format!("Karnofsky {karnofsky} vs minimum {required}"))
        }
    };

    CriterionScore::new(
        Criterion::PerformanceStatus,
        ECOG_WEIGHT * ecog_score + KARNOFSKY_WEIGHT * karnofsky_score,
        format!("{ecog_note}; {karnofsky_note}"),
    )
}

pub fn biomarkers(patient: &PatientProfile, protocol: &TreatmentProtocol) -> CriterionScore {
    let criteria = &protocol.eligibility.biomarkers;
    if criteria.is_empty() {
        return CriterionScore::new(Criterion::Biomarkers, 1.0, "no biomarker requirements");
    }
    if criteria
        .required
        .iter()
        .chain(criteria.excluded.iter())
        .any(|requirement| requirement.name.trim().is_empty())
    {
        return CriterionScore::neutral(
            Criterion::Biomarkers,
            "protocol lists a biomarker requirement without a name",
        );
    }

    let mut score = 1.0;
    let mut notes = Vec::new();
    let mut missing = Vec::new();

    for requirement in &criteria.required {
        match patient.biomarker(&requirement.name) {
            None => {
                score -= BIOMARKER_MISSING_PENALTY;
                missing.push(requirement.name.clone());
            }
            Some(result) if !result.status.is_conclusive() => {
                score -= BIOMARKER_INCONCLUSIVE_PENALTY;
                notes.push(format!(
                    "{} result {}",
                    requirement.name,
                    result.status.label()
                ));
            }
            Some(result) if !result.status.satisfies(requirement.status) => {
                score -= BIOMARKER_MISMATCH_PENALTY;
                notes.push(format!(
                    "{} {} but {} required",
                    requirement.name,
                    result.status.label(),
                    requirement.status.label()
                ));
            }
            Some(_) => notes.push(format!("{} matched", requirement.describe())),
        }
    }

    for excluded in &criteria.excluded {
        if let Some(result) = patient.biomarker(&excluded.name) {
            if result.status.satisfies(excluded.status) {
                score -= BIOMARKER_EXCLUDED_PENALTY;
                notes.push(format!("excluded biomarker present: {}", excluded.describe()));
            }
        }
    }

    if !missing.is_empty() {
        notes.push(format!("missing: {}", missing.join(", ")));
    }

    if !criteria.required.is_empty() && missing.len() == criteria.required.len() {
        return CriterionScore::new(
            Criterion::Biomarkers,
            0.0,
            format!(
                "no required biomarker on record ({})",
                missing.join(", ")
            ),
        );
    }

    CriterionScore::new(Criterion::Biomarkers, score, notes.join("; "))
}

pub fn stage(patient: &PatientProfile, protocol: &TreatmentProtocol) -> CriterionScore {
    let stages = &protocol.eligibility.stages;
    if stages.is_empty() {
        return CriterionScore::neutral(Criterion::Stage, "protocol declares no stage requirement");
    }
    if stages.iter().any(|stage| is_wildcard_stage(stage)) {
        return CriterionScore::new(Criterion::Stage, 1.0, "protocol accepts any stage");
    }

    let patient_stage = patient.disease.stage.as_str();
    let patient_key = canonical_stage(patient_stage);
    if stages.iter().any(|stage| canonical_stage(stage) == patient_key) {
        return CriterionScore::new(
            Criterion::Stage,
            1.0,
            format!("stage {patient_stage} listed by protocol"),
        );
    }

    let Some(patient_rank) = StageRank::parse(patient_stage) else {
        return CriterionScore::neutral(
            Criterion::Stage,
            format!("unrecognised patient stage '{patient_stage}'"),
        );
    };
    let required: Vec<StageRank> = stages.iter().filter_map(|s| StageRank::parse(s)).collect();
    if required.is_empty() {
        return CriterionScore::neutral(Criterion::Stage, "protocol stages are not comparable");
    }

    if required
        .iter()
        .any(|rank| rank.major == patient_rank.major && rank.sub.is_none())
    {
        return CriterionScore::new(
            Criterion::Stage,
            1.0,
            format!("stage {patient_stage} within listed stage group"),
        );
    }

    let distance = required
        .iter()
        .map(|rank| rank.major.abs_diff(patient_rank.major))
        .min()
        .unwrap_or(u8::MAX);

    let score = match distance {
        0 => STAGE_SUBSTAGE_SCORE,
        d if d >= STAGE_INCOMPATIBLE_DISTANCE => 0.0,
        d => (1.0 - STAGE_STEP_PENALTY * f64::from(d)).max(STAGE_FLOOR),
    };

    CriterionScore::new(
        Criterion::Stage,
        score,
        format!(
            "stage {patient_stage} is {distance} stage(s) from required {}",
            stages.join("/")
        ),
    )
}

pub fn organ_function(patient: &PatientProfile, protocol: &TreatmentProtocol) -> CriterionScore {
    let systems = assess_organ_systems(patient, &protocol.eligibility.organ_function);
    let Some(weakest) = systems
        .iter()
        .min_by(|left, right| left.score.total_cmp(&right.score))
    else {
        return CriterionScore::new(
            Criterion::OrganFunction,
            1.0,
            "no organ-function constraints",
        );
    };

    let findings: Vec<String> = systems
        .iter()
        .flat_map(|system| {
            system
                .findings
                .iter()
                .map(move |finding| format!("{}: {finding}", system.system.label()))
        })
        .collect();
    let note = if findings.is_empty() {
        format!("{} organ system(s) adequate", systems.len())
    } else {
        format!(
            "weakest system {}; {}",
            weakest.system.label(),
            findings.join("; ")
        )
    };

    CriterionScore::new(Criterion::OrganFunction, weakest.score, note)
}

pub fn treatment_history(patient: &PatientProfile, protocol: &TreatmentProtocol) -> CriterionScore {
    if patient.is_treatment_naive() {
        return CriterionScore::new(Criterion::TreatmentHistory, 1.0, "treatment-naive");
    }

    let mut score = 1.0;
    let mut notes = Vec::new();

    for exposure in &patient.treatment_history {
        if exposure.protocol_id == protocol.id {
            match exposure.best_response {
                ResponseCategory::ProgressiveDisease => {
                    score *= HISTORY_PROGRESSED_PENALTY;
                    notes.push("progressed on this protocol previously".to_string());
                }
                ResponseCategory::StableDisease => {
                    score *= HISTORY_STABLE_PENALTY;
                    notes.push("only stable disease on this protocol previously".to_string());
                }
                _ => notes.push("prior exposure to this protocol".to_string()),
            }
        } else if exposure.best_response == ResponseCategory::ProgressiveDisease {
            let shared: Vec<&str> = protocol
                .drug_names()
                .filter(|drug| {
                    exposure
                        .drugs
                        .iter()
                        .any(|prior| normalize_term(prior) == normalize_term(drug))
                })
                .collect();
            if !shared.is_empty() {
                score *= HISTORY_CROSS_RESISTANCE_PENALTY;
                notes.push(format!(
                    "possible cross-resistance via {}",
                    shared.join(", ")
                ));
            }
        }

        for toxicity in exposure.toxicities.iter().filter(|tox| tox.is_severe()) {
            if protocol
                .expected_toxicities
                .iter()
                .any(|expected| terms_match(expected, &toxicity.term))
            {
                score *= HISTORY_TOXICITY_PENALTY;
                notes.push(format!(
                    "prior grade {} {} overlaps expected toxicity",
                    toxicity.grade, toxicity.term
                ));
            }
        }
    }

    if notes.is_empty() {
        notes.push(format!(
            "{} prior line(s) without overlap",
            patient.treatment_history.len()
        ));
    }

    CriterionScore::new(
        Criterion::TreatmentHistory,
        f64::max(score, HISTORY_FLOOR),
        notes.join("; "),
    )
}

pub fn age(patient: &PatientProfile, protocol: &TreatmentProtocol) -> CriterionScore {
    let range = protocol.eligibility.age;
    let age = patient.demographics.age;

    if range.contains(age) {
        return CriterionScore::new(
            Criterion::Age,
            1.0,
            format!("age {age} within {}", range.describe()),
        );
    }

    let score = match (range.min(), range.max()) {
        (Some(min), _) if age < min => {
            (1.0 - AGE_BELOW_MIN_STEP * f64::from(min - age)).max(0.0)
        }
        (_, Some(max)) => {
            (1.0 - AGE_ABOVE_MAX_STEP * f64::from(age - max)).max(AGE_ABOVE_MAX_FLOOR)
        }
        _ => 1.0,
    };

    CriterionScore::new(
        Criterion::Age,
        score,
        format!("age {age} outside {}", range.describe()),
    )
}

/// Additive penalty for detected contraindications. Not a [0, 1] criterion score.
pub fn contraindication_penalty(matches: usize, penalty: &ContraindicationPenalty) -> f64 {
    penalty.for_matches(matches)
}

fn is_wildcard_stage(stage: &str) -> bool {
    matches!(normalize_term(stage).as_str(), "any" | "all" | "any stage" | "all stages")
}

fn canonical_stage(stage: &str) -> String {
    let normalized = normalize_term(stage);
    normalized
        .strip_prefix("stage ")
        .unwrap_or(&normalized)
        .replace(' ', "")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StageRank {
    major: u8,
    sub: Option<char>,
}

impl StageRank {
    fn parse(raw: &str) -> Option<Self> {
        let key = canonical_stage(raw);
        let (numeral, sub) = match key.chars().last() {
            Some(last @ ('a' | 'b' | 'c')) if key.len() > 1 => (&key[..key.len() - 1], Some(last)),
            _ => (key.as_str(), None),
        };
        let major = match numeral {
            "0" => 0,
            "i" | "1" => 1,
            "ii" | "2" => 2,
            "iii" | "3" => 3,
            "iv" | "4" => 4,
            _ => return None,
        };
        Some(Self { major, sub })
    }
}
