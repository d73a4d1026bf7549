use super::common::*;
use crate::config::MatchingConfig;
use crate::matching::domain::{
    AgeRange, BiomarkerResult, BiomarkerStatus, EvidenceLevel, ProtocolId, ResponseCategory,
    Toxicity, TreatmentExposure, TreatmentLine,
};
use crate::matching::engine::calculate_match_score;
use crate::matching::scoring::{self, score_breakdown, NEUTRAL_SCORE};

const TOLERANCE: f64 = 1e-9;

fn exposure(protocol_id: &str, response: ResponseCategory, drugs: &[&str]) -> TreatmentExposure {
    TreatmentExposure {
        protocol_id: ProtocolId(protocol_id.to_string()),
        line: TreatmentLine::First,
        drugs: drugs.iter().map(|drug| drug.to_string()).collect(),
        started_on: date(2025, 3, 1),
        ended_on: Some(date(2025, 9, 1)),
        best_response: response,
        toxicities: Vec::new(),
    }
}

#[test]
fn fit_patient_without_biomarker_gates_scores_high() {
    let patient = patient();
    let protocol = protocol("carbo-pem");

    assert_eq!(scoring::performance_status(&patient, &protocol).score, 1.0);
    assert_eq!(scoring::biomarkers(&patient, &protocol).score, 1.0);
    assert!(calculate_match_score(&patient, &protocol, &MatchingConfig::default()) >= 0.8);
}

#[test]
fn ecog_one_grade_over_maximum_is_partially_credited() {
    let mut patient = patient();
    patient.performance.ecog = ecog(2);

    let score = scoring::performance_status(&patient, &protocol("carbo-pem"));

    assert!((score.score - 0.79).abs() < TOLERANCE);
    assert!(score.explanation.contains("above maximum"));
}

#[test]
fn karnofsky_shortfall_refines_performance_score() {
    let mut patient = patient();
    patient.performance.karnofsky = karnofsky(50);

    let score = scoring::performance_status(&patient, &protocol("carbo-pem"));

    // ECOG still within range; Karnofsky 20 points short.
    assert!((score.score - (0.7 + 0.3 * 0.5)).abs() < TOLERANCE);
}

#[test]
fn protocol_without_ecog_range_degrades_to_neutral() {
    let mut protocol = protocol("carbo-pem");
    protocol.eligibility.performance.allowed_ecog.clear();

    let score = scoring::performance_status(&patient(), &protocol);

    assert_eq!(score.score, NEUTRAL_SCORE);
    assert!(score.explanation.contains("neutral"));
}

#[test]
fn every_required_biomarker_missing_floors_score_at_zero() {
    let mut patient = patient();
    patient.disease.biomarkers.remove("EGFR");
    let protocol = protocol_requiring("osimertinib", "EGFR", BiomarkerStatus::Positive);

    let score = scoring::biomarkers(&patient, &protocol);

    assert_eq!(score.score, 0.0);
    assert!(score.explanation.contains("EGFR"));
}

#[test]
fn biomarker_status_mismatch_is_a_smaller_penalty() {
    let protocol = protocol_requiring("osimertinib", "egfr", BiomarkerStatus::Positive);

    let score = scoring::biomarkers(&patient(), &protocol);

    assert!((score.score - 0.75).abs() < TOLERANCE);
}

#[test]
fn amplification_satisfies_positive_requirement() {
    let mut patient = patient();
    patient
        .disease
        .biomarkers
        .insert("HER2".to_string(), BiomarkerResult::new(BiomarkerStatus::Amplified));
    let protocol = protocol_requiring("trastuzumab", "HER2", BiomarkerStatus::Positive);

    assert_eq!(scoring::biomarkers(&patient, &protocol).score, 1.0);
}

#[test]
fn excluded_biomarker_outweighs_mismatch() {
    let mut protocol = protocol("carbo-pem");
    protocol
        .eligibility
        .biomarkers
        .excluded
        .push(crate::matching::domain::BiomarkerRequirement {
            name: "ALK".to_string(),
            status: BiomarkerStatus::Negative,
        });

    let score = scoring::biomarkers(&patient(), &protocol);

    assert!((score.score - 0.5).abs() < TOLERANCE);
}

#[test]
fn stage_distance_decays_and_bottoms_out() {
    let mut protocol = protocol("carbo-pem");
    protocol.eligibility.stages = vec!["IV".to_string()];
    let mut patient = patient();

    patient.disease.stage = "Stage II".to_string();
    assert!((scoring::stage(&patient, &protocol).score - 0.6).abs() < TOLERANCE);

    patient.disease.stage = "0".to_string();
    assert_eq!(scoring::stage(&patient, &protocol).score, 0.0);

    patient.disease.stage = "IVB".to_string();
    assert_eq!(scoring::stage(&patient, &protocol).score, 1.0);

    patient.disease.stage = "limited".to_string();
    assert_eq!(scoring::stage(&patient, &protocol).score, NEUTRAL_SCORE);
}

#[test]
fn sibling_substage_scores_just_below_exact_match() {
    let mut patient = patient();
    patient.disease.stage = "IIIA".to_string();

    let score = scoring::stage(&patient, &protocol("carbo-pem"));

    assert!((score.score - 0.9).abs() < TOLERANCE);
}

#[test]
fn wildcard_stage_accepts_everything() {
    let mut protocol = protocol("carbo-pem");
    protocol.eligibility.stages = vec!["Any".to_string()];
    let mut patient = patient();
    patient.disease.stage = "I".to_string();

    assert_eq!(scoring::stage(&patient, &protocol).score, 1.0);
}

#[test]
fn weakest_organ_system_dominates() {
    let mut patient = patient();
    patient.laboratory.liver.total_bilirubin = Some(1.8);

    let score = scoring::organ_function(&patient, &protocol("carbo-pem"));

    assert_eq!(score.score, 0.5);
    assert!(score.explanation.contains("hepatic"));
}

#[test]
fn progression_on_same_protocol_is_heavily_penalised() {
    let mut patient = patient();
    let mut prior = exposure(
        "carbo-pem",
        ResponseCategory::ProgressiveDisease,
        &["Carboplatin", "Pemetrexed"],
    );
    patient.treatment_history.push(prior.clone());
    let protocol = protocol("carbo-pem");

    assert!((scoring::treatment_history(&patient, &protocol).score - 0.2).abs() < TOLERANCE);

    prior.toxicities.push(Toxicity {
        term: "febrile neutropenia".to_string(),
        grade: 4,
    });
    patient.treatment_history = vec![prior];
    assert!((scoring::treatment_history(&patient, &protocol).score - 0.17).abs() < TOLERANCE);
}

#[test]
fn cross_resistance_and_floor() {
    let mut patient = patient();
    patient.treatment_history.push(exposure(
        "cis-pem",
        ResponseCategory::ProgressiveDisease,
        &["Cisplatin", "pemetrexed"],
    ));
    let protocol = protocol("carbo-pem");

    assert!((scoring::treatment_history(&patient, &protocol).score - 0.8).abs() < TOLERANCE);

    for _ in 0..3 {
        patient.treatment_history.push(exposure(
            "carbo-pem",
            ResponseCategory::ProgressiveDisease,
            &[],
        ));
    }
    assert_eq!(scoring::treatment_history(&patient, &protocol).score, 0.1);
}

#[test]
fn age_penalties_are_harsher_below_minimum() {
    let mut protocol = protocol("carbo-pem");
    protocol.eligibility.age = AgeRange::new(Some(18), Some(75)).expect("valid");
    let mut patient = patient();

    patient.demographics.age = 16;
    let below = scoring::age(&patient, &protocol).score;
    patient.demographics.age = 77;
    let above = scoring::age(&patient, &protocol).score;

    assert!((below - 0.6).abs() < TOLERANCE);
    assert!((above - 0.9).abs() < TOLERANCE);
    assert!(below < above);
}

#[test]
fn contraindication_penalty_is_capped() {
    let penalty = MatchingConfig::default().contraindication_penalty;

    assert!((scoring::contraindication_penalty(2, &penalty) - 0.6).abs() < TOLERANCE);
    assert_eq!(scoring::contraindication_penalty(5, &penalty), 1.0);
}

#[test]
fn breakdown_reconstructs_reported_total() {
    let config = MatchingConfig::default();
    let mut patient = patient();
    patient.performance.ecog = ecog(2);
    patient.demographics.age = 80;
    let mut protocol = protocol("carbo-pem");
    protocol.evidence_level = EvidenceLevel::C;
    protocol.eligibility.age = AgeRange::new(Some(18), Some(75)).expect("valid");

    let breakdown = score_breakdown(&patient, &protocol, &config, &config.weights, 1);
    let rebuilt = (breakdown.weighted_sum() - breakdown.contraindication_penalty
        + breakdown.evidence_bonus)
        .clamp(0.0, 1.0);

    assert!((rebuilt - breakdown.total_weighted_score).abs() < TOLERANCE);
    assert!((breakdown.contraindication_penalty - 0.3).abs() < TOLERANCE);
    assert_eq!(breakdown.evidence_bonus, 0.015);
}

#[test]
fn scores_are_deterministic() {
    let config = MatchingConfig::default();
    let patient = patient();
    let protocol = protocol_requiring("osimertinib", "EGFR", BiomarkerStatus::Positive);

    let first = calculate_match_score(&patient, &protocol, &config);
    let second = calculate_match_score(&patient, &protocol, &config);

    assert_eq!(first.to_bits(), second.to_bits());
}
