use std::time::Duration;

use super::common::*;
use crate::config::{CriterionWeights, MatchingConfig};
use crate::matching::classification::EligibilityStatus;
use crate::matching::domain::{
    Allergy, BiomarkerStatus, ConditionSeverity, Contraindication, ContraindicationCategory,
    ContraindicationKind, EvidenceLevel, ProtocolId, ProtocolStatus, TreatmentLine,
};
use crate::matching::engine::{MatchingEngine, MatchingError, MatchingRequest};
use crate::matching::repository::RepositoryError;

fn request() -> MatchingRequest {
    MatchingRequest::new(patient())
}

#[tokio::test]
async fn scenario_d_empty_catalog_is_not_an_error() {
    let (engine, repository) = engine(StubRepository::default());

    let results = engine
        .find_matching_protocols(&request())
        .await
        .expect("empty catalog");

    assert!(results.is_empty());
    assert_eq!(repository.calls(), 1);
}

#[tokio::test]
async fn permanent_repository_failure_is_surfaced_without_retry() {
    let (engine, repository) = engine(
        StubRepository::with_protocols(vec![protocol("carbo-pem")]).failing_with([
            RepositoryError::Backend {
                message: "schema mismatch".to_string(),
            },
        ]),
    );

    let err = engine
        .find_matching_protocols(&request())
        .await
        .expect_err("backend failure");

    assert!(matches!(
        err,
        MatchingError::Repository(RepositoryError::Backend { .. })
    ));
    assert_eq!(repository.calls(), 1);
}

#[tokio::test]
async fn single_transient_failure_is_retried() {
    let (engine, repository) = engine(
        StubRepository::with_protocols(vec![protocol("carbo-pem")])
            .failing_with([RepositoryError::Unavailable("connection reset".to_string())]),
    );

    let results = engine
        .find_matching_protocols(&request())
        .await
        .expect("retry succeeds");

    assert_eq!(results.len(), 1);
    assert_eq!(repository.calls(), 2);
}

#[tokio::test]
async fn retries_are_exhausted_after_one_extra_attempt() {
    let (engine, repository) = engine(
        StubRepository::with_protocols(vec![protocol("carbo-pem")]).failing_with([
            RepositoryError::Unavailable("down".to_string()),
            RepositoryError::Unavailable("still down".to_string()),
        ]),
    );

    let err = engine
        .find_matching_protocols(&request())
        .await
        .expect_err("exhausted");

    assert!(matches!(
        err,
        MatchingError::Repository(RepositoryError::Unavailable(_))
    ));
    assert_eq!(repository.calls(), 2);
    assert_eq!(engine.cached_catalogs(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_repository_times_out() {
    let (engine, repository) = engine(
        StubRepository::with_protocols(vec![protocol("carbo-pem")])
            .with_delay(Duration::from_secs(30)),
    );

    let err = engine
        .find_matching_protocols(&request())
        .await
        .expect_err("timeout");

    assert!(matches!(
        err,
        MatchingError::Repository(RepositoryError::Timeout(_))
    ));
    assert_eq!(repository.calls(), 2);
}

#[tokio::test]
async fn missing_cancer_type_fails_before_repository_access() {
    let (engine, repository) = engine(StubRepository::with_protocols(vec![protocol("carbo-pem")]));
    let mut request = request();
    request.patient.disease.cancer_type_id = "  ".to_string();

    let err = engine
        .find_matching_protocols(&request)
        .await
        .expect_err("invalid");

    assert!(matches!(err, MatchingError::InvalidRequest(_)));
    assert_eq!(repository.calls(), 0);
}

#[tokio::test]
async fn results_are_sorted_and_truncated() {
    let mut weak = protocol_requiring("osimertinib", "EGFR", BiomarkerStatus::Positive);
    weak.name = "Osimertinib".to_string();
    let mut weaker = protocol_requiring("crizotinib", "ROS1", BiomarkerStatus::Positive);
    weaker.name = "Crizotinib".to_string();
    let (engine, _) = engine(StubRepository::with_protocols(vec![
        weaker,
        weak,
        protocol("carbo-pem"),
    ]));
    let mut request = request();
    request.max_results = 2;

    let results = engine
        .find_matching_protocols(&request)
        .await
        .expect("results");

    assert_eq!(results.len(), 2);
    assert!(results
        .windows(2)
        .all(|pair| pair[0].match_score >= pair[1].match_score));
    assert_eq!(results[0].protocol_id, ProtocolId("carbo-pem".to_string()));
    assert_eq!(results[1].protocol_id, ProtocolId("osimertinib".to_string()));
}

#[tokio::test]
async fn equal_scores_break_ties_by_evidence_then_name() {
    let (engine, _) = engine(StubRepository::with_protocols(vec![
        named_protocol("beta", "Beta", EvidenceLevel::B),
        named_protocol("zeta", "Zeta", EvidenceLevel::A),
        named_protocol("alpha", "Alpha", EvidenceLevel::B),
    ]));

    let results = engine
        .find_matching_protocols(&request())
        .await
        .expect("results");

    let names: Vec<&str> = results
        .iter()
        .map(|result| result.protocol_name.as_str())
        .collect();
    assert_eq!(names, vec!["Zeta", "Alpha", "Beta"]);
}

#[tokio::test]
async fn experimental_and_inactive_protocols_need_opt_in() {
    let mut experimental = protocol("trial-arm");
    experimental.status = ProtocolStatus::Experimental;
    let mut retired = protocol("retired");
    retired.status = ProtocolStatus::Inactive;
    let (engine, _) = engine(StubRepository::with_protocols(vec![
        experimental,
        retired,
        protocol("carbo-pem"),
    ]));

    let default_run = engine
        .find_matching_protocols(&request())
        .await
        .expect("results");
    assert_eq!(default_run.len(), 1);

    let mut opted_in = request();
    opted_in.include_experimental = true;
    opted_in.include_inactive = true;
    let widened = engine
        .find_matching_protocols(&opted_in)
        .await
        .expect("results");
    assert_eq!(widened.len(), 3);
}

#[tokio::test]
async fn treatment_line_is_forwarded_to_the_repository() {
    let mut second_line = protocol("docetaxel");
    second_line.line = TreatmentLine::Second;
    let (engine, _) = engine(StubRepository::with_protocols(vec![
        second_line,
        protocol("carbo-pem"),
    ]));
    let mut request = request();
    request.treatment_line = Some(TreatmentLine::Second);

    let results = engine
        .find_matching_protocols(&request)
        .await
        .expect("results");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].protocol_id, ProtocolId("docetaxel".to_string()));
}

#[tokio::test]
async fn request_minimum_score_overrides_configured_floor() {
    let mismatch = protocol_requiring("osimertinib", "EGFR", BiomarkerStatus::Positive);
    let (engine, _) = engine(StubRepository::with_protocols(vec![
        mismatch,
        protocol("carbo-pem"),
    ]));
    let mut request = request();
    request.minimum_score = Some(0.99);

    let results = engine
        .find_matching_protocols(&request)
        .await
        .expect("results");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].protocol_id, ProtocolId("carbo-pem".to_string()));
}

#[tokio::test]
async fn evidence_floor_replaces_score_floor() {
    let mut mismatch = protocol_requiring("osimertinib", "EGFR", BiomarkerStatus::Positive);
    mismatch.evidence_level = EvidenceLevel::B;
    let (engine, _) = engine(StubRepository::with_protocols(vec![
        mismatch,
        named_protocol("case-series", "Case series", EvidenceLevel::D),
    ]));
    let mut request = request();
    request.minimum_score = Some(1.0);
    request.minimum_evidence_level = Some(EvidenceLevel::C);

    let results = engine
        .find_matching_protocols(&request)
        .await
        .expect("results");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].protocol_id, ProtocolId("osimertinib".to_string()));
}

#[tokio::test]
async fn absolute_contraindication_dominates_ranking_output() {
    let mut protocol = protocol("carbo-pem");
    protocol.contraindications.push(Contraindication {
        kind: ContraindicationKind::Absolute,
        category: ContraindicationCategory::Allergy,
        condition: "carboplatin hypersensitivity".to_string(),
        rationale: String::new(),
    });
    let (engine, _) = engine(StubRepository::with_protocols(vec![protocol]));
    let mut request = request();
    request.patient.allergies.push(Allergy {
        substance: "Carboplatin".to_string(),
        severity: ConditionSeverity::Severe,
        reaction: None,
    });

    let results = engine
        .find_matching_protocols(&request)
        .await
        .expect("results");

    assert_eq!(results[0].eligibility_status, EligibilityStatus::Contraindicated);
}

#[tokio::test]
async fn catalog_is_cached_until_cleared() {
    let (engine, repository) = engine(StubRepository::with_protocols(vec![protocol("carbo-pem")]));

    engine.find_matching_protocols(&request()).await.expect("first");
    engine.find_matching_protocols(&request()).await.expect("second");
    assert_eq!(repository.calls(), 1);

    engine.clear_cache();
    engine.find_matching_protocols(&request()).await.expect("third");
    assert_eq!(repository.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn catalog_expires_after_ttl() {
    let (engine, repository) = engine(StubRepository::with_protocols(vec![protocol("carbo-pem")]));

    engine.find_matching_protocols(&request()).await.expect("first");
    tokio::time::advance(Duration::from_secs(299)).await;
    engine.find_matching_protocols(&request()).await.expect("cached");
    assert_eq!(repository.calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    engine.find_matching_protocols(&request()).await.expect("refreshed");
    assert_eq!(repository.calls(), 2);
}

#[tokio::test]
async fn evaluate_protocol_looks_up_by_id() {
    let (engine, _) = engine(StubRepository::with_protocols(vec![protocol("carbo-pem")]));

    let result = engine
        .evaluate_protocol(&patient(), &ProtocolId("carbo-pem".to_string()))
        .await
        .expect("found");
    assert_eq!(result.eligibility_status, EligibilityStatus::Eligible);

    let missing = engine
        .evaluate_protocol(&patient(), &ProtocolId("unknown".to_string()))
        .await
        .expect_err("missing");
    assert!(matches!(missing, MatchingError::ProtocolNotFound(_)));
}

#[test]
fn per_call_weights_are_validated_and_applied() {
    let (engine, _) = engine(StubRepository::default());
    let patient = patient();
    let protocol = protocol_requiring("osimertinib", "EGFR", BiomarkerStatus::Positive);

    let default_score = engine
        .calculate_match_score(&patient, &protocol, None)
        .expect("default weights");
    let biomarker_heavy = CriterionWeights {
        performance_status: 0.1,
        biomarkers: 0.6,
        stage: 0.1,
        organ_function: 0.1,
        treatment_history: 0.05,
        age: 0.05,
    };
    let heavy_score = engine
        .calculate_match_score(&patient, &protocol, Some(&biomarker_heavy))
        .expect("valid weights");
    assert!(heavy_score < default_score);

    let unbalanced = CriterionWeights {
        age: 0.2,
        ..CriterionWeights::default()
    };
    let err = engine
        .calculate_match_score(&patient, &protocol, Some(&unbalanced))
        .expect_err("sum != 1");
    assert!(matches!(err, MatchingError::Config(_)));
}

#[test]
fn engine_rejects_invalid_configuration() {
    let mut config = MatchingConfig::default();
    config.weights.stage = 0.5;

    let result = MatchingEngine::new(
        std::sync::Arc::new(StubRepository::default()),
        config,
    );

    assert!(matches!(result, Err(MatchingError::Config(_))));
}
