use std::cmp::Ordering;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::cache::TtlCache;
use super::classification::{
    assess_safety, classify_confidence, classify_eligibility, ConfidenceLabel, EligibilityStatus,
    SafetyAssessment,
};
use super::contraindications::{detect_contraindications, ContraindicationResult};
use super::eligibility::{assess_eligibility, EligibilityAssessment};
use super::domain::{
    EvidenceLevel, PatientProfile, ProtocolId, ProtocolStatus, TreatmentLine, TreatmentProtocol,
};
use super::repository::{ProtocolRepository, RepositoryError};
use super::scoring::{organ::assess_organ_systems, score_breakdown, MatchScoreBreakdown};
use crate::config::{ConfigError, CriterionWeights, MatchingConfig};

const DEFAULT_MAX_RESULTS: usize = 10;

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

/// Patient plus ranking filters for one matching run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingRequest {
    pub patient: PatientProfile,
    #[serde(default)]
    pub treatment_line: Option<TreatmentLine>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub include_experimental: bool,
    #[serde(default)]
    pub include_inactive: bool,
    #[serde(default)]
    pub minimum_evidence_level: Option<EvidenceLevel>,
    /// Overrides the configured `minimum_match_score` for this request.
    #[serde(default)]
    pub minimum_score: Option<f64>,
}

impl MatchingRequest {
    pub fn new(patient: PatientProfile) -> Self {
        Self {
            patient,
            treatment_line: None,
            max_results: DEFAULT_MAX_RESULTS,
            include_experimental: false,
            include_inactive: false,
            minimum_evidence_level: None,
            minimum_score: None,
        }
    }

    fn validate(&self) -> Result<(), MatchingError> {
        if self.patient.disease.cancer_type_id.trim().is_empty() {
            return Err(MatchingError::InvalidRequest(
                "patient has no cancer type".to_string(),
            ));
        }
        if self.max_results == 0 {
            return Err(MatchingError::InvalidRequest(
                "max_results must be at least 1".to_string(),
            ));
        }
        if let Some(score) = self.minimum_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(MatchingError::InvalidRequest(format!(
                    "minimum_score must lie in [0, 1] (found {score})"
                )));
            }
        }
        Ok(())
    }
}

/// Evaluation of one protocol for one patient. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingResult {
    pub protocol_id: ProtocolId,
    pub protocol_name: String,
    pub protocol_code: String,
    pub evidence_level: EvidenceLevel,
    pub match_score: f64,
    pub breakdown: MatchScoreBreakdown,
    pub eligibility: EligibilityAssessment,
    pub eligibility_status: EligibilityStatus,
    pub contraindications: Vec<ContraindicationResult>,
    pub safety: SafetyAssessment,
    pub confidence: ConfidenceLabel,
    pub rationale: String,
}

/// Error raised by the matching engine.
#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error("invalid matching request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("protocol {0} not found")]
    ProtocolNotFound(ProtocolId),
    #[error("invalid matching configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("protocol evaluation failed: {0}")]
    Evaluation(String),
}

/// Weighted match score for a patient/protocol pair under an already validated config.
pub fn calculate_match_score(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
    config: &MatchingConfig,
) -> f64 {
    let contraindications = detect_contraindications(patient, protocol);
    score_breakdown(
        patient,
        protocol,
        config,
        &config.weights,
        contraindications.len(),
    )
    .total_weighted_score
}

/// Runs every scorer, the eligibility assessor, the contraindication detector and the
/// classifiers for one pair.
pub fn evaluate(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
    config: &MatchingConfig,
) -> MatchingResult {
    let contraindications = detect_contraindications(patient, protocol);
    let breakdown = score_breakdown(
        patient,
        protocol,
        config,
        &config.weights,
        contraindications.len(),
    );
    let score = breakdown.total_weighted_score;
    let eligibility = assess_eligibility(patient, protocol);
    let eligibility_status =
        classify_eligibility(score, &eligibility, &contraindications, &config.thresholds);
    let organ_systems = assess_organ_systems(patient, &protocol.eligibility.organ_function);
    let safety = assess_safety(
        breakdown.organ_function.score,
        &organ_systems,
        &contraindications,
        &config.thresholds,
    );
    let confidence = classify_confidence(score, &contraindications, &config.thresholds);
    let rationale = rationale(&breakdown, eligibility_status, &contraindications);

    MatchingResult {
        protocol_id: protocol.id.clone(),
        protocol_name: protocol.name.clone(),
        protocol_code: protocol.code.clone(),
        evidence_level: protocol.evidence_level,
        match_score: score,
        breakdown,
        eligibility,
        eligibility_status,
        contraindications,
        safety,
        confidence,
        rationale,
    }
}

fn rationale(
    breakdown: &MatchScoreBreakdown,
    status: EligibilityStatus,
    contraindications: &[ContraindicationResult],
) -> String {
    let strongest = breakdown.strongest();
    let weakest = breakdown.weakest();
    let mut text = format!(
        "{} at {:.2}: strongest criterion {} ({:.2}), weakest {} ({:.2}: {})",
        status.label(),
        breakdown.total_weighted_score,
        strongest.criterion.label(),
        strongest.score,
        weakest.criterion.label(),
        weakest.score,
        weakest.explanation,
    );
    if !contraindications.is_empty() {
        text.push_str(&format!(
            "; {} contraindication(s) detected",
            contraindications.len()
        ));
    }
    text
}

/// Descending score, then stronger evidence, then name and id.
fn rank(left: &MatchingResult, right: &MatchingResult) -> Ordering {
    right
        .match_score
        .total_cmp(&left.match_score)
        .then(left.evidence_level.cmp(&right.evidence_level))
        .then_with(|| left.protocol_name.cmp(&right.protocol_name))
        .then_with(|| left.protocol_id.cmp(&right.protocol_id))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CatalogKey {
    cancer_type_id: String,
    treatment_line: Option<TreatmentLine>,
    include_inactive: bool,
}

/// Ranks repository protocols for a patient, caching catalog lookups per engine instance.
pub struct MatchingEngine<R> {
    repository: Arc<R>,
    config: Arc<MatchingConfig>,
    cache: TtlCache<CatalogKey, Arc<Vec<TreatmentProtocol>>>,
}

impl<R> MatchingEngine<R>
where
    R: ProtocolRepository + 'static,
{
    /// Rejects invalid configuration up front.
    pub fn new(repository: Arc<R>, config: MatchingConfig) -> Result<Self, MatchingError> {
        config.validate()?;
        Ok(Self {
            repository,
            config: Arc::new(config),
            cache: TtlCache::new(),
        })
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub async fn find_matching_protocols(
        &self,
        request: &MatchingRequest,
    ) -> Result<Vec<MatchingResult>, MatchingError> {
        request.validate()?;
        let cancer_type_id = request.patient.disease.cancer_type_id.trim();
        let treatment_line = request.treatment_line;
        let include_inactive = request.include_inactive;
        let key = CatalogKey {
            cancer_type_id: cancer_type_id.to_ascii_lowercase(),
            treatment_line,
            include_inactive,
        };

        let catalog = self
            .cache
            .get_or_refresh(key, self.config.cache_ttl(), move || async move {
                let protocols = self
                    .with_retry("get_protocols_for_cancer", move || {
                        self.repository.get_protocols_for_cancer(
                            cancer_type_id,
                            treatment_line,
                            include_inactive,
                        )
                    })
                    .await?;
                debug!(
                    cancer_type = cancer_type_id,
                    count = protocols.len(),
                    "fetched candidate protocols"
                );
                Ok::<_, RepositoryError>(Arc::new(protocols))
            })
            .await?;

        let patient = Arc::new(request.patient.clone());
        let mut tasks = JoinSet::new();
        for protocol in catalog.iter().filter(|protocol| match protocol.status {
            ProtocolStatus::Active => true,
            ProtocolStatus::Experimental => request.include_experimental,
            ProtocolStatus::Inactive => request.include_inactive,
        }) {
            let patient = Arc::clone(&patient);
            let config = Arc::clone(&self.config);
            let protocol = protocol.clone();
            tasks.spawn(async move { evaluate(&patient, &protocol, &config) });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            results.push(joined.map_err(|error| MatchingError::Evaluation(error.to_string()))?);
        }

        let evaluated = results.len();
        match request.minimum_evidence_level {
            Some(floor) => results.retain(|result| result.evidence_level.meets(floor)),
            None => {
                let minimum = request
                    .minimum_score
                    .unwrap_or(self.config.thresholds.minimum_match_score);
                results.retain(|result| result.match_score >= minimum);
            }
        }
        results.sort_by(rank);
        results.truncate(request.max_results);

        info!(
            patient_id = %request.patient.patient_id.0,
            cancer_type = cancer_type_id,
            evaluated,
            returned = results.len(),
            "protocol matching complete"
        );
        Ok(results)
    }

    pub fn assess_eligibility(
        &self,
        patient: &PatientProfile,
        protocol: &TreatmentProtocol,
    ) -> EligibilityAssessment {
        assess_eligibility(patient, protocol)
    }

    /// Scores with the engine weights, or with `weights` when given (validated first).
    pub fn calculate_match_score(
        &self,
        patient: &PatientProfile,
        protocol: &TreatmentProtocol,
        weights: Option<&CriterionWeights>,
    ) -> Result<f64, MatchingError> {
        let weights = match weights {
            Some(weights) => {
                weights.validate()?;
                weights
            }
            None => &self.config.weights,
        };
        let contraindications = detect_contraindications(patient, protocol);
        Ok(score_breakdown(
            patient,
            protocol,
            &self.config,
            weights,
            contraindications.len(),
        )
        .total_weighted_score)
    }

    pub fn evaluate(
        &self,
        patient: &PatientProfile,
        protocol: &TreatmentProtocol,
    ) -> MatchingResult {
        evaluate(patient, protocol, &self.config)
    }

    /// Looks a protocol up by id through the repository, with the fetch timeout and retry.
    pub async fn fetch_protocol(
        &self,
        id: &ProtocolId,
    ) -> Result<TreatmentProtocol, MatchingError> {
        self.with_retry("get_protocol_by_id", move || self.repository.get_protocol_by_id(id))
            .await?
            .ok_or_else(|| MatchingError::ProtocolNotFound(id.clone()))
    }

    pub async fn evaluate_protocol(
        &self,
        patient: &PatientProfile,
        protocol_id: &ProtocolId,
    ) -> Result<MatchingResult, MatchingError> {
        let protocol = self.fetch_protocol(protocol_id).await?;
        Ok(self.evaluate(patient, &protocol))
    }

    pub fn clear_cache(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        info!(dropped, "protocol cache cleared");
    }

    pub fn cached_catalogs(&self) -> usize {
        self.cache.len()
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, RepositoryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let timeout = self.config.fetch_timeout();
        let mut attempt: u8 = 0;
        loop {
            let outcome = match tokio::time::timeout(timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(RepositoryError::Timeout(timeout)),
            };
            match outcome {
                Err(error) if error.is_transient() && attempt < self.config.fetch_retries => {
                    attempt += 1;
                    warn!(operation, attempt, %error, "transient repository failure; retrying");
                }
                other => return other,
            }
        }
    }
}
