//! Protocol matching and eligibility scoring.
//!
//! Scoring, eligibility, contraindication detection and classification are pure functions
//! over a patient/protocol pair. [`MatchingEngine`] composes them with a
//! [`ProtocolRepository`] and a TTL-cached catalog to rank candidate protocols.

pub mod cache;
pub mod classification;
pub mod contraindications;
pub mod domain;
pub mod eligibility;
pub mod engine;
pub mod repository;
pub mod router;
pub mod scoring;

#[cfg(test)]
mod tests;

pub use cache::TtlCache;
pub use classification::{
    assess_safety, classify_confidence, classify_eligibility, classify_risk, ConfidenceLabel,
    EligibilityStatus, MonitoringIntensity, RiskLevel, SafetyAssessment,
};
pub use contraindications::{detect_contraindications, ContraindicationResult};
pub use eligibility::{
    assess_eligibility, EligibilityAssessment, EligibilityCriterion, Violation,
    ViolationSeverity, Warning, WarningCategory,
};
pub use engine::{
    calculate_match_score, evaluate, MatchingEngine, MatchingError, MatchingRequest,
    MatchingResult,
};
pub use repository::{protocol_matches_query, ProtocolRepository, RepositoryError};
pub use router::{matching_router, MatchScoreView, ProtocolEvaluationRequest};
pub use scoring::{Criterion, CriterionScore, MatchScoreBreakdown, NEUTRAL_SCORE};
