use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::domain::{PatientProfile, ProtocolId};
use super::eligibility::EligibilityAssessment;
use super::engine::{MatchingEngine, MatchingRequest, MatchingResult};
use super::repository::ProtocolRepository;
use crate::config::CriterionWeights;
use crate::error::AppError;

/// Body for the single-protocol endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolEvaluationRequest {
    pub patient: PatientProfile,
    pub protocol_id: ProtocolId,
    #[serde(default)]
    pub weights: Option<CriterionWeights>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchScoreView {
    pub protocol_id: ProtocolId,
    pub match_score: f64,
}

/// Router builder exposing the matching engine over HTTP.
pub fn matching_router<R>(engine: Arc<MatchingEngine<R>>) -> Router
where
    R: ProtocolRepository + 'static,
{
    Router::new()
        .route("/api/v1/matching/protocols", post(match_handler::<R>))
        .route("/api/v1/matching/eligibility", post(eligibility_handler::<R>))
        .route("/api/v1/matching/score", post(score_handler::<R>))
        .route("/api/v1/matching/cache", delete(clear_cache_handler::<R>))
        .with_state(engine)
}

pub(crate) async fn match_handler<R>(
    State(engine): State<Arc<MatchingEngine<R>>>,
    Json(request): Json<MatchingRequest>,
) -> Result<Json<Vec<MatchingResult>>, AppError>
where
    R: ProtocolRepository + 'static,
{
    let results = engine.find_matching_protocols(&request).await?;
    Ok(Json(results))
}

pub(crate) async fn eligibility_handler<R>(
    State(engine): State<Arc<MatchingEngine<R>>>,
    Json(request): Json<ProtocolEvaluationRequest>,
) -> Result<Json<EligibilityAssessment>, AppError>
where
    R: ProtocolRepository + 'static,
{
    let protocol = engine.fetch_protocol(&request.protocol_id).await?;
    Ok(Json(engine.assess_eligibility(&request.patient, &protocol)))
}

pub(crate) async fn score_handler<R>(
    State(engine): State<Arc<MatchingEngine<R>>>,
    Json(request): Json<ProtocolEvaluationRequest>,
) -> Result<Json<MatchScoreView>, AppError>
where
    R: ProtocolRepository + 'static,
{
    let protocol = engine.fetch_protocol(&request.protocol_id).await?;
    let match_score =
        engine.calculate_match_score(&request.patient, &protocol, request.weights.as_ref())?;
    Ok(Json(MatchScoreView {
        protocol_id: protocol.id,
        match_score,
    }))
}

pub(crate) async fn clear_cache_handler<R>(
    State(engine): State<Arc<MatchingEngine<R>>>,
) -> StatusCode
where
    R: ProtocolRepository + 'static,
{
    engine.clear_cache();
    StatusCode::NO_CONTENT
}
