//! Axum route handlers for the read models.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::advisor::GapAnalysis;
use crate::dashboard::aggregator::DashboardView;
use crate::errors::AppError;
use crate::propagation::propagator::{LearningPathView, SkillGapView, Snapshot};
use crate::state::AppState;

/// GET /api/v1/users/:user_id/dashboard
pub async fn handle_get_dashboard(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Snapshot<DashboardView>>, AppError> {
    Ok(Json(state.propagator.dashboard(user_id).await?))
}

/// GET /api/v1/users/:user_id/skill-gaps
pub async fn handle_get_skill_gaps(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Snapshot<SkillGapView>>, AppError> {
    Ok(Json(state.propagator.skill_gaps(user_id).await?))
}

/// GET /api/v1/users/:user_id/skill-gaps/analysis
///
/// Falls back to a templated analysis when the advisor is slow or down.
pub async fn handle_get_gap_analysis(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Snapshot<GapAnalysis>>, AppError> {
    Ok(Json(state.propagator.gap_analysis(user_id).await?))
}

/// GET /api/v1/users/:user_id/learning-path
pub async fn handle_get_learning_path(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Snapshot<LearningPathView>>, AppError> {
    Ok(Json(state.propagator.learning_path(user_id).await?))
}
