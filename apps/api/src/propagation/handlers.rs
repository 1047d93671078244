//! Axum route handlers for record mutations and model state.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::career::{CareerGoal, CareerGoalUpdate};
use crate::models::learning::UserProgress;
use crate::models::skill::UserSkill;
use crate::propagation::mutations::{
    self, CareerGoalInput, ProgressInput, SkillLevelInput,
};
use crate::propagation::propagator::{LearningPathView, Snapshot};
use crate::propagation::table::ModelStates;
use crate::state::AppState;

/// PUT /api/v1/users/:user_id/skills/:skill_id
pub async fn handle_put_skill(
    State(state): State<AppState>,
    Path((user_id, skill_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<SkillLevelInput>,
) -> Result<Json<UserSkill>, AppError> {
    let saved = mutations::update_skill_level(
        state.store.as_ref(),
        &state.propagator,
        user_id,
        skill_id,
        input,
    )
    .await?;
    Ok(Json(saved))
}

/// POST /api/v1/users/:user_id/career-goals
pub async fn handle_create_goal(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(input): Json<CareerGoalInput>,
) -> Result<(StatusCode, Json<CareerGoal>), AppError> {
    let goal =
        mutations::set_target_role(state.store.as_ref(), &state.propagator, user_id, input)
            .await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

/// PATCH /api/v1/users/:user_id/career-goals/:goal_id
pub async fn handle_update_goal(
    State(state): State<AppState>,
    Path((user_id, goal_id)): Path<(Uuid, Uuid)>,
    Json(update): Json<CareerGoalUpdate>,
) -> Result<Json<CareerGoal>, AppError> {
    let goal = mutations::update_career_goal(
        state.store.as_ref(),
        &state.propagator,
        user_id,
        goal_id,
        update,
    )
    .await?;
    Ok(Json(goal))
}

/// PUT /api/v1/users/:user_id/progress/:resource_id
pub async fn handle_put_progress(
    State(state): State<AppState>,
    Path((user_id, resource_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<ProgressInput>,
) -> Result<Json<UserProgress>, AppError> {
    let saved = mutations::record_progress(
        state.store.as_ref(),
        &state.propagator,
        user_id,
        resource_id,
        input,
    )
    .await?;
    Ok(Json(saved))
}

/// DELETE /api/v1/users/:user_id/progress/:resource_id
pub async fn handle_delete_progress(
    State(state): State<AppState>,
    Path((user_id, resource_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    mutations::remove_progress(
        state.store.as_ref(),
        &state.propagator,
        user_id,
        resource_id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/users/:user_id/learning-path/regenerate
///
/// Waits for the new path; bounded by the advisor timeout.
pub async fn handle_regenerate_path(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Snapshot<LearningPathView>>, AppError> {
    Ok(Json(
        mutations::regenerate_learning_path(&state.propagator, user_id).await?,
    ))
}

/// GET /api/v1/users/:user_id/models
pub async fn handle_get_model_states(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Json<ModelStates> {
    Json(state.propagator.model_states(user_id))
}
