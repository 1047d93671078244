pub mod health;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::dashboard::handlers as reads;
use crate::propagation::handlers as writes;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Read models
        .route(
            "/api/v1/users/:user_id/dashboard",
            get(reads::handle_get_dashboard),
        )
        .route(
            "/api/v1/users/:user_id/skill-gaps",
            get(reads::handle_get_skill_gaps),
        )
        .route(
            "/api/v1/users/:user_id/skill-gaps/analysis",
            get(reads::handle_get_gap_analysis),
        )
        .route(
            "/api/v1/users/:user_id/learning-path",
            get(reads::handle_get_learning_path),
        )
        .route(
            "/api/v1/users/:user_id/models",
            get(writes::handle_get_model_states),
        )
        // Mutations
        .route(
            "/api/v1/users/:user_id/learning-path/regenerate",
            post(writes::handle_regenerate_path),
        )
        .route(
            "/api/v1/users/:user_id/skills/:skill_id",
            put(writes::handle_put_skill),
        )
        .route(
            "/api/v1/users/:user_id/career-goals",
            post(writes::handle_create_goal),
        )
        .route(
            "/api/v1/users/:user_id/career-goals/:goal_id",
            patch(writes::handle_update_goal),
        )
        .route(
            "/api/v1/users/:user_id/progress/:resource_id",
            put(writes::handle_put_progress).delete(writes::handle_delete_progress),
        )
        .with_state(state)
}
