//! Stateless helper endpoints used by the dashboard forms.

use axum::routing::post;
use axum::Router;

use crate::handlers::{browse, simulations};
use crate::state::AppState;

/// ```text
/// POST   /simulations       -> run_simulation
/// POST   /browse            -> browse_path
/// POST   /feature-classes   -> list_feature_classes
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/simulations", post(simulations::run_simulation))
        .route("/browse", post(browse::browse_path))
        .route("/feature-classes", post(browse::list_feature_classes))
}
