//! Handlers for server filesystem browsing and geodatabase enumeration.

use axum::extract::State;
use axum::Json;
use geohub_core::browse::{self, BrowseFilter, BrowseListing};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BrowseRequest {
    /// Directory to list; empty lists the filesystem roots.
    #[serde(default)]
    pub path: String,
    #[serde(default, rename = "type")]
    pub filter: BrowseFilter,
}

#[derive(Debug, Deserialize)]
pub struct FeatureClassRequest {
    #[serde(default)]
    pub path: String,
}

/// POST /api/v1/browse
pub async fn browse_path(
    Json(input): Json<BrowseRequest>,
) -> AppResult<Json<DataResponse<BrowseListing>>> {
    let listing = browse::browse(&input.path, input.filter).await?;
    Ok(Json(DataResponse { data: listing }))
}

/// POST /api/v1/feature-classes
///
/// Runs the enumeration script against a geodatabase and returns its JSON
/// output unchanged.
pub async fn list_feature_classes(
    State(state): State<AppState>,
    Json(input): Json<FeatureClassRequest>,
) -> AppResult<Json<DataResponse<Value>>> {
    let container = input.path.trim();
    if container.is_empty() {
        return Err(AppError::BadRequest("path is required".to_string()));
    }

    let listing =
        browse::list_feature_classes(&state.catalog, container, state.config.list_timeout())
            .await?;
    Ok(Json(DataResponse { data: listing }))
}
