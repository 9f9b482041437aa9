use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde_json::Value;

use crate::app::AppState;
use crate::auth::Actor;
use crate::middleware::{ApiResponse, ApiResult};
use crate::model::{BoardsAndBlocks, DeleteBoardsAndBlocks, PatchBoardsAndBlocks};

/// POST /api/v1/boards-and-blocks - create boards and their blocks at once
pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<BoardsAndBlocks>, JsonRejection>,
) -> ApiResult<BoardsAndBlocks> {
    let Json(bundle) = body?;
    let created = state.services.boards_and_blocks.create(bundle, &actor).await?;
    Ok(ApiResponse::success(created))
}

/// PATCH /api/v1/boards-and-blocks - patch boards and blocks at once
pub async fn patch(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<PatchBoardsAndBlocks>, JsonRejection>,
) -> ApiResult<BoardsAndBlocks> {
    let Json(patches) = body?;
    let patched = state.services.boards_and_blocks.patch(patches, &actor).await?;
    Ok(ApiResponse::success(patched))
}

/// DELETE /api/v1/boards-and-blocks - delete boards and blocks at once
pub async fn delete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<DeleteBoardsAndBlocks>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(delete) = body?;
    state.services.boards_and_blocks.delete(delete, &actor).await?;
    Ok(ApiResponse::empty())
}
