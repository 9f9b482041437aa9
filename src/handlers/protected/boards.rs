use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::Value;

use crate::app::AppState;
use crate::auth::Actor;
use crate::middleware::{ApiResponse, ApiResult};
use crate::model::{Board, BoardPatch};

/// GET /api/v1/teams/:teamID/boards
pub async fn team_boards_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(team_id): Path<String>,
) -> ApiResult<Vec<Board>> {
    let boards = state.services.boards.get_boards_for_team(&team_id, &actor).await?;
    Ok(ApiResponse::success(boards))
}

/// POST /api/v1/boards
pub async fn board_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<Board>, JsonRejection>,
) -> ApiResult<Board> {
    let Json(board) = body?;
    let board = state.services.boards.create_board(board, &actor).await?;
    Ok(ApiResponse::success(board))
}

/// GET /api/v1/boards/:boardID
pub async fn board_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(board_id): Path<String>,
) -> ApiResult<Board> {
    let board = state.services.boards.get_board(&board_id, &actor).await?;
    Ok(ApiResponse::success(board))
}

/// PATCH /api/v1/boards/:boardID
pub async fn board_patch(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(board_id): Path<String>,
    body: Result<Json<BoardPatch>, JsonRejection>,
) -> ApiResult<Board> {
    let Json(patch) = body?;
    let board = state.services.boards.patch_board(&board_id, patch, &actor).await?;
    Ok(ApiResponse::success(board))
}

/// DELETE /api/v1/boards/:boardID
pub async fn board_delete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(board_id): Path<String>,
) -> ApiResult<Value> {
    state.services.boards.delete_board(&board_id, &actor).await?;
    Ok(ApiResponse::empty())
}
