use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppState;
use crate::auth::Actor;
use crate::database::BlockQuery;
use crate::middleware::{ApiResponse, ApiResult};
use crate::model::{Block, BlockPatch};

#[derive(Debug, Default, Deserialize)]
pub struct BlocksQuery {
    pub parent_id: Option<String>,
    #[serde(rename = "type")]
    pub block_type: Option<String>,
    pub all: Option<String>,
    pub block_id: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl BlocksQuery {
    fn into_parts(self) -> (BlockQuery, Option<String>) {
        let query = BlockQuery {
            all: self.all.map_or(false, |all| !all.is_empty()),
            parent_id: non_empty(self.parent_id),
            block_type: non_empty(self.block_type),
        };
        (query, non_empty(self.block_id))
    }
}

#[derive(Debug, Deserialize)]
pub struct SubtreeQuery {
    pub l: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub root_id: Option<String>,
}

/// GET /api/v1/boards/:boardID/blocks
pub async fn blocks_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(board_id): Path<String>,
    Query(query): Query<BlocksQuery>,
) -> ApiResult<Vec<Block>> {
    let (query, block_id) = query.into_parts();
    let blocks = state
        .services
        .blocks
        .get_blocks(&board_id, &query, block_id.as_deref(), &actor)
        .await?;
    Ok(ApiResponse::success(blocks))
}

/// POST /api/v1/boards/:boardID/blocks
pub async fn blocks_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(board_id): Path<String>,
    body: Result<Json<Vec<Block>>, JsonRejection>,
) -> ApiResult<Vec<Block>> {
    let Json(blocks) = body?;
    let blocks = state.services.blocks.insert_blocks(&board_id, blocks, &actor).await?;
    Ok(ApiResponse::success(blocks))
}

/// PATCH /api/v1/boards/:boardID/blocks/:blockID
pub async fn block_patch(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((board_id, block_id)): Path<(String, String)>,
    body: Result<Json<BlockPatch>, JsonRejection>,
) -> ApiResult<Block> {
    let Json(patch) = body?;
    let block = state
        .services
        .blocks
        .patch_block(&board_id, &block_id, patch, &actor)
        .await?;
    Ok(ApiResponse::success(block))
}

/// DELETE /api/v1/boards/:boardID/blocks/:blockID
pub async fn block_delete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((board_id, block_id)): Path<(String, String)>,
) -> ApiResult<Value> {
    state.services.blocks.delete_block(&board_id, &block_id, &actor).await?;
    Ok(ApiResponse::empty())
}

/// GET /api/v1/boards/:boardID/blocks/:blockID/subtree?l=2|3
pub async fn subtree_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((board_id, block_id)): Path<(String, String)>,
    Query(query): Query<SubtreeQuery>,
) -> ApiResult<Vec<Block>> {
    let blocks = state
        .services
        .blocks
        .get_subtree(&board_id, &block_id, query.l.as_deref(), &actor)
        .await?;
    Ok(ApiResponse::success(blocks))
}

/// GET /api/v1/boards/:boardID/blocks/export?root_id=
pub async fn export_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(board_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Vec<Block>> {
    let blocks = state
        .services
        .blocks
        .export_blocks(&board_id, query.root_id.as_deref(), &actor)
        .await?;
    Ok(ApiResponse::success(blocks))
}

/// POST /api/v1/boards/:boardID/blocks/import
pub async fn import_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(board_id): Path<String>,
    body: Result<Json<Vec<Block>>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(blocks) = body?;
    state.services.blocks.import_blocks(&board_id, blocks, &actor).await?;
    Ok(ApiResponse::empty())
}
