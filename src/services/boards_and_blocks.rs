use std::collections::HashSet;

use tracing::debug;

use super::resolver;
use super::stamp::stamp_all_new;
use super::{ServiceDeps, ServiceError, ServiceResult};
use crate::audit::AuditLevel;
use crate::auth::Actor;
use crate::model::{BoardType, BoardsAndBlocks, DeleteBoardsAndBlocks, PatchBoardsAndBlocks};
use crate::permissions::Permission;

/// Creates, patches and deletes boards together with their blocks. Every
/// operation checks the whole bundle before the store sees any of it.
#[derive(Clone)]
pub struct BoardsAndBlocksService {
    deps: ServiceDeps,
}

impl BoardsAndBlocksService {
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    pub async fn create(&self, bundle: BoardsAndBlocks, actor: &Actor) -> ServiceResult<BoardsAndBlocks> {
        let mut audit = self
            .deps
            .audit_scope("createBoardsAndBlocks", AuditLevel::Modify, actor);
        audit.add_meta("boardsCount", bundle.boards.len());
        audit.add_meta("blocksCount", bundle.blocks.len());

        if bundle.boards.is_empty() || bundle.blocks.is_empty() {
            return Err(ServiceError::validation("at least one board and one block are required"));
        }
        for block in &bundle.blocks {
            block.validate_new()?;
        }

        let team_id = bundle.boards[0].team_id.clone();
        for board in &bundle.boards {
            board.validate()?;
        }
        for board in bundle.boards.iter().skip(1) {
            if board.team_id != team_id {
                return Err(ServiceError::validation("cannot create boards for multiple teams"));
            }
            if board.id.is_empty() {
                return Err(ServiceError::validation("boards need an ID to be referenced from the blocks"));
            }
        }
        audit.add_meta("teamID", &team_id);

        let mut resolved = resolver::resolve(bundle, self.deps.ids.as_ref())?;
        audit.add_meta("boardIDs", resolved.boards.iter().map(|b| b.id.as_str()).collect::<Vec<_>>());
        audit.add_meta("blockIDs", resolved.blocks.iter().map(|b| b.id.as_str()).collect::<Vec<_>>());

        let board_ids: HashSet<&str> = resolved.boards.iter().map(|board| board.id.as_str()).collect();
        if let Some(block) = resolved
            .blocks
            .iter()
            .find(|block| !board_ids.contains(block.board_id.as_str()))
        {
            return Err(ServiceError::validation(format!(
                "block {} does not belong to any board of the request",
                block.id
            )));
        }

        let has_public = resolved.boards.iter().any(|b| b.board_type == BoardType::Open);
        let has_private = resolved.boards.iter().any(|b| b.board_type == BoardType::Private);
        if has_public {
            self.deps
                .require_team_permission(actor, &team_id, Permission::CreatePublicChannel)
                .await?;
        }
        if has_private {
            self.deps
                .require_team_permission(actor, &team_id, Permission::CreatePrivateChannel)
                .await?;
        }

        let stamp = self.deps.stamp(actor);
        stamp_all_new(resolved.boards.iter_mut(), &stamp);
        stamp_all_new(resolved.blocks.iter_mut(), &stamp);

        self.deps.store.insert_boards_and_blocks(&resolved).await?;

        debug!(
            "created {} boards and {} blocks for team {}",
            resolved.boards.len(),
            resolved.blocks.len(),
            team_id
        );
        audit.success();
        Ok(resolved)
    }

    pub async fn patch(&self, patches: PatchBoardsAndBlocks, actor: &Actor) -> ServiceResult<BoardsAndBlocks> {
        let mut audit = self
            .deps
            .audit_scope("patchBoardsAndBlocks", AuditLevel::Modify, actor);
        audit.add_meta("boardsCount", patches.board_ids.len());
        audit.add_meta("blocksCount", patches.block_ids.len());
        audit.add_meta("boardIDs", &patches.board_ids);
        audit.add_meta("blockIDs", &patches.block_ids);

        patches.validate()?;

        let mut team_id: Option<String> = None;
        for (board_id, patch) in patches.boards() {
            self.deps
                .require_board_permission(actor, board_id, Permission::ManageBoardProperties)
                .await?;
            if patch.board_type.is_some() {
                self.deps
                    .require_board_permission(actor, board_id, Permission::ManageBoardType)
                    .await?;
            }

            let board = self
                .deps
                .store
                .get_board(board_id)
                .await?
                .ok_or_else(|| ServiceError::validation(format!("board {} not found", board_id)))?;
            let team = team_id.get_or_insert_with(|| board.team_id.clone());
            if *team != board.team_id {
                return Err(ServiceError::validation("mismatched team ID"));
            }
        }

        let board_ids: HashSet<&str> = patches.board_ids.iter().map(String::as_str).collect();
        for block_id in &patches.block_ids {
            let block = self
                .deps
                .store
                .get_block(block_id)
                .await?
                .ok_or_else(|| ServiceError::validation(format!("block {} not found", block_id)))?;
            if !board_ids.contains(block.board_id.as_str()) {
                return Err(ServiceError::validation(format!(
                    "block {} does not belong to any of the patched boards",
                    block_id
                )));
            }
        }
        audit.add_meta("teamID", &team_id);

        let stamp = self.deps.stamp(actor);
        let patched = self.deps.store.patch_boards_and_blocks(&patches, &stamp).await?;

        debug!(
            "patched {} boards and {} blocks",
            patched.boards.len(),
            patched.blocks.len()
        );
        audit.success();
        Ok(patched)
    }

    pub async fn delete(&self, delete: DeleteBoardsAndBlocks, actor: &Actor) -> ServiceResult<()> {
        let mut audit = self
            .deps
            .audit_scope("deleteBoardsAndBlocks", AuditLevel::Modify, actor);
        audit.add_meta("boards", &delete.boards);
        audit.add_meta("blocks", &delete.blocks);

        let mut team_id: Option<String> = None;
        for board_id in &delete.boards {
            let board = self
                .deps
                .store
                .get_board(board_id)
                .await?
                .ok_or_else(|| ServiceError::validation(format!("board {} not found", board_id)))?;
            let team = team_id.get_or_insert_with(|| board.team_id.clone());
            if *team != board.team_id {
                return Err(ServiceError::validation("all boards should be on the same team"));
            }
            self.deps
                .require_board_permission(actor, board_id, Permission::DeleteBoard)
                .await?;
        }

        delete.validate()?;

        // Blocks of the deleted boards go with them. Blocks of other boards of
        // the same team are removed on their own and need card rights there.
        let board_ids: HashSet<&str> = delete.boards.iter().map(String::as_str).collect();
        for block_id in &delete.blocks {
            let block = self
                .deps
                .store
                .get_block(block_id)
                .await?
                .ok_or_else(|| ServiceError::validation(format!("block {} not found", block_id)))?;
            let block_board = block.board_id.as_str();
            if board_ids.contains(block_board) {
                continue;
            }

            let board = self
                .deps
                .store
                .get_board(block_board)
                .await?
                .ok_or_else(|| ServiceError::validation(format!("board {} not found", block_board)))?;
            if team_id.as_deref() != Some(board.team_id.as_str()) {
                return Err(ServiceError::validation(format!(
                    "block {} belongs to a board of another team",
                    block_id
                )));
            }
            self.deps
                .require_board_permission(actor, block_board, Permission::ManageBoardCards)
                .await?;
        }
        audit.add_meta("teamID", &team_id);

        self.deps.store.delete_boards_and_blocks(&delete).await?;

        debug!("deleted {} boards and {} blocks", delete.boards.len(), delete.blocks.len());
        audit.success();
        Ok(())
    }
}
