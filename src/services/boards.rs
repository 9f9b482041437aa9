use tracing::debug;

use super::stamp::Stampable;
use super::{ServiceDeps, ServiceError, ServiceResult};
use crate::audit::AuditLevel;
use crate::auth::Actor;
use crate::model::{Board, BoardPatch, BoardType, BoardsAndBlocks, DeleteBoardsAndBlocks, EntityId, IdKind, PatchBoardsAndBlocks};
use crate::permissions::Permission;

/// Single-board operations.
#[derive(Clone)]
pub struct BoardService {
    deps: ServiceDeps,
}

impl BoardService {
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    pub async fn get_boards_for_team(&self, team_id: &str, actor: &Actor) -> ServiceResult<Vec<Board>> {
        let mut audit = self.deps.audit_scope("getBoards", AuditLevel::Read, actor);
        audit.add_meta("teamID", team_id);

        self.deps
            .require_team_permission(actor, team_id, Permission::ViewTeam)
            .await?;
        let boards = self.deps.store.get_boards_for_team(team_id).await?;

        audit.add_meta("boardsCount", boards.len());
        audit.success();
        Ok(boards)
    }

    pub async fn create_board(&self, mut board: Board, actor: &Actor) -> ServiceResult<Board> {
        let mut audit = self.deps.audit_scope("createBoard", AuditLevel::Modify, actor);
        audit.add_meta("teamID", &board.team_id);

        board.validate()?;
        let permission = match board.board_type {
            BoardType::Open => Permission::CreatePublicChannel,
            BoardType::Private => Permission::CreatePrivateChannel,
        };
        self.deps
            .require_team_permission(actor, &board.team_id, permission)
            .await?;

        board.id = EntityId::assigned(self.deps.ids.new_id(IdKind::Board));
        board.stamp_new(&self.deps.stamp(actor));
        self.deps
            .store
            .insert_boards_and_blocks(&BoardsAndBlocks::new(vec![board.clone()], Vec::new()))
            .await?;

        debug!("created board {} for team {}", board.id, board.team_id);
        audit.add_meta("boardID", board.id.as_str());
        audit.success();
        Ok(board)
    }

    pub async fn get_board(&self, board_id: &str, actor: &Actor) -> ServiceResult<Board> {
        let mut audit = self.deps.audit_scope("getBoard", AuditLevel::Read, actor);
        audit.add_meta("boardID", board_id);

        // A missing board is reported as denied unless the actor could view it
        let board = match self.deps.store.get_board(board_id).await? {
            Some(board) => board,
            None => {
                self.deps
                    .require_board_permission(actor, board_id, Permission::ViewBoard)
                    .await?;
                return Err(ServiceError::not_found(format!("board {} not found", board_id)));
            }
        };
        match board.board_type {
            BoardType::Private => {
                self.deps
                    .require_board_permission(actor, board_id, Permission::ViewBoard)
                    .await?
            }
            BoardType::Open => {
                self.deps
                    .require_team_permission(actor, &board.team_id, Permission::ViewTeam)
                    .await?
            }
        }

        audit.success();
        Ok(board)
    }

    pub async fn patch_board(&self, board_id: &str, patch: BoardPatch, actor: &Actor) -> ServiceResult<Board> {
        let mut audit = self.deps.audit_scope("patchBoard", AuditLevel::Modify, actor);
        audit.add_meta("boardID", board_id);

        patch.validate()?;
        self.deps.existing_board(board_id).await?;
        self.deps
            .require_board_permission(actor, board_id, Permission::ManageBoardProperties)
            .await?;
        if patch.board_type.is_some() {
            self.deps
                .require_board_permission(actor, board_id, Permission::ManageBoardType)
                .await?;
        }

        let patches = PatchBoardsAndBlocks {
            board_ids: vec![board_id.to_string()],
            board_patches: vec![patch],
            ..Default::default()
        };
        let patched = self
            .deps
            .store
            .patch_boards_and_blocks(&patches, &self.deps.stamp(actor))
            .await?;
        let board = patched
            .boards
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::not_found(format!("board {} not found", board_id)))?;

        audit.success();
        Ok(board)
    }

    pub async fn delete_board(&self, board_id: &str, actor: &Actor) -> ServiceResult<()> {
        let mut audit = self.deps.audit_scope("deleteBoard", AuditLevel::Modify, actor);
        audit.add_meta("boardID", board_id);

        let board = self.deps.existing_board(board_id).await?;
        audit.add_meta("teamID", &board.team_id);
        self.deps
            .require_board_permission(actor, board_id, Permission::DeleteBoard)
            .await?;

        let delete = DeleteBoardsAndBlocks {
            boards: vec![board_id.to_string()],
            blocks: Vec::new(),
        };
        self.deps.store.delete_boards_and_blocks(&delete).await?;

        debug!("deleted board {}", board_id);
        audit.success();
        Ok(())
    }
}
