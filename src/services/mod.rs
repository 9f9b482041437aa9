pub mod blocks;
pub mod boards;
pub mod boards_and_blocks;
pub mod error;
pub mod resolver;
pub mod stamp;
pub mod tree_filter;

pub use blocks::BlockService;
pub use boards::BoardService;
pub use boards_and_blocks::BoardsAndBlocksService;
pub use error::{ServiceError, ServiceResult};

use std::sync::Arc;

use tracing::warn;

use crate::audit::{AuditLevel, AuditScope, AuditSink};
use crate::auth::Actor;
use crate::database::BoardBlockStore;
use crate::model::{Block, Board, IdGenerator};
use crate::permissions::{Permission, PermissionChecker};
use stamp::{Clock, MutationStamp};

/// Collaborators shared by every service.
#[derive(Clone)]
pub struct ServiceDeps {
    pub store: Arc<dyn BoardBlockStore>,
    pub permissions: Arc<dyn PermissionChecker>,
    pub audit: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
}

impl ServiceDeps {
    pub fn audit_scope(&self, operation: &str, level: AuditLevel, actor: &Actor) -> AuditScope {
        AuditScope::begin(self.audit.clone(), operation, level, actor)
    }

    pub fn stamp(&self, actor: &Actor) -> MutationStamp {
        MutationStamp::new(actor, self.clock.as_ref())
    }

    /// Single-user sessions hold every permission.
    pub async fn require_team_permission(
        &self,
        actor: &Actor,
        team_id: &str,
        permission: Permission,
    ) -> ServiceResult<()> {
        if actor.is_single_user()
            || self
                .permissions
                .has_permission_to_team(&actor.user_id, team_id, permission)
                .await
        {
            return Ok(());
        }
        warn!("{} denied {} on team {}", actor.user_id, permission.as_str(), team_id);
        Err(ServiceError::permission_denied(format!(
            "access denied: {} on team {}",
            permission.as_str(),
            team_id
        )))
    }

    pub async fn require_board_permission(
        &self,
        actor: &Actor,
        board_id: &str,
        permission: Permission,
    ) -> ServiceResult<()> {
        if actor.is_single_user()
            || self
                .permissions
                .has_permission_to_board(&actor.user_id, board_id, permission)
                .await
        {
            return Ok(());
        }
        warn!("{} denied {} on board {}", actor.user_id, permission.as_str(), board_id);
        Err(ServiceError::permission_denied(format!(
            "access denied: {} on board {}",
            permission.as_str(),
            board_id
        )))
    }

    pub async fn existing_board(&self, board_id: &str) -> ServiceResult<Board> {
        self.store
            .get_board(board_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("board {} not found", board_id)))
    }

    /// A block that exists and lives on `board_id`. A block of another board
    /// is reported as missing.
    pub async fn existing_block(&self, board_id: &str, block_id: &str) -> ServiceResult<Block> {
        match self.store.get_block(block_id).await? {
            Some(block) if block.board_id.as_str() == board_id => Ok(block),
            _ => Err(ServiceError::not_found(format!("block {} not found", block_id))),
        }
    }
}

/// All services over one set of collaborators.
#[derive(Clone)]
pub struct Services {
    pub boards_and_blocks: BoardsAndBlocksService,
    pub boards: BoardService,
    pub blocks: BlockService,
}

impl Services {
    pub fn new(deps: ServiceDeps) -> Self {
        Self {
            boards_and_blocks: BoardsAndBlocksService::new(deps.clone()),
            boards: BoardService::new(deps.clone()),
            blocks: BlockService::new(deps),
        }
    }
}
