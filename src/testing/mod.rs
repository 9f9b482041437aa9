// Fixtures for unit tests: a memory store, recorded audit and fixed time

use std::sync::Arc;

use serde_json::json;

use crate::audit::MemoryAuditSink;
use crate::auth::Actor;
use crate::database::{BoardBlockStore, MemoryStore};
use crate::model::{Block, Board, BoardType, BoardsAndBlocks, EntityId, SequentialIds};
use crate::permissions::{AllowAll, PermissionChecker};
use crate::services::stamp::FixedClock;
use crate::services::ServiceDeps;

pub const NOW: i64 = 1_700_000_000_000;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub deps: ServiceDeps,
}

impl Harness {
    pub fn new(permissions: impl PermissionChecker + 'static) -> Self {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditSink::default());
        let deps = ServiceDeps {
            store: store.clone(),
            permissions: Arc::new(permissions),
            audit: audit.clone(),
            clock: Arc::new(FixedClock(NOW)),
            ids: Arc::new(SequentialIds::default()),
        };
        Self { store, audit, deps }
    }

    pub fn allow_all() -> Self {
        Self::new(AllowAll)
    }

    pub async fn seed(&self, boards: Vec<Board>, blocks: Vec<Block>) {
        self.store
            .insert_boards_and_blocks(&BoardsAndBlocks::new(boards, blocks))
            .await
            .expect("seeding the memory store");
    }
}

pub fn user() -> Actor {
    Actor::new("u1")
}

pub fn board(id: &str, team_id: &str, board_type: BoardType) -> Board {
    let mut board: Board = serde_json::from_value(json!({
        "teamId": team_id,
        "type": board_type.code(),
        "title": format!("board {}", id),
        "createAt": 1,
        "updateAt": 1
    }))
    .expect("board fixture");
    board.id = EntityId::assigned(id);
    board
}

/// A stored block; `parent` may be empty for a top-level block.
pub fn block(id: &str, board_id: &str, parent: &str, block_type: &str) -> Block {
    let mut block: Block = serde_json::from_value(json!({
        "type": block_type,
        "title": format!("block {}", id),
        "createAt": 1,
        "updateAt": 1
    }))
    .expect("block fixture");
    block.id = EntityId::assigned(id);
    block.board_id = EntityId::assigned(board_id);
    block.parent_id = (!parent.is_empty()).then(|| EntityId::assigned(parent));
    block
}
