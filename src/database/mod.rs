pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Block, Board, BoardsAndBlocks, DeleteBoardsAndBlocks, PatchBoardsAndBlocks};
use crate::services::stamp::MutationStamp;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transaction aborted: {0}")]
    Aborted(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Which blocks of a board to list. Without `all`, a type on its own selects
/// by type; otherwise blocks are selected by parent, where no parent means the
/// top-level blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockQuery {
    pub all: bool,
    pub parent_id: Option<String>,
    pub block_type: Option<String>,
}

impl BlockQuery {
    pub fn all() -> Self {
        Self {
            all: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, block: &Block) -> bool {
        if self.all {
            return true;
        }
        let type_ok = self.block_type.as_deref().map_or(true, |t| block.block_type == t);
        match (&self.parent_id, &self.block_type) {
            (None, Some(_)) => type_ok,
            (parent, _) => type_ok && block.parent_str() == parent.as_deref().unwrap_or(""),
        }
    }
}

/// How many levels below the root block a subtree view reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtreeDepth {
    Two,
    Three,
}

impl SubtreeDepth {
    /// Reads the `l` query parameter. Absent or non-numeric means two levels;
    /// any number other than 2 or 3 is rejected.
    pub fn from_query(levels: Option<&str>) -> Option<Self> {
        match levels.map(str::parse::<i64>) {
            None | Some(Err(_)) => Some(SubtreeDepth::Two),
            Some(Ok(2)) => Some(SubtreeDepth::Two),
            Some(Ok(3)) => Some(SubtreeDepth::Three),
            Some(Ok(_)) => None,
        }
    }

    pub fn levels(self) -> usize {
        match self {
            SubtreeDepth::Two => 2,
            SubtreeDepth::Three => 3,
        }
    }
}

/// Persistence for boards and blocks. Every method is one durable unit: the
/// composite writes either apply completely or not at all.
#[async_trait]
pub trait BoardBlockStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn get_board(&self, board_id: &str) -> Result<Option<Board>, StoreError>;

    async fn get_boards_for_team(&self, team_id: &str) -> Result<Vec<Board>, StoreError>;

    async fn get_block(&self, block_id: &str) -> Result<Option<Block>, StoreError>;

    async fn get_blocks(&self, board_id: &str, query: &BlockQuery) -> Result<Vec<Block>, StoreError>;

    /// The block `root_id` of `board_id` and all of its descendants.
    async fn get_blocks_with_root_id(&self, board_id: &str, root_id: &str) -> Result<Vec<Block>, StoreError>;

    /// The block `block_id` and its descendants down to `depth` levels,
    /// counting the block itself as the first.
    async fn get_subtree(&self, board_id: &str, block_id: &str, depth: SubtreeDepth)
        -> Result<Vec<Block>, StoreError>;

    /// Inserts boards, then blocks. Entities whose id already exists are
    /// replaced.
    async fn insert_boards_and_blocks(&self, bundle: &BoardsAndBlocks) -> Result<(), StoreError>;

    /// Applies every patch with the same stamp and returns the patched
    /// entities in patch order.
    async fn patch_boards_and_blocks(
        &self,
        patches: &PatchBoardsAndBlocks,
        stamp: &MutationStamp,
    ) -> Result<BoardsAndBlocks, StoreError>;

    /// Removes the listed boards together with all of their blocks, and the
    /// listed blocks on their own.
    async fn delete_boards_and_blocks(&self, delete: &DeleteBoardsAndBlocks) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(parent: &str, block_type: &str) -> Block {
        serde_json::from_value(json!({"id": "x", "parentId": parent, "type": block_type})).unwrap()
    }

    #[test]
    fn test_block_query_matching() {
        let root_card = block("", "card");
        let child_text = block("c1", "text");

        assert!(BlockQuery::default().matches(&root_card));
        assert!(!BlockQuery::default().matches(&child_text));
        assert!(BlockQuery::all().matches(&child_text));

        let by_type = BlockQuery {
            block_type: Some("text".into()),
            ..Default::default()
        };
        assert!(by_type.matches(&child_text));
        assert!(!by_type.matches(&root_card));

        let by_parent = BlockQuery {
            parent_id: Some("c1".into()),
            ..Default::default()
        };
        assert!(by_parent.matches(&child_text));
        assert!(!by_parent.matches(&root_card));
    }

    #[test]
    fn test_subtree_depth_from_query() {
        assert_eq!(SubtreeDepth::from_query(None), Some(SubtreeDepth::Two));
        assert_eq!(SubtreeDepth::from_query(Some("abc")), Some(SubtreeDepth::Two));
        assert_eq!(SubtreeDepth::from_query(Some("3")), Some(SubtreeDepth::Three));
        assert_eq!(SubtreeDepth::from_query(Some("4")), None);
    }
}
