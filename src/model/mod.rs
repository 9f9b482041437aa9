// Boards, blocks and the bundles that move them around together

pub mod block;
pub mod board;
pub mod bundle;
pub mod id;

pub use block::{Block, BlockPatch};
pub use board::{Board, BoardPatch, BoardType};
pub use bundle::{BoardsAndBlocks, DeleteBoardsAndBlocks, PatchBoardsAndBlocks};
pub use id::{EntityId, IdGenerator, IdKind, RandomIds, SequentialIds};

use thiserror::Error;

/// Entity-level validation failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("{0}")]
    InvalidBlock(String),

    #[error("{0}")]
    InvalidBoard(String),

    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    #[error("{0}")]
    InvalidBundle(String),
}
