use serde::{Deserialize, Serialize};

use super::block::{Block, BlockPatch};
use super::board::{Board, BoardPatch};
use super::ModelError;

/// Boards and blocks submitted or returned together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardsAndBlocks {
    #[serde(default)]
    pub boards: Vec<Board>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl BoardsAndBlocks {
    pub fn new(boards: Vec<Board>, blocks: Vec<Block>) -> Self {
        Self { boards, blocks }
    }
}

/// Parallel id/patch lists applied as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchBoardsAndBlocks {
    #[serde(rename = "boardIDs", default)]
    pub board_ids: Vec<String>,
    #[serde(rename = "boardPatches", default)]
    pub board_patches: Vec<BoardPatch>,
    #[serde(rename = "blockIDs", default)]
    pub block_ids: Vec<String>,
    #[serde(rename = "blockPatches", default)]
    pub block_patches: Vec<BlockPatch>,
}

impl PatchBoardsAndBlocks {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.board_ids.len() != self.board_patches.len() {
            return Err(ModelError::InvalidBundle(
                "board ids and board patches must have the same length".to_string(),
            ));
        }
        if self.block_ids.len() != self.block_patches.len() {
            return Err(ModelError::InvalidBundle(
                "block ids and block patches must have the same length".to_string(),
            ));
        }
        for patch in &self.board_patches {
            patch.validate()?;
        }
        for patch in &self.block_patches {
            patch.validate()?;
        }
        Ok(())
    }

    pub fn boards(&self) -> impl Iterator<Item = (&str, &BoardPatch)> {
        self.board_ids.iter().map(String::as_str).zip(self.board_patches.iter())
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&str, &BlockPatch)> {
        self.block_ids.iter().map(String::as_str).zip(self.block_patches.iter())
    }
}

/// Boards and blocks removed as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteBoardsAndBlocks {
    #[serde(default)]
    pub boards: Vec<String>,
    #[serde(default)]
    pub blocks: Vec<String>,
}

impl DeleteBoardsAndBlocks {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.boards.is_empty() {
            return Err(ModelError::InvalidBundle("at least one board is required".to_string()));
        }
        if self.boards.iter().chain(self.blocks.iter()).any(String::is_empty) {
            return Err(ModelError::InvalidBundle("identifiers cannot be empty".to_string()));
        }
        Ok(())
    }
}
