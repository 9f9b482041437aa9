// Placeholder → server identifier rewriting for submitted bundles

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{Block, Board, BoardsAndBlocks, EntityId, IdGenerator, IdKind};

/// Payload keys whose values name other blocks of the same board.
const PAYLOAD_REFERENCE_KEYS: [&str; 3] = ["contentOrder", "cardOrder", "defaultTemplateId"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("placeholder {0} is used by more than one entity")]
    DuplicatePlaceholder(String),

    #[error("{field} {reference} of block {block} does not match any entity")]
    UnresolvableReference {
        block: String,
        field: &'static str,
        reference: String,
    },
}

/// Placeholder → fresh id maps for one bundle.
#[derive(Default)]
struct Linker {
    seen: HashSet<String>,
    boards: HashMap<String, String>,
    blocks: HashMap<String, String>,
}

impl Linker {
    /// Draws a fresh id for `id` and remembers the mapping. Returns `None` for
    /// ids the server already issued.
    fn assign(
        &mut self,
        id: &EntityId,
        kind: IdKind,
        ids: &dyn IdGenerator,
    ) -> Result<Option<String>, ResolveError> {
        let placeholder = match id {
            EntityId::Assigned(_) => return Ok(None),
            EntityId::Placeholder(placeholder) => placeholder,
        };

        let fresh = ids.new_id(kind);
        if placeholder.is_empty() {
            return Ok(Some(fresh));
        }
        if !self.seen.insert(placeholder.clone()) {
            return Err(ResolveError::DuplicatePlaceholder(placeholder.clone()));
        }

        let map = if kind == IdKind::Board { &mut self.boards } else { &mut self.blocks };
        map.insert(placeholder.clone(), fresh.clone());
        Ok(Some(fresh))
    }

    fn board_ref(&self, block: &Block) -> Result<EntityId, ResolveError> {
        match &block.board_id {
            EntityId::Assigned(_) => Ok(block.board_id.clone()),
            EntityId::Placeholder(placeholder) => self
                .boards
                .get(placeholder)
                .map(|id| EntityId::assigned(id.clone()))
                .ok_or_else(|| unresolvable(block, "boardId", placeholder)),
        }
    }

    /// Parents resolve against the bundle's blocks first, then its boards.
    /// Anything else must be in `existing`.
    fn parent_ref(&self, block: &Block, existing: &HashSet<String>) -> Result<Option<EntityId>, ResolveError> {
        let placeholder = match &block.parent_id {
            None => return Ok(None),
            Some(EntityId::Assigned(_)) => return Ok(block.parent_id.clone()),
            Some(EntityId::Placeholder(placeholder)) => placeholder,
        };

        if let Some(id) = self.blocks.get(placeholder).or_else(|| self.boards.get(placeholder)) {
            return Ok(Some(EntityId::assigned(id.clone())));
        }
        if existing.contains(placeholder) {
            return Ok(Some(EntityId::assigned(placeholder.clone())));
        }
        Err(unresolvable(block, "parentId", placeholder))
    }

    fn rewrite_payload(&self, fields: &mut Map<String, Value>) {
        for key in PAYLOAD_REFERENCE_KEYS {
            if let Some(value) = fields.get_mut(key) {
                self.rewrite_value(value);
            }
        }
    }

    fn rewrite_value(&self, value: &mut Value) {
        match value {
            Value::String(id) => {
                if let Some(fresh) = self.blocks.get(id.as_str()) {
                    *id = fresh.clone();
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|item| self.rewrite_value(item)),
            _ => {}
        }
    }
}

fn unresolvable(block: &Block, field: &'static str, reference: &str) -> ResolveError {
    ResolveError::UnresolvableReference {
        block: block.id.to_string(),
        field,
        reference: reference.to_string(),
    }
}

/// Gives every placeholder board and block of `bundle` a fresh server id and
/// rewrites every reference to them. Boards referenced by `boardId` and
/// `parentId` must be part of the bundle.
pub fn resolve(bundle: BoardsAndBlocks, ids: &dyn IdGenerator) -> Result<BoardsAndBlocks, ResolveError> {
    let BoardsAndBlocks { boards, blocks } = bundle;
    let mut linker = Linker::default();

    let board_ids = boards
        .iter()
        .map(|board| linker.assign(&board.id, IdKind::Board, ids))
        .collect::<Result<Vec<_>, _>>()?;
    let block_ids = blocks
        .iter()
        .map(|block| linker.assign(&block.id, IdKind::for_block_type(&block.block_type), ids))
        .collect::<Result<Vec<_>, _>>()?;

    let mut resolved_blocks = Vec::with_capacity(blocks.len());
    for (mut block, fresh) in blocks.into_iter().zip(block_ids) {
        block.board_id = linker.board_ref(&block)?;
        block.parent_id = linker.parent_ref(&block, &HashSet::new())?;
        linker.rewrite_payload(&mut block.fields);
        if let Some(fresh) = fresh {
            block.id = EntityId::assigned(fresh);
        }
        resolved_blocks.push(block);
    }

    let resolved_boards: Vec<Board> = boards
        .into_iter()
        .zip(board_ids)
        .map(|(mut board, fresh)| {
            if let Some(fresh) = fresh {
                board.id = EntityId::assigned(fresh);
            }
            board
        })
        .collect();

    Ok(BoardsAndBlocks::new(resolved_boards, resolved_blocks))
}

/// What to do with a parent that is neither in the batch nor on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownParent {
    Reject,
    /// Re-parent the block onto the board itself.
    AttachToBoard,
}

/// Block-only variant for adding blocks to an existing board. Every block
/// lands on `board_id`; a parent outside the batch must be `board_id` itself
/// or one of the `existing` block ids, otherwise `unknown` decides.
pub fn resolve_blocks(
    blocks: Vec<Block>,
    board_id: &str,
    existing: &HashSet<String>,
    unknown: UnknownParent,
    ids: &dyn IdGenerator,
) -> Result<Vec<Block>, ResolveError> {
    let mut linker = Linker::default();
    let fresh_ids = blocks
        .iter()
        .map(|block| linker.assign(&block.id, IdKind::for_block_type(&block.block_type), ids))
        .collect::<Result<Vec<_>, _>>()?;

    let mut known = existing.clone();
    known.insert(board_id.to_string());

    let mut resolved = Vec::with_capacity(blocks.len());
    for (mut block, fresh) in blocks.into_iter().zip(fresh_ids) {
        block.board_id = EntityId::assigned(board_id);
        block.parent_id = match linker.parent_ref(&block, &known) {
            Err(ResolveError::UnresolvableReference { .. }) if unknown == UnknownParent::AttachToBoard => {
                Some(EntityId::assigned(board_id))
            }
            parent => parent?,
        };
        linker.rewrite_payload(&mut block.fields);
        if let Some(fresh) = fresh {
            block.id = EntityId::assigned(fresh);
        }
        resolved.push(block);
    }
    Ok(resolved)
}
