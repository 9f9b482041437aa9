use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BlockQuery, BoardBlockStore, StoreError, SubtreeDepth};
use crate::model::{Block, Board, BoardsAndBlocks, DeleteBoardsAndBlocks, PatchBoardsAndBlocks};
use crate::services::stamp::{MutationStamp, Stampable};

#[derive(Debug, Clone, Default)]
struct Tables {
    boards: Vec<Board>,
    blocks: Vec<Block>,
}

/// Working copy of the tables for one transaction.
struct Tx {
    tables: Tables,
    writes_left: Option<usize>,
}

impl Tx {
    fn charge_write(&mut self) -> Result<(), StoreError> {
        if let Some(left) = self.writes_left.as_mut() {
            if *left == 0 {
                return Err(StoreError::Aborted("injected write failure".to_string()));
            }
            *left -= 1;
        }
        Ok(())
    }

    fn upsert_board(&mut self, board: &Board) -> Result<(), StoreError> {
        self.charge_write()?;
        match self.tables.boards.iter_mut().find(|b| b.id.as_str() == board.id.as_str()) {
            Some(existing) => *existing = board.clone(),
            None => self.tables.boards.push(board.clone()),
        }
        Ok(())
    }

    fn upsert_block(&mut self, block: &Block) -> Result<(), StoreError> {
        self.charge_write()?;
        match self.tables.blocks.iter_mut().find(|b| b.id.as_str() == block.id.as_str()) {
            Some(existing) => *existing = block.clone(),
            None => self.tables.blocks.push(block.clone()),
        }
        Ok(())
    }
}

/// In-process store. Each composite write works on a copy of the tables that
/// replaces the live ones only when every step succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_after: Mutex<Option<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next write transaction fail after `writes` entity writes.
    pub fn fail_after_writes(&self, writes: usize) {
        if let Ok(mut fail_after) = self.fail_after.lock() {
            *fail_after = Some(writes);
        }
    }

    async fn transaction<T>(&self, work: impl FnOnce(&mut Tx) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut live = self.tables.write().await;
        let writes_left = self.fail_after.lock().ok().and_then(|mut fail_after| fail_after.take());
        let mut tx = Tx {
            tables: live.clone(),
            writes_left,
        };

        let result = work(&mut tx)?;
        *live = tx.tables;
        Ok(result)
    }
}

/// Ids of `root_id` and its descendants on `board_id`, `max_levels` deep
/// counting the root as the first level.
fn descendant_ids(blocks: &[Block], board_id: &str, root_id: &str, max_levels: Option<usize>) -> HashSet<String> {
    let mut found = HashSet::new();
    if !blocks.iter().any(|b| b.id.as_str() == root_id && b.board_id.as_str() == board_id) {
        return found;
    }

    found.insert(root_id.to_string());
    let mut frontier = vec![root_id.to_string()];
    let mut level = 1;
    while !frontier.is_empty() && max_levels.map_or(true, |max| level < max) {
        let mut next = Vec::new();
        for block in blocks.iter().filter(|b| b.board_id.as_str() == board_id) {
            if frontier.iter().any(|parent| parent == block.parent_str()) && found.insert(block.id.to_string()) {
                next.push(block.id.to_string());
            }
        }
        frontier = next;
        level += 1;
    }
    found
}

#[async_trait]
impl BoardBlockStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_board(&self, board_id: &str) -> Result<Option<Board>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.boards.iter().find(|b| b.id.as_str() == board_id).cloned())
    }

    async fn get_boards_for_team(&self, team_id: &str) -> Result<Vec<Board>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.boards.iter().filter(|b| b.team_id == team_id).cloned().collect())
    }

    async fn get_block(&self, block_id: &str) -> Result<Option<Block>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.blocks.iter().find(|b| b.id.as_str() == block_id).cloned())
    }

    async fn get_blocks(&self, board_id: &str, query: &BlockQuery) -> Result<Vec<Block>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .blocks
            .iter()
            .filter(|b| b.board_id.as_str() == board_id && query.matches(b))
            .cloned()
            .collect())
    }

    async fn get_blocks_with_root_id(&self, board_id: &str, root_id: &str) -> Result<Vec<Block>, StoreError> {
        let tables = self.tables.read().await;
        let ids = descendant_ids(&tables.blocks, board_id, root_id, None);
        Ok(tables.blocks.iter().filter(|b| ids.contains(b.id.as_str())).cloned().collect())
    }

    async fn get_subtree(
        &self,
        board_id: &str,
        block_id: &str,
        depth: SubtreeDepth,
    ) -> Result<Vec<Block>, StoreError> {
        let tables = self.tables.read().await;
        let ids = descendant_ids(&tables.blocks, board_id, block_id, Some(depth.levels()));
        Ok(tables.blocks.iter().filter(|b| ids.contains(b.id.as_str())).cloned().collect())
    }

    async fn insert_boards_and_blocks(&self, bundle: &BoardsAndBlocks) -> Result<(), StoreError> {
        self.transaction(|tx| {
            for board in &bundle.boards {
                tx.upsert_board(board)?;
            }
            for block in &bundle.blocks {
                tx.upsert_block(block)?;
            }
            Ok(())
        })
        .await
    }

    async fn patch_boards_and_blocks(
        &self,
        patches: &PatchBoardsAndBlocks,
        stamp: &MutationStamp,
    ) -> Result<BoardsAndBlocks, StoreError> {
        self.transaction(|tx| {
            let mut patched = BoardsAndBlocks::default();
            for (board_id, patch) in patches.boards() {
                let mut board = tx
                    .tables
                    .boards
                    .iter()
                    .find(|b| b.id.as_str() == board_id)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(format!("board {}", board_id)))?;
                patch.apply(&mut board);
                board.stamp(stamp);
                tx.upsert_board(&board)?;
                patched.boards.push(board);
            }
            for (block_id, patch) in patches.blocks() {
                let mut block = tx
                    .tables
                    .blocks
                    .iter()
                    .find(|b| b.id.as_str() == block_id)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(format!("block {}", block_id)))?;
                patch.apply(&mut block);
                block.stamp(stamp);
                tx.upsert_block(&block)?;
                patched.blocks.push(block);
            }
            Ok(patched)
        })
        .await
    }

    async fn delete_boards_and_blocks(&self, delete: &DeleteBoardsAndBlocks) -> Result<(), StoreError> {
        self.transaction(|tx| {
            for block_id in &delete.blocks {
                tx.charge_write()?;
                tx.tables.blocks.retain(|b| b.id.as_str() != block_id);
            }
            for board_id in &delete.boards {
                tx.charge_write()?;
                tx.tables.boards.retain(|b| b.id.as_str() != board_id);
                tx.tables.blocks.retain(|b| b.board_id.as_str() != board_id);
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityId;
    use serde_json::json;

    fn board(id: &str) -> Board {
        let mut board: Board = serde_json::from_value(json!({"teamId": "T1", "type": "O"})).unwrap();
        board.id = EntityId::assigned(id);
        board
    }

    fn block(id: &str, board_id: &str, parent: &str) -> Block {
        let mut block: Block = serde_json::from_value(json!({"type": "text", "createAt": 1, "updateAt": 1})).unwrap();
        block.id = EntityId::assigned(id);
        block.board_id = EntityId::assigned(board_id);
        block.parent_id = (!parent.is_empty()).then(|| EntityId::assigned(parent));
        block
    }

    fn seeded() -> BoardsAndBlocks {
        BoardsAndBlocks::new(
            vec![board("b1"), board("b2")],
            vec![
                block("c1", "b1", "b1"),
                block("t1", "b1", "c1"),
                block("t2", "b1", "t1"),
                block("t3", "b1", "t2"),
                block("c2", "b2", ""),
            ],
        )
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let store = MemoryStore::new();
        store.insert_boards_and_blocks(&seeded()).await.unwrap();

        assert!(store.get_board("b1").await.unwrap().is_some());
        assert_eq!(store.get_boards_for_team("T1").await.unwrap().len(), 2);
        assert_eq!(store.get_blocks("b1", &BlockQuery::all()).await.unwrap().len(), 4);
        assert_eq!(store.get_block("c2").await.unwrap().unwrap().board_id.as_str(), "b2");
    }

    #[tokio::test]
    async fn test_injected_failure_leaves_nothing_behind() {
        let store = MemoryStore::new();
        store.fail_after_writes(3);
        let err = store.insert_boards_and_blocks(&seeded()).await.unwrap_err();
        assert!(matches!(err, StoreError::Aborted(_)));
        assert!(store.get_boards_for_team("T1").await.unwrap().is_empty());
        assert!(store.get_block("c1").await.unwrap().is_none());

        // one-shot
        store.insert_boards_and_blocks(&seeded()).await.unwrap();
        assert_eq!(store.get_boards_for_team("T1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_subtree_and_root_queries() {
        let store = MemoryStore::new();
        store.insert_boards_and_blocks(&seeded()).await.unwrap();

        let two = store.get_subtree("b1", "c1", SubtreeDepth::Two).await.unwrap();
        assert_eq!(two.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), vec!["c1", "t1"]);

        let three = store.get_subtree("b1", "c1", SubtreeDepth::Three).await.unwrap();
        assert_eq!(three.len(), 3);

        let all = store.get_blocks_with_root_id("b1", "c1").await.unwrap();
        assert_eq!(all.len(), 4);

        assert!(store.get_subtree("b2", "c1", SubtreeDepth::Two).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_board_takes_its_blocks() {
        let store = MemoryStore::new();
        store.insert_boards_and_blocks(&seeded()).await.unwrap();

        let delete = DeleteBoardsAndBlocks {
            boards: vec!["b1".into()],
            blocks: vec!["c2".into()],
        };
        store.delete_boards_and_blocks(&delete).await.unwrap();

        assert!(store.get_board("b1").await.unwrap().is_none());
        assert!(store.get_blocks("b1", &BlockQuery::all()).await.unwrap().is_empty());
        assert!(store.get_board("b2").await.unwrap().is_some());
        assert!(store.get_block("c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_patch_missing_block_aborts_everything() {
        let store = MemoryStore::new();
        store.insert_boards_and_blocks(&seeded()).await.unwrap();

        let patches: PatchBoardsAndBlocks = serde_json::from_value(json!({
            "boardIDs": ["b1"],
            "boardPatches": [{"title": "changed"}],
            "blockIDs": ["missing"],
            "blockPatches": [{"title": "x"}]
        }))
        .unwrap();
        let stamp = MutationStamp {
            modified_by: "u1".into(),
            at: 99,
        };
        assert!(store.patch_boards_and_blocks(&patches, &stamp).await.is_err());
        assert_eq!(store.get_board("b1").await.unwrap().unwrap().title, "");
    }
}
