use std::collections::HashSet;

use tracing::{debug, warn};

use super::resolver::{self, UnknownParent};
use super::stamp::{stamp_all, stamp_all_new};
use super::tree_filter::{filter_orphans_from, filter_orphans_of_board, FilteredBlocks};
use super::{ServiceDeps, ServiceError, ServiceResult};
use crate::audit::{AuditLevel, AuditScope};
use crate::auth::Actor;
use crate::database::{BlockQuery, SubtreeDepth};
use crate::model::{Block, BlockPatch, BoardsAndBlocks, DeleteBoardsAndBlocks, PatchBoardsAndBlocks};
use crate::permissions::Permission;

/// Block operations scoped to one board.
#[derive(Clone)]
pub struct BlockService {
    deps: ServiceDeps,
}

fn record_filtering(audit: &mut AuditScope, raw: usize, filtered: &FilteredBlocks, board_id: &str) {
    audit.add_meta("rawCount", raw);
    audit.add_meta("filteredCount", filtered.blocks.len());
    audit.add_meta("droppedCount", filtered.dropped);
    if filtered.dropped > 0 {
        warn!("dropped {} orphaned blocks from board {}", filtered.dropped, board_id);
    }
}

impl BlockService {
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    /// Ids of the blocks already stored on `board_id`.
    async fn stored_ids(&self, board_id: &str) -> ServiceResult<HashSet<String>> {
        let blocks = self.deps.store.get_blocks(board_id, &BlockQuery::all()).await?;
        Ok(blocks.into_iter().map(|block| block.id.to_string()).collect())
    }

    /// Lists blocks of a board. `block_id` selects a single block and wins over
    /// the parent and type filters, `query.all` wins over everything.
    pub async fn get_blocks(
        &self,
        board_id: &str,
        query: &BlockQuery,
        block_id: Option<&str>,
        actor: &Actor,
    ) -> ServiceResult<Vec<Block>> {
        let mut audit = self.deps.audit_scope("getBlocks", AuditLevel::Read, actor);
        audit.add_meta("boardID", board_id);
        audit.add_meta("parentID", &query.parent_id);
        audit.add_meta("blockType", &query.block_type);
        audit.add_meta("all", query.all);
        audit.add_meta("blockID", block_id);

        self.deps
            .require_board_permission(actor, board_id, Permission::ViewBoard)
            .await?;
        self.deps.existing_board(board_id).await?;

        let blocks = match block_id {
            Some(block_id) if !query.all => vec![self.deps.existing_block(board_id, block_id).await?],
            _ => self.deps.store.get_blocks(board_id, query).await?,
        };

        debug!("GetBlocks board {} returned {} blocks", board_id, blocks.len());
        audit.add_meta("blocksCount", blocks.len());
        audit.success();
        Ok(blocks)
    }

    pub async fn insert_blocks(&self, board_id: &str, blocks: Vec<Block>, actor: &Actor) -> ServiceResult<Vec<Block>> {
        let mut audit = self.deps.audit_scope("postBlocks", AuditLevel::Modify, actor);
        audit.add_meta("boardID", board_id);
        audit.add_meta("blocksCount", blocks.len());

        self.deps.existing_board(board_id).await?;
        self.deps
            .require_board_permission(actor, board_id, Permission::ManageBoardCards)
            .await?;

        for block in &blocks {
            block.validate_new()?;
            if block.board_id.as_str() != board_id {
                return Err(ServiceError::validation(format!(
                    "block {} does not belong to board {}",
                    block.id, board_id
                )));
            }
        }

        let existing = self.stored_ids(board_id).await?;
        let mut blocks = resolver::resolve_blocks(
            blocks,
            board_id,
            &existing,
            UnknownParent::Reject,
            self.deps.ids.as_ref(),
        )?;
        stamp_all_new(blocks.iter_mut(), &self.deps.stamp(actor));

        self.deps
            .store
            .insert_boards_and_blocks(&BoardsAndBlocks::new(Vec::new(), blocks.clone()))
            .await?;

        debug!("inserted {} blocks on board {}", blocks.len(), board_id);
        audit.success();
        Ok(blocks)
    }

    pub async fn patch_block(
        &self,
        board_id: &str,
        block_id: &str,
        patch: BlockPatch,
        actor: &Actor,
    ) -> ServiceResult<Block> {
        let mut audit = self.deps.audit_scope("patchBlock", AuditLevel::Modify, actor);
        audit.add_meta("boardID", board_id);
        audit.add_meta("blockID", block_id);

        patch.validate()?;
        self.deps
            .require_board_permission(actor, board_id, Permission::ManageBoardCards)
            .await?;
        self.deps.existing_block(board_id, block_id).await?;

        let patches = PatchBoardsAndBlocks {
            block_ids: vec![block_id.to_string()],
            block_patches: vec![patch],
            ..Default::default()
        };
        let patched = self
            .deps
            .store
            .patch_boards_and_blocks(&patches, &self.deps.stamp(actor))
            .await?;
        let block = patched
            .blocks
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::not_found(format!("block {} not found", block_id)))?;

        audit.success();
        Ok(block)
    }

    /// Removes one block. Its children stay and become orphans, which the
    /// tree views leave out.
    pub async fn delete_block(&self, board_id: &str, block_id: &str, actor: &Actor) -> ServiceResult<()> {
        let mut audit = self.deps.audit_scope("deleteBlock", AuditLevel::Modify, actor);
        audit.add_meta("boardID", board_id);
        audit.add_meta("blockID", block_id);

        self.deps
            .require_board_permission(actor, board_id, Permission::ManageBoardCards)
            .await?;
        self.deps.existing_block(board_id, block_id).await?;

        let delete = DeleteBoardsAndBlocks {
            boards: Vec::new(),
            blocks: vec![block_id.to_string()],
        };
        self.deps.store.delete_boards_and_blocks(&delete).await?;

        audit.success();
        Ok(())
    }

    /// The block and its descendants, two or three levels deep. `levels` is
    /// the raw query value.
    pub async fn get_subtree(
        &self,
        board_id: &str,
        block_id: &str,
        levels: Option<&str>,
        actor: &Actor,
    ) -> ServiceResult<Vec<Block>> {
        let mut audit = self.deps.audit_scope("getSubTree", AuditLevel::Read, actor);
        audit.add_meta("boardID", board_id);
        audit.add_meta("blockID", block_id);

        self.deps
            .require_board_permission(actor, board_id, Permission::ViewBoard)
            .await?;

        let depth = SubtreeDepth::from_query(levels).ok_or_else(|| ServiceError::validation("invalid levels"))?;
        audit.add_meta("levels", depth.levels());
        self.deps.existing_block(board_id, block_id).await?;

        let raw = self.deps.store.get_subtree(board_id, block_id, depth).await?;
        let raw_count = raw.len();
        let filtered = filter_orphans_from(raw, block_id);
        record_filtering(&mut audit, raw_count, &filtered, board_id);

        audit.success();
        Ok(filtered.blocks)
    }

    /// Every block of the board, or of the tree under `root_id`, with orphans
    /// left out.
    pub async fn export_blocks(&self, board_id: &str, root_id: Option<&str>, actor: &Actor) -> ServiceResult<Vec<Block>> {
        let root_id = root_id.filter(|id| !id.is_empty());
        let mut audit = self.deps.audit_scope("export", AuditLevel::Read, actor);
        audit.add_meta("boardID", board_id);
        audit.add_meta("rootID", root_id);

        self.deps
            .require_board_permission(actor, board_id, Permission::ViewBoard)
            .await?;
        self.deps.existing_board(board_id).await?;

        let (raw_count, filtered) = match root_id {
            Some(root_id) => {
                let raw = self.deps.store.get_blocks_with_root_id(board_id, root_id).await?;
                (raw.len(), filter_orphans_from(raw, root_id))
            }
            None => {
                let raw = self.deps.store.get_blocks(board_id, &BlockQuery::all()).await?;
                (raw.len(), filter_orphans_of_board(raw, board_id))
            }
        };
        record_filtering(&mut audit, raw_count, &filtered, board_id);

        debug!("exported {} blocks of board {}", filtered.blocks.len(), board_id);
        audit.success();
        Ok(filtered.blocks)
    }

    /// Loads previously exported blocks onto `board_id`. Whatever board they
    /// came from, they land on this one under fresh ids; parents that cannot
    /// be found there are replaced by the board.
    pub async fn import_blocks(&self, board_id: &str, blocks: Vec<Block>, actor: &Actor) -> ServiceResult<()> {
        let mut audit = self.deps.audit_scope("import", AuditLevel::Modify, actor);
        audit.add_meta("boardID", board_id);
        audit.add_meta("blocksCount", blocks.len());

        self.deps
            .require_board_permission(actor, board_id, Permission::ManageBoardCards)
            .await?;
        self.deps.existing_board(board_id).await?;

        for block in &blocks {
            block.validate_new()?;
        }

        let existing = self.stored_ids(board_id).await?;
        let mut blocks = resolver::resolve_blocks(
            blocks,
            board_id,
            &existing,
            UnknownParent::AttachToBoard,
            self.deps.ids.as_ref(),
        )?;
        stamp_all(blocks.iter_mut(), &self.deps.stamp(actor));

        self.deps
            .store
            .insert_boards_and_blocks(&BoardsAndBlocks::new(Vec::new(), blocks))
            .await?;

        audit.success();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Outcome;
    use crate::database::BoardBlockStore;
    use crate::model::{BoardType, EntityId};
    use crate::permissions::GrantTable;
    use crate::testing::{block, board, user, Harness, NOW};
    use serde_json::json;

    async fn seeded(h: &Harness) {
        h.seed(
            vec![board("b1", "T1", BoardType::Open), board("b2", "T1", BoardType::Open)],
            vec![
                block("v1", "b1", "b1", "view"),
                block("c1", "b1", "b1", "card"),
                block("t1", "b1", "c1", "text"),
                block("t2", "b1", "t1", "text"),
                block("t3", "b1", "t2", "text"),
                block("x1", "b2", "b2", "card"),
            ],
        )
        .await;
    }

    fn ids(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().map(|b| b.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_get_blocks_filters() {
        let h = Harness::allow_all();
        seeded(&h).await;
        let service = BlockService::new(h.deps.clone());

        let all = service.get_blocks("b1", &BlockQuery::all(), None, &user()).await.unwrap();
        assert_eq!(all.len(), 5);

        let query = BlockQuery {
            parent_id: Some("c1".into()),
            ..Default::default()
        };
        let children = service.get_blocks("b1", &query, None, &user()).await.unwrap();
        assert_eq!(ids(&children), vec!["t1"]);

        let one = service
            .get_blocks("b1", &BlockQuery::default(), Some("c1"), &user())
            .await
            .unwrap();
        assert_eq!(ids(&one), vec!["c1"]);

        assert!(matches!(
            service.get_blocks("b1", &BlockQuery::default(), Some("x1"), &user()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_blocks_requires_view_board() {
        let h = Harness::new(GrantTable::default());
        seeded(&h).await;
        let service = BlockService::new(h.deps.clone());

        assert!(matches!(
            service.get_blocks("b1", &BlockQuery::all(), None, &user()).await,
            Err(ServiceError::PermissionDenied(_))
        ));
        assert_eq!(h.audit.last().unwrap().outcome, Outcome::Fail);
    }

    #[tokio::test]
    async fn test_insert_blocks_under_existing_parent() {
        let h = Harness::allow_all();
        seeded(&h).await;
        let service = BlockService::new(h.deps.clone());

        let blocks: Vec<Block> = serde_json::from_value(json!([
            {"id": "tmp1", "boardId": "b1", "parentId": "c1", "type": "text", "createAt": 3, "updateAt": 3},
            {"id": "tmp2", "boardId": "b1", "parentId": "tmp1", "type": "image", "createAt": 3, "updateAt": 3}
        ]))
        .unwrap();
        let inserted = service.insert_blocks("b1", blocks, &user()).await.unwrap();
        assert_eq!(inserted[0].parent_id, Some(EntityId::assigned("c1")));
        assert_eq!(inserted[1].parent_id, Some(inserted[0].id.clone()));
        assert_eq!(inserted[1].update_at, NOW);
        assert!(h.store.get_block(inserted[1].id.as_str()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_blocks_rejects_other_board() {
        let h = Harness::allow_all();
        seeded(&h).await;
        let service = BlockService::new(h.deps.clone());

        let blocks: Vec<Block> = serde_json::from_value(json!([
            {"id": "tmp1", "boardId": "b2", "type": "text", "createAt": 3, "updateAt": 3}
        ]))
        .unwrap();
        assert!(matches!(
            service.insert_blocks("b1", blocks, &user()).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_patch_and_delete_block_scoped_to_board() {
        let h = Harness::allow_all();
        seeded(&h).await;
        let service = BlockService::new(h.deps.clone());

        let patch: BlockPatch = serde_json::from_value(json!({"title": "done"})).unwrap();
        assert!(matches!(
            service.patch_block("b1", "x1", patch.clone(), &user()).await,
            Err(ServiceError::NotFound(_))
        ));
        let patched = service.patch_block("b1", "c1", patch, &user()).await.unwrap();
        assert_eq!(patched.title, "done");

        service.delete_block("b1", "t1", &user()).await.unwrap();
        assert!(h.store.get_block("t1").await.unwrap().is_none());
        assert!(h.store.get_block("t2").await.unwrap().is_some());

        let exported = service.export_blocks("b1", None, &user()).await.unwrap();
        assert_eq!(ids(&exported), vec!["v1", "c1"]);
        assert_eq!(h.audit.last().unwrap().meta["droppedCount"], json!(2));
    }

    #[tokio::test]
    async fn test_subtree_levels() {
        let h = Harness::allow_all();
        seeded(&h).await;
        let service = BlockService::new(h.deps.clone());

        let two = service.get_subtree("b1", "c1", None, &user()).await.unwrap();
        assert_eq!(ids(&two), vec!["c1", "t1"]);

        let three = service.get_subtree("b1", "c1", Some("3"), &user()).await.unwrap();
        assert_eq!(ids(&three), vec!["c1", "t1", "t2"]);

        assert_eq!(
            service.get_subtree("b1", "c1", Some("junk"), &user()).await.unwrap().len(),
            2
        );
        assert!(matches!(
            service.get_subtree("b1", "c1", Some("5"), &user()).await,
            Err(ServiceError::Validation(_))
        ));

        // Permission is checked before the query is looked at
        let denied = BlockService::new(Harness::new(GrantTable::default()).deps);
        assert!(matches!(
            denied.get_subtree("b1", "c1", Some("5"), &user()).await,
            Err(ServiceError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_export_from_root_and_import_elsewhere() {
        let h = Harness::allow_all();
        seeded(&h).await;
        let service = BlockService::new(h.deps.clone());

        let exported = service.export_blocks("b1", Some("c1"), &user()).await.unwrap();
        assert_eq!(ids(&exported), vec!["c1", "t1", "t2", "t3"]);

        // what a client would send back: the exported json
        let wire = serde_json::to_value(&exported).unwrap();
        let to_import: Vec<Block> = serde_json::from_value(wire).unwrap();
        service.import_blocks("b2", to_import, &user()).await.unwrap();

        let on_b2 = h.store.get_blocks("b2", &BlockQuery::all()).await.unwrap();
        assert_eq!(on_b2.len(), 5);
        assert!(on_b2.iter().all(|b| b.board_id.as_str() == "b2"));
        let imported_card = on_b2.iter().find(|b| b.block_type == "card" && b.id.as_str() != "x1").unwrap();
        assert_eq!(imported_card.parent_str(), "b2");
        assert!(h.store.get_block("c1").await.unwrap().unwrap().board_id.as_str() == "b1");
    }
}
