use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use tracing::info;

use super::{BlockQuery, BoardBlockStore, StoreError, SubtreeDepth};
use crate::model::{Block, Board, BoardType, BoardsAndBlocks, DeleteBoardsAndBlocks, EntityId, PatchBoardsAndBlocks};
use crate::services::stamp::{MutationStamp, Stampable};

/// Depth cap for unbounded tree walks, so a parent cycle cannot recurse forever.
const MAX_TREE_DEPTH: i32 = 256;

const BOARD_COLUMNS: &str = "id, team_id, type, title, description, icon, show_description, is_template, \
     properties, card_properties, created_by, modified_by, create_at, update_at, delete_at";

const BLOCK_COLUMNS: &str =
    "id, board_id, parent_id, created_by, modified_by, schema, type, title, fields, create_at, update_at, delete_at";

const SCHEMA: [&str; 4] = [
    r#"CREATE TABLE IF NOT EXISTS boards (
        seq BIGSERIAL,
        id TEXT PRIMARY KEY,
        team_id TEXT NOT NULL,
        type TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        icon TEXT NOT NULL DEFAULT '',
        show_description BOOLEAN NOT NULL DEFAULT FALSE,
        is_template BOOLEAN NOT NULL DEFAULT FALSE,
        properties JSONB NOT NULL DEFAULT '{}',
        card_properties JSONB NOT NULL DEFAULT '[]',
        created_by TEXT NOT NULL DEFAULT '',
        modified_by TEXT NOT NULL DEFAULT '',
        create_at BIGINT NOT NULL,
        update_at BIGINT NOT NULL,
        delete_at BIGINT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS blocks (
        seq BIGSERIAL,
        id TEXT PRIMARY KEY,
        board_id TEXT NOT NULL,
        parent_id TEXT NOT NULL DEFAULT '',
        created_by TEXT NOT NULL DEFAULT '',
        modified_by TEXT NOT NULL DEFAULT '',
        schema BIGINT NOT NULL DEFAULT 1,
        type TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        fields JSONB NOT NULL DEFAULT '{}',
        create_at BIGINT NOT NULL,
        update_at BIGINT NOT NULL,
        delete_at BIGINT
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_boards_team_id ON boards (team_id)",
    "CREATE INDEX IF NOT EXISTS idx_blocks_board_parent ON blocks (board_id, parent_id)",
];

/// Postgres-backed store. Composite writes run in one transaction each.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32, timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(timeout)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!("Connected to Postgres store (max {} connections)", max_connections);
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn board_from_row(row: &PgRow) -> Result<Board, StoreError> {
    let type_code: String = row.try_get("type")?;
    let board_type = BoardType::from_code(&type_code)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown board type {}", type_code)))?;
    let Json(properties): Json<Map<String, Value>> = row.try_get("properties")?;
    let Json(card_properties): Json<Vec<Value>> = row.try_get("card_properties")?;

    Ok(Board {
        id: EntityId::assigned(row.try_get::<String, _>("id")?),
        team_id: row.try_get("team_id")?,
        board_type,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        icon: row.try_get("icon")?,
        show_description: row.try_get("show_description")?,
        is_template: row.try_get("is_template")?,
        properties,
        card_properties,
        created_by: row.try_get("created_by")?,
        modified_by: row.try_get("modified_by")?,
        create_at: row.try_get("create_at")?,
        update_at: row.try_get("update_at")?,
        delete_at: row.try_get("delete_at")?,
    })
}

fn block_from_row(row: &PgRow) -> Result<Block, StoreError> {
    let parent_id: String = row.try_get("parent_id")?;
    let Json(fields): Json<Map<String, Value>> = row.try_get("fields")?;

    Ok(Block {
        id: EntityId::assigned(row.try_get::<String, _>("id")?),
        parent_id: (!parent_id.is_empty()).then(|| EntityId::assigned(parent_id)),
        board_id: EntityId::assigned(row.try_get::<String, _>("board_id")?),
        created_by: row.try_get("created_by")?,
        modified_by: row.try_get("modified_by")?,
        schema: row.try_get("schema")?,
        block_type: row.try_get("type")?,
        title: row.try_get("title")?,
        fields,
        create_at: row.try_get("create_at")?,
        update_at: row.try_get("update_at")?,
        delete_at: row.try_get("delete_at")?,
    })
}

fn blocks_from_rows(rows: &[PgRow]) -> Result<Vec<Block>, StoreError> {
    rows.iter().map(block_from_row).collect()
}

async fn upsert_board(conn: &mut PgConnection, board: &Board) -> Result<(), StoreError> {
    sqlx::query(
        r#"INSERT INTO boards (id, team_id, type, title, description, icon, show_description, is_template,
                               properties, card_properties, created_by, modified_by, create_at, update_at, delete_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
           ON CONFLICT (id) DO UPDATE SET
               type = EXCLUDED.type, title = EXCLUDED.title, description = EXCLUDED.description,
               icon = EXCLUDED.icon, show_description = EXCLUDED.show_description,
               is_template = EXCLUDED.is_template, properties = EXCLUDED.properties,
               card_properties = EXCLUDED.card_properties, modified_by = EXCLUDED.modified_by,
               update_at = EXCLUDED.update_at, delete_at = EXCLUDED.delete_at"#,
    )
    .bind(board.id.as_str())
    .bind(&board.team_id)
    .bind(board.board_type.code())
    .bind(&board.title)
    .bind(&board.description)
    .bind(&board.icon)
    .bind(board.show_description)
    .bind(board.is_template)
    .bind(Json(&board.properties))
    .bind(Json(&board.card_properties))
    .bind(&board.created_by)
    .bind(&board.modified_by)
    .bind(board.create_at)
    .bind(board.update_at)
    .bind(board.delete_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_block(conn: &mut PgConnection, block: &Block) -> Result<(), StoreError> {
    sqlx::query(
        r#"INSERT INTO blocks (id, board_id, parent_id, created_by, modified_by, schema, type, title, fields,
                               create_at, update_at, delete_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
           ON CONFLICT (id) DO UPDATE SET
               board_id = EXCLUDED.board_id, parent_id = EXCLUDED.parent_id,
               modified_by = EXCLUDED.modified_by, schema = EXCLUDED.schema, type = EXCLUDED.type,
               title = EXCLUDED.title, fields = EXCLUDED.fields, update_at = EXCLUDED.update_at,
               delete_at = EXCLUDED.delete_at"#,
    )
    .bind(block.id.as_str())
    .bind(block.board_id.as_str())
    .bind(block.parent_str())
    .bind(&block.created_by)
    .bind(&block.modified_by)
    .bind(block.schema)
    .bind(&block.block_type)
    .bind(&block.title)
    .bind(Json(&block.fields))
    .bind(block.create_at)
    .bind(block.update_at)
    .bind(block.delete_at)
    .execute(conn)
    .await?;
    Ok(())
}

impl PgStore {
    /// Blocks of the tree under `root_id`, `max_depth` levels deep counting
    /// the root, in insertion order.
    async fn tree(&self, board_id: &str, root_id: &str, max_depth: i32) -> Result<Vec<Block>, StoreError> {
        let sql = format!(
            r#"WITH RECURSIVE tree (id, depth) AS (
                   SELECT id, 1 FROM blocks WHERE board_id = $1 AND id = $2
                   UNION ALL
                   SELECT c.id, t.depth + 1 FROM blocks c JOIN tree t ON c.parent_id = t.id
                   WHERE c.board_id = $1 AND t.depth < $3
               )
               SELECT {} FROM blocks WHERE id IN (SELECT id FROM tree) ORDER BY seq"#,
            BLOCK_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(board_id)
            .bind(root_id)
            .bind(max_depth)
            .fetch_all(&self.pool)
            .await?;
        blocks_from_rows(&rows)
    }
}

#[async_trait]
impl BoardBlockStore for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_board(&self, board_id: &str) -> Result<Option<Board>, StoreError> {
        let sql = format!("SELECT {} FROM boards WHERE id = $1", BOARD_COLUMNS);
        let row = sqlx::query(&sql).bind(board_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(board_from_row).transpose()
    }

    async fn get_boards_for_team(&self, team_id: &str) -> Result<Vec<Board>, StoreError> {
        let sql = format!("SELECT {} FROM boards WHERE team_id = $1 ORDER BY seq", BOARD_COLUMNS);
        let rows = sqlx::query(&sql).bind(team_id).fetch_all(&self.pool).await?;
        rows.iter().map(board_from_row).collect()
    }

    async fn get_block(&self, block_id: &str) -> Result<Option<Block>, StoreError> {
        let sql = format!("SELECT {} FROM blocks WHERE id = $1", BLOCK_COLUMNS);
        let row = sqlx::query(&sql).bind(block_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(block_from_row).transpose()
    }

    async fn get_blocks(&self, board_id: &str, query: &BlockQuery) -> Result<Vec<Block>, StoreError> {
        let sql = format!("SELECT {} FROM blocks WHERE board_id = $1 ORDER BY seq", BLOCK_COLUMNS);
        let rows = sqlx::query(&sql).bind(board_id).fetch_all(&self.pool).await?;
        Ok(blocks_from_rows(&rows)?
            .into_iter()
            .filter(|block| query.matches(block))
            .collect())
    }

    async fn get_blocks_with_root_id(&self, board_id: &str, root_id: &str) -> Result<Vec<Block>, StoreError> {
        self.tree(board_id, root_id, MAX_TREE_DEPTH).await
    }

    async fn get_subtree(
        &self,
        board_id: &str,
        block_id: &str,
        depth: SubtreeDepth,
    ) -> Result<Vec<Block>, StoreError> {
        self.tree(board_id, block_id, depth.levels() as i32).await
    }

    async fn insert_boards_and_blocks(&self, bundle: &BoardsAndBlocks) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for board in &bundle.boards {
            upsert_board(&mut tx, board).await?;
        }
        for block in &bundle.blocks {
            upsert_block(&mut tx, block).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn patch_boards_and_blocks(
        &self,
        patches: &PatchBoardsAndBlocks,
        stamp: &MutationStamp,
    ) -> Result<BoardsAndBlocks, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut patched = BoardsAndBlocks::default();

        let board_sql = format!("SELECT {} FROM boards WHERE id = $1 FOR UPDATE", BOARD_COLUMNS);
        for (board_id, patch) in patches.boards() {
            let row = sqlx::query(&board_sql)
                .bind(board_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("board {}", board_id)))?;
            let mut board = board_from_row(&row)?;
            patch.apply(&mut board);
            board.stamp(stamp);
            upsert_board(&mut tx, &board).await?;
            patched.boards.push(board);
        }

        let block_sql = format!("SELECT {} FROM blocks WHERE id = $1 FOR UPDATE", BLOCK_COLUMNS);
        for (block_id, patch) in patches.blocks() {
            let row = sqlx::query(&block_sql)
                .bind(block_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("block {}", block_id)))?;
            let mut block = block_from_row(&row)?;
            patch.apply(&mut block);
            block.stamp(stamp);
            upsert_block(&mut tx, &block).await?;
            patched.blocks.push(block);
        }

        tx.commit().await?;
        Ok(patched)
    }

    async fn delete_boards_and_blocks(&self, delete: &DeleteBoardsAndBlocks) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM blocks WHERE id = ANY($1)")
            .bind(&delete.blocks)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM blocks WHERE board_id = ANY($1)")
            .bind(&delete.boards)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM boards WHERE id = ANY($1)")
            .bind(&delete.boards)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
