use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::{parent_ref, EntityId};
use super::ModelError;

fn default_schema() -> i64 {
    1
}

/// A node of a board's content tree. `fields` is opaque to the server: its
/// meaning depends on `block_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default, with = "parent_ref")]
    pub parent_id: Option<EntityId>,
    #[serde(default)]
    pub board_id: EntityId,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub modified_by: String,
    #[serde(default = "default_schema")]
    pub schema: i64,
    #[serde(rename = "type", default)]
    pub block_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_at: Option<i64>,
}

impl Block {
    /// Checks a client-submitted block before it is created.
    pub fn validate_new(&self) -> Result<(), ModelError> {
        if self.block_type.is_empty() {
            return Err(ModelError::InvalidBlock(format!("missing type for block id {}", self.id)));
        }
        if self.create_at < 1 {
            return Err(ModelError::InvalidBlock(format!("invalid createAt for block id {}", self.id)));
        }
        if self.update_at < 1 {
            return Err(ModelError::InvalidBlock(format!("invalid updateAt for block id {}", self.id)));
        }
        Ok(())
    }

    pub fn parent_str(&self) -> &str {
        self.parent_id.as_ref().map(EntityId::as_str).unwrap_or("")
    }
}

/// Partial update of a block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<i64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub updated_fields: Map<String, Value>,
    #[serde(default)]
    pub deleted_fields: Vec<String>,
}

impl BlockPatch {
    pub fn validate(&self) -> Result<(), ModelError> {
        if matches!(self.block_type.as_deref(), Some("")) {
            return Err(ModelError::InvalidPatch("block type cannot be empty".to_string()));
        }
        if let Some(key) = self.deleted_fields.iter().find(|key| self.updated_fields.contains_key(*key)) {
            return Err(ModelError::InvalidPatch(format!("field {} is both updated and deleted", key)));
        }
        Ok(())
    }

    /// Applies the patch to `block`. Timestamps and actor are left to the stamper.
    pub fn apply(&self, block: &mut Block) {
        if let Some(parent_id) = &self.parent_id {
            block.parent_id = if parent_id.is_empty() {
                None
            } else {
                Some(EntityId::assigned(parent_id.clone()))
            };
        }
        if let Some(schema) = self.schema {
            block.schema = schema;
        }
        if let Some(block_type) = &self.block_type {
            block.block_type = block_type.clone();
        }
        if let Some(title) = &self.title {
            block.title = title.clone();
        }
        for (key, value) in &self.updated_fields {
            block.fields.insert(key.clone(), value.clone());
        }
        for key in &self.deleted_fields {
            block.fields.remove(key);
        }
    }
}
