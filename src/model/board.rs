use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::EntityId;
use super::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoardType {
    #[serde(rename = "O", alias = "open")]
    Open,
    #[serde(rename = "P", alias = "private")]
    Private,
}

impl BoardType {
    pub fn code(self) -> &'static str {
        match self {
            BoardType::Open => "O",
            BoardType::Private => "P",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "O" | "open" => Some(BoardType::Open),
            "P" | "private" => Some(BoardType::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub team_id: String,
    #[serde(rename = "type")]
    pub board_type: BoardType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub show_description: bool,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub card_properties: Vec<Value>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub modified_by: String,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_at: Option<i64>,
}

impl Board {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.team_id.is_empty() {
            return Err(ModelError::InvalidBoard(format!("empty team id for board {}", self.id)));
        }
        Ok(())
    }
}

fn card_property_id(property: &Value) -> Option<&str> {
    property.get("id").and_then(Value::as_str)
}

/// Partial update of a board. The team is deliberately absent: a board never
/// changes team.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPatch {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub board_type: Option<BoardType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_description: Option<bool>,
    #[serde(default)]
    pub updated_properties: Map<String, Value>,
    #[serde(default)]
    pub deleted_properties: Vec<String>,
    #[serde(default)]
    pub updated_card_properties: Vec<Value>,
    #[serde(default)]
    pub deleted_card_properties: Vec<String>,
}

impl BoardPatch {
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(key) = self
            .deleted_properties
            .iter()
            .find(|key| self.updated_properties.contains_key(*key))
        {
            return Err(ModelError::InvalidPatch(format!("property {} is both updated and deleted", key)));
        }

        let mut updated_ids = HashSet::new();
        for property in &self.updated_card_properties {
            let id = card_property_id(property)
                .ok_or_else(|| ModelError::InvalidPatch("card property without an id".to_string()))?;
            updated_ids.insert(id);
        }
        if let Some(id) = self
            .deleted_card_properties
            .iter()
            .find(|id| updated_ids.contains(id.as_str()))
        {
            return Err(ModelError::InvalidPatch(format!("card property {} is both updated and deleted", id)));
        }
        Ok(())
    }

    /// Applies the patch to `board`. Timestamps and actor are left to the stamper.
    pub fn apply(&self, board: &mut Board) {
        if let Some(board_type) = self.board_type {
            board.board_type = board_type;
        }
        if let Some(title) = &self.title {
            board.title = title.clone();
        }
        if let Some(description) = &self.description {
            board.description = description.clone();
        }
        if let Some(icon) = &self.icon {
            board.icon = icon.clone();
        }
        if let Some(show_description) = self.show_description {
            board.show_description = show_description;
        }

        for (key, value) in &self.updated_properties {
            board.properties.insert(key.clone(), value.clone());
        }
        for key in &self.deleted_properties {
            board.properties.remove(key);
        }

        for property in &self.updated_card_properties {
            let id = card_property_id(property);
            match board
                .card_properties
                .iter_mut()
                .find(|existing| id.is_some() && card_property_id(existing) == id)
            {
                Some(existing) => *existing = property.clone(),
                None => board.card_properties.push(property.clone()),
            }
        }
        if !self.deleted_card_properties.is_empty() {
            board.card_properties.retain(|property| {
                card_property_id(property)
                    .map(|id| !self.deleted_card_properties.iter().any(|deleted| deleted == id))
                    .unwrap_or(true)
            });
        }
    }
}
