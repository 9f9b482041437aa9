// Permission decisions, delegated to an external policy

pub mod policy;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use policy::PolicyServiceClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewTeam,
    ViewBoard,
    ManageBoardCards,
    ManageBoardProperties,
    ManageBoardType,
    DeleteBoard,
    CreatePublicChannel,
    CreatePrivateChannel,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ViewTeam => "view_team",
            Permission::ViewBoard => "view_board",
            Permission::ManageBoardCards => "manage_board_cards",
            Permission::ManageBoardProperties => "manage_board_properties",
            Permission::ManageBoardType => "manage_board_type",
            Permission::DeleteBoard => "delete_board",
            Permission::CreatePublicChannel => "create_public_channel",
            Permission::CreatePrivateChannel => "create_private_channel",
        }
    }
}

#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn has_permission_to_team(&self, user_id: &str, team_id: &str, permission: Permission) -> bool;

    async fn has_permission_to_board(&self, user_id: &str, board_id: &str, permission: Permission) -> bool;
}

/// Grants everything. Used for single-user sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl PermissionChecker for AllowAll {
    async fn has_permission_to_team(&self, _user_id: &str, _team_id: &str, _permission: Permission) -> bool {
        true
    }

    async fn has_permission_to_board(&self, _user_id: &str, _board_id: &str, _permission: Permission) -> bool {
        true
    }
}

/// Fixed set of grants. Empty, it denies everything.
#[derive(Debug, Default, Clone)]
pub struct GrantTable {
    team: HashSet<(String, String, Permission)>,
    board: HashSet<(String, String, Permission)>,
}

impl GrantTable {
    pub fn with_team_grant(mut self, user_id: &str, team_id: &str, permission: Permission) -> Self {
        self.team.insert((user_id.to_string(), team_id.to_string(), permission));
        self
    }

    pub fn with_board_grant(mut self, user_id: &str, board_id: &str, permission: Permission) -> Self {
        self.board.insert((user_id.to_string(), board_id.to_string(), permission));
        self
    }
}

#[async_trait]
impl PermissionChecker for GrantTable {
    async fn has_permission_to_team(&self, user_id: &str, team_id: &str, permission: Permission) -> bool {
        self.team.contains(&(user_id.to_string(), team_id.to_string(), permission))
    }

    async fn has_permission_to_board(&self, user_id: &str, board_id: &str, permission: Permission) -> bool {
        self.board.contains(&(user_id.to_string(), board_id.to_string(), permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grant_table() {
        let grants = GrantTable::default()
            .with_team_grant("u1", "T1", Permission::CreatePublicChannel)
            .with_board_grant("u1", "b1", Permission::DeleteBoard);

        assert!(grants.has_permission_to_team("u1", "T1", Permission::CreatePublicChannel).await);
        assert!(!grants.has_permission_to_team("u1", "T1", Permission::CreatePrivateChannel).await);
        assert!(!grants.has_permission_to_team("u2", "T1", Permission::CreatePublicChannel).await);
        assert!(grants.has_permission_to_board("u1", "b1", Permission::DeleteBoard).await);
        assert!(!grants.has_permission_to_board("u1", "b2", Permission::DeleteBoard).await);
    }

    #[test]
    fn test_permission_names() {
        assert_eq!(Permission::ManageBoardCards.as_str(), "manage_board_cards");
        assert_eq!(
            serde_json::to_value(Permission::CreatePrivateChannel).unwrap(),
            serde_json::json!("create_private_channel")
        );
    }
}
