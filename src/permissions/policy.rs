use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Permission, PermissionChecker};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckRequest<'a> {
    user_id: &'a str,
    scope: &'a str,
    scope_id: &'a str,
    permission: Permission,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allowed: bool,
}

/// Asks a remote policy service. Any failure to get an answer is a denial.
#[derive(Debug, Clone)]
pub struct PolicyServiceClient {
    client: reqwest::Client,
    check_url: String,
}

impl PolicyServiceClient {
    pub fn new(service_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            check_url: format!("{}/permissions/check", service_url.trim_end_matches('/')),
        })
    }

    async fn check(&self, user_id: &str, scope: &str, scope_id: &str, permission: Permission) -> bool {
        let request = CheckRequest {
            user_id,
            scope,
            scope_id,
            permission,
        };

        let response = match self.client.post(&self.check_url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("policy service unreachable, denying {}: {}", permission.as_str(), e);
                return false;
            }
        };

        if !response.status().is_success() {
            warn!(
                "policy service answered {}, denying {}",
                response.status(),
                permission.as_str()
            );
            return false;
        }

        match response.json::<CheckResponse>().await {
            Ok(body) => body.allowed,
            Err(e) => {
                warn!("unreadable policy service answer, denying {}: {}", permission.as_str(), e);
                false
            }
        }
    }
}

#[async_trait]
impl PermissionChecker for PolicyServiceClient {
    async fn has_permission_to_team(&self, user_id: &str, team_id: &str, permission: Permission) -> bool {
        self.check(user_id, "team", team_id, permission).await
    }

    async fn has_permission_to_board(&self, user_id: &str, board_id: &str, permission: Permission) -> bool {
        self.check(user_id, "board", board_id, permission).await
    }
}
