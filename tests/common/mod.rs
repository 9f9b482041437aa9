#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{header, StatusCode};
use serde_json::{json, Value};

pub const TOKEN: &str = "integration-single-user-token";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Memory backend and single-user session keep the server self-contained
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_boards-api"));
        cmd.env("BOARDS_API_PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("STORAGE_BACKEND", "memory")
            .env("SINGLE_USER_TOKEN", TOKEN)
            .env("POLICY_SERVICE_URL", "")
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Client that sends the single-user token and the CSRF header on every request.
pub fn api_client() -> Result<reqwest::Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", TOKEN))?,
    );
    headers.insert("X-Requested-With", header::HeaderValue::from_static("XMLHttpRequest"));
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

/// One board with a view, a card and a text block under the card. Ids are
/// placeholders local to the request.
pub fn sample_bundle(team_id: &str) -> Value {
    json!({
        "boards": [{ "id": "board-1", "teamId": team_id, "type": "O", "title": "Roadmap" }],
        "blocks": [
            { "id": "view-1", "boardId": "board-1", "parentId": "board-1", "type": "view", "title": "All cards",
              "createAt": 1, "updateAt": 1, "fields": { "cardOrder": ["card-1"] } },
            { "id": "card-1", "boardId": "board-1", "parentId": "board-1", "type": "card", "title": "First",
              "createAt": 1, "updateAt": 1, "fields": { "contentOrder": ["text-1"] } },
            { "id": "text-1", "boardId": "board-1", "parentId": "card-1", "type": "text", "title": "Hello",
              "createAt": 1, "updateAt": 1 }
        ]
    })
}

/// Creates the sample bundle and returns the server's response.
pub async fn create_sample(server: &TestServer, team_id: &str) -> Result<Value> {
    let res = api_client()?
        .post(server.url("/api/v1/boards-and-blocks"))
        .json(&sample_bundle(team_id))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "create failed: {}", res.status());
    Ok(res.json().await?)
}

/// Id of the first block of the given type in a list of blocks.
pub fn block_id_of_type(blocks: &Value, block_type: &str) -> Option<String> {
    blocks
        .as_array()?
        .iter()
        .find(|block| block["type"] == block_type)
        .and_then(|block| block["id"].as_str())
        .map(str::to_string)
}
