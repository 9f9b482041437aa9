use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;

/// Thin HTTP client for the `/api/v1` surface.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(server: &str, token: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: server.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url).header("X-Requested-With", "XMLHttpRequest");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute(&self, builder: RequestBuilder) -> anyhow::Result<Value> {
        let response = builder.send().await.context("request failed")?;
        let status = response.status();
        let text = response.text().await.context("failed to read response body")?;
        let body: Value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).with_context(|| format!("invalid JSON response: {}", text))?
        };

        if status.is_success() {
            return Ok(body);
        }

        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"));
        Err(anyhow!("{} ({})", message, status.as_u16()))
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> anyhow::Result<Value> {
        self.execute(self.request(Method::GET, path).query(query)).await
    }

    pub async fn send_json<T: Serialize + ?Sized>(&self, method: Method, path: &str, body: &T) -> anyhow::Result<Value> {
        self.execute(self.request(method, path).json(body)).await
    }

    pub async fn health(&self) -> anyhow::Result<Value> {
        self.execute(self.http.get(format!("{}/health", self.base_url))).await
    }
}
