//! HttpRequest 工具：GET 指定 URL 取回数据（API 响应等）
//!
//! 可选域名白名单（为空表示不限制）；非 2xx 与网络错误转为描述文本；
//! 响应超过 max_result_chars 时截断并追加 ... (truncated)。

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Client;

use crate::model::ToolName;
use crate::tools::{domain_allowed, truncate_chars, Tool};

pub struct HttpRequestTool {
    client: Client,
    allowed_domains: HashSet<String>,
    max_result_chars: usize,
}

impl HttpRequestTool {
    pub fn new(allowed_domains: Vec<String>, timeout_secs: u64, max_result_chars: usize) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("hive-agent/0.1")
            .build()
            .unwrap_or_default();
        Self {
            client,
            allowed_domains: allowed_domains.into_iter().map(|d| d.to_lowercase()).collect(),
            max_result_chars,
        }
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> ToolName {
        ToolName::HttpRequest
    }

    fn description(&self) -> &str {
        "Make a GET request to a URL to fetch data, e.g., from an API."
    }

    async fn execute(&self, arg: &str) -> Result<String, String> {
        let url = arg.trim();
        if url.is_empty() {
            return Err("Missing URL".to_string());
        }
        domain_allowed(&self.allowed_domains, url)?;

        tracing::info!(url = %url, "http request tool fetch");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Failed to fetch from URL {}: {}", url, e))?;

        if !resp.status().is_success() {
            return Err(format!("Received status {} from {}", resp.status(), url));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| format!("Failed to read body from {}: {}", url, e))?;

        Ok(truncate_chars(&body, self.max_result_chars, "... (truncated)"))
    }
}
