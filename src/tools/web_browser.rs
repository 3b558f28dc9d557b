//! WebBrowser 工具：抓取网页正文，供模型阅读文章类内容
//!
//! 对 HTML 响应用 html2text 提取可读文本（失败时回退到手写标签剥离）；
//! 结果超过 max_result_chars 时截断并追加 ... (content truncated)。

use std::collections::HashSet;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;

use crate::model::ToolName;
use crate::tools::{domain_allowed, truncate_chars, Tool};

pub struct WebBrowserTool {
    client: Client,
    allowed_domains: HashSet<String>,
    max_result_chars: usize,
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.contains('<') && (s.contains("</") || s.contains("<head") || s.contains("<title")))
}

impl WebBrowserTool {
    pub fn new(allowed_domains: Vec<String>, timeout_secs: u64, max_result_chars: usize) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/131.0.0.0 Safari/537.36",
            )
            .build()
            .unwrap_or_default();
        Self {
            client,
            allowed_domains: allowed_domains.into_iter().map(|d| d.to_lowercase()).collect(),
            max_result_chars,
        }
    }

    fn html_to_text(&self, html: &str) -> String {
        match from_read(html.as_bytes(), 120) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => strip_html_tags(html),
        }
    }
}

#[async_trait]
impl Tool for WebBrowserTool {
    fn name(&self) -> ToolName {
        ToolName::WebBrowser
    }

    fn description(&self) -> &str {
        "Get the main text content from a URL. Best for reading articles."
    }

    async fn execute(&self, arg: &str) -> Result<String, String> {
        let url = arg.trim();
        if url.is_empty() {
            return Err("Missing URL".to_string());
        }
        domain_allowed(&self.allowed_domains, url)?;

        tracing::info!(url = %url, "web browser tool fetch");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Could not retrieve content from {}: {}", url, e))?;

        if !resp.status().is_success() {
            return Err(format!(
                "Failed to fetch the webpage. Status: {}",
                resp.status()
            ));
        }

        let mut body = resp
            .text()
            .await
            .map_err(|e| format!("Failed to read body from {}: {}", url, e))?;

        // 去除 BOM，避免 HTML 检测失败
        if body.starts_with('\u{FEFF}') {
            body = body[1..].to_string();
        }

        let content = if looks_like_html(&body) {
            self.html_to_text(&body)
        } else {
            body
        };

        Ok(truncate_chars(
            content.trim(),
            self.max_result_chars,
            "... (content truncated)",
        ))
    }
}
