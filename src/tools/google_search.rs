//! GoogleSearch 工具：借助生成端的搜索 grounding 能力查询即时信息
//!
//! 有来源元数据时格式化为来源清单（前 5 条）；否则直接返回模型文本。
//! 来源数据仅用于展示与日志，核心不做进一步解析。

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::TextGenerator;
use crate::model::ToolName;
use crate::tools::Tool;

pub struct GoogleSearchTool {
    generator: Arc<dyn TextGenerator>,
}

impl GoogleSearchTool {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Tool for GoogleSearchTool {
    fn name(&self) -> ToolName {
        ToolName::GoogleSearch
    }

    fn description(&self) -> &str {
        "Search Google for up-to-date information."
    }

    async fn execute(&self, arg: &str) -> Result<String, String> {
        let query = arg.trim();
        if query.is_empty() {
            return Err("Missing search query".to_string());
        }

        tracing::info!(query = %query, "google search tool");

        let result = self
            .generator
            .generate_grounded(query)
            .await
            .map_err(|e| format!("during search: {}", e))?;

        if !result.sources.is_empty() {
            tracing::debug!(sources = result.sources.len(), "grounding sources returned");
            let listing = result
                .sources
                .iter()
                .take(5)
                .map(|s| format!("- Title: {}\n  URI: {}", s.title, s.uri))
                .collect::<Vec<_>>()
                .join("\n\n");
            return Ok(format!("Found sources:\n{}", listing));
        }

        if !result.text.trim().is_empty() {
            return Ok(result.text);
        }

        Ok("No relevant information found from Google Search.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GroundedResult, GroundingSource, Message};
    use crate::model::ModelParams;

    struct GroundedMock;

    #[async_trait]
    impl TextGenerator for GroundedMock {
        async fn generate(
            &self,
            _system: &str,
            _history: &[Message],
            _params: &ModelParams,
        ) -> Result<String, String> {
            Ok(String::new())
        }

        async fn generate_grounded(&self, _query: &str) -> Result<GroundedResult, String> {
            Ok(GroundedResult {
                text: "summary".to_string(),
                sources: vec![
                    GroundingSource {
                        title: "Rust Blog".to_string(),
                        uri: "https://blog.rust-lang.org".to_string(),
                    },
                    GroundingSource {
                        title: "Release Notes".to_string(),
                        uri: "https://doc.rust-lang.org/releases".to_string(),
                    },
                ],
            })
        }
    }

    #[tokio::test]
    async fn test_sources_formatted_as_listing() {
        let tool = GoogleSearchTool::new(Arc::new(GroundedMock));
        let obs = tool.execute("rust release").await.unwrap();
        assert!(obs.starts_with("Found sources:"));
        assert!(obs.contains("- Title: Rust Blog"));
        assert!(obs.contains("URI: https://blog.rust-lang.org"));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let tool = GoogleSearchTool::new(Arc::new(GroundedMock));
        assert!(tool.execute("   ").await.is_err());
    }
}
