//! 文本生成服务抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 TextGenerator：generate 以完整对话历史
//! 调用模型；generate_grounded 供 GoogleSearch 工具使用，可返回引用来源
//! （核心除日志外不解析来源数据）。

use async_trait::async_trait;

use crate::model::ModelParams;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 搜索 grounding 的单条来源
#[derive(Clone, Debug)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// 带来源的生成结果（sources 可为空）
#[derive(Clone, Debug, Default)]
pub struct GroundedResult {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// 文本生成客户端 trait
///
/// history 为只增不减的对话历史；system 为空串时后端可省略 system 消息。
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 以 system + 完整历史调用模型，返回原始 completion 文本
    async fn generate(
        &self,
        system: &str,
        history: &[Message],
        params: &ModelParams,
    ) -> Result<String, String>;

    /// 带搜索 grounding 的单次生成（GoogleSearch 工具用）。
    /// 默认实现退化为普通 generate，来源列表为空。
    async fn generate_grounded(&self, query: &str) -> Result<GroundedResult, String> {
        let text = self
            .generate(
                "",
                &[Message::user(format!("Search for: {}", query))],
                &ModelParams::default(),
            )
            .await?;
        Ok(GroundedResult {
            text,
            sources: Vec::new(),
        })
    }
}
