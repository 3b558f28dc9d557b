//! 执行核心错误类型
//!
//! 只有取消与致命错误（LLM 调用失败、结构性 Pipeline 错误）会作为 Err 传播；
//! 解析失败、工具失败、未知工具/子 Agent 均在循环内转为 Observation 文本继续。

use thiserror::Error;

/// Agent / Pipeline 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(String),

    /// 用户主动取消；终态单独呈现，不按失败记录
    #[error("Execution cancelled")]
    Cancelled,

    /// Pipeline 图含环，运行前即失败
    #[error("Pipeline graph contains a cycle")]
    PipelineCycle,

    /// 节点引用的 Agent 不存在
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Pipeline has no nodes")]
    EmptyPipeline,

    #[error("Config error: {0}")]
    ConfigError(String),

    /// 引擎任务意外终止（panic 等），仅由注册表产生
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Library error: {0}")]
    LibraryError(String),
}

impl AgentError {
    /// 是否为取消（注册表据此区分 Cancelled 与 Error 终态）
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Cancelled)
    }
}
