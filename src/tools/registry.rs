//! 工具注册表
//!
//! 工具实现 Tool trait（name / description / execute），由 ToolRegistry
//! 按 ToolName 注册与查找；参数为 Action 括号内解包后的原始字符串。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::ToolName;

/// 工具 trait：封闭名称集合中的一个名字 + 描述 + 异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 执行工具；Err 由 ToolExecutor 统一转为 Observation 文本
    async fn execute(&self, arg: &str) -> Result<String, String>;
}

/// 工具注册表：按 ToolName 存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolName, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: ToolName) -> Option<Arc<dyn Tool>> {
        self.tools.get(&name).cloned()
    }

    pub fn tool_names(&self) -> Vec<ToolName> {
        self.tools.keys().copied().collect()
    }

    /// (name, description) 列表，用于生成提示词中的可用工具段落
    pub fn tool_descriptions(&self) -> Vec<(ToolName, String)> {
        self.tools
            .iter()
            .map(|(name, tool)| (*name, tool.description().to_string()))
            .collect()
    }
}
