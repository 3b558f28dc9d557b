//! 数据模型：Agent、工具配置与 Pipeline 图
//!
//! 执行核心的只读输入，serde 可序列化。字段集对应 spec.md §3 /
//! SPEC_FULL.md「DATA MODEL」：Agent 定义、工具（带启用标志）、知识文件、
//! 模型参数，以及节点/边 + 布局坐标的 Pipeline 图。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 工具闭集合：解析出的 Action 名经 `FromStr` 映射到此枚举。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolName {
    GoogleSearch,
    HttpRequest,
    CodeInterpreter,
    WebBrowser,
}

impl ToolName {
    /// Action 语法与 `Display`/`FromStr` 共用的稳定字符串名。
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::GoogleSearch => "GoogleSearch",
            ToolName::HttpRequest => "HttpRequest",
            ToolName::CodeInterpreter => "CodeInterpreter",
            ToolName::WebBrowser => "WebBrowser",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 无法识别的工具名；由循环降级为纠错观察，不作致命错误。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownToolName(pub String);

impl fmt::Display for UnknownToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tool name: {}", self.0)
    }
}

impl std::error::Error for UnknownToolName {}

impl FromStr for ToolName {
    type Err = UnknownToolName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GoogleSearch" => Ok(ToolName::GoogleSearch),
            "HttpRequest" => Ok(ToolName::HttpRequest),
            "CodeInterpreter" => Ok(ToolName::CodeInterpreter),
            "WebBrowser" => Ok(ToolName::WebBrowser),
            other => Err(UnknownToolName(other.to_string())),
        }
    }
}

/// Agent 的单个工具配置：名称 + 是否启用 + 面向模型的描述。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: ToolName,
    pub enabled: bool,
    pub description: String,
}

impl ToolConfig {
    /// 启用态的工具配置。
    pub fn enabled(name: ToolName, description: impl Into<String>) -> Self {
        Self {
            name,
            enabled: true,
            description: description.into(),
        }
    }

    /// 停用态的工具配置。
    pub fn disabled(name: ToolName, description: impl Into<String>) -> Self {
        Self {
            name,
            enabled: false,
            description: description.into(),
        }
    }
}

/// 附加给 Agent 的知识文件；`content` 缺失表示二进制未内联。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeFile {
    pub name: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// 每次 LLM 调用的模型参数。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_output_tokens: u32,
}

/// Agent 定义：执行核心的只读输入。
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub instruction: String,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub files: Vec<KnowledgeFile>,
    #[serde(default)]
    pub is_meta: bool,
    #[serde(default)]
    pub sub_agent_ids: Vec<String>,
    #[serde(default)]
    pub params: ModelParams,
}

impl AgentDef {
    /// 启用工具的集合（解析出的工具名按此校验授权）。
    pub fn enabled_tools(&self) -> Vec<ToolName> {
        self.tools
            .iter()
            .filter(|t| t.enabled)
            .map(|t| t.name)
            .collect()
    }

    /// Meta 委派用的伪工具名：`Agent_<Sanitized_Name>`。
    /// 非字母数字字符替换为下划线，以便被 `Action: Name(args)` 语法解析。
    pub fn pseudo_tool_name(&self) -> String {
        let sanitized: String = self
            .name
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        format!("Agent_{}", sanitized)
    }
}

/// 节点在画布上的布局坐标。
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Pipeline 节点：绑定一个 Agent 与其布局位置。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineNode {
    pub id: String,
    pub agent_id: String,
    #[serde(default)]
    pub position: Position,
}

/// Pipeline 有向边：source → target（均为节点 id）。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Pipeline 定义：节点 + 边构成的有向无环图。
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PipelineDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nodes: Vec<PipelineNode>,
    #[serde(default)]
    pub edges: Vec<PipelineEdge>,
}
