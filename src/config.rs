//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖
//! （双下划线表示嵌套，如 `HIVE__LLM__MODEL=deepseek-chat`）。

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub library: LibrarySection,
}

/// [llm] 段：OpenAI 兼容端点与默认模型
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// OpenAI 兼容 base_url；未设置时用官方端点
    pub base_url: Option<String>,
    /// Agent 未指定模型时的默认模型
    pub model: String,
    /// API Key 所在环境变量名
    pub api_key_env: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "deepseek-chat".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// [tools] 段：超时、截断与域名白名单
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// HttpRequest / WebBrowser 域名白名单；为空表示不限制
    pub allowed_domains: Vec<String>,
    /// HttpRequest 响应最大字符数
    pub http_max_result_chars: usize,
    /// WebBrowser 正文最大字符数
    pub browser_max_result_chars: usize,
    /// CodeInterpreter 的解释器命令（如 ["node", "-e"]）；为空表示禁用
    pub interpreter_command: Vec<String>,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            allowed_domains: Vec::new(),
            http_max_result_chars: 3000,
            browser_max_result_chars: 4000,
            interpreter_command: Vec::new(),
        }
    }
}

/// [library] 段：用户自定义 Agent/Pipeline 的 JSON 库文件
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LibrarySection {
    pub path: Option<std::path::PathBuf>,
}

/// 加载配置；path 为 None 时读 config/default.toml（可缺失）
pub fn load_config(path: Option<&str>) -> Result<AppConfig, AgentError> {
    let file = path.unwrap_or("config/default.toml");
    let settings = config::Config::builder()
        .add_source(config::File::with_name(file).required(false))
        .add_source(config::Environment::with_prefix("HIVE").separator("__"))
        .build()
        .map_err(|e| AgentError::ConfigError(e.to_string()))?;

    settings
        .try_deserialize()
        .map_err(|e| AgentError::ConfigError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.model, "deepseek-chat");
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
        assert_eq!(cfg.tools.http_max_result_chars, 3000);
        assert!(cfg.tools.allowed_domains.is_empty());
        assert!(cfg.library.path.is_none());
    }
}
