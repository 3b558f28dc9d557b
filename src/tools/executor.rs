//! 工具执行器
//!
//! 对每次调用施加统一超时；未注册、失败与超时都转为描述性 Observation
//! 文本返回，绝不向调用方抛错，保证 ReAct 循环始终能继续推进。
//! 每次调用输出一行结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::model::ToolName;
use crate::tools::ToolRegistry;

/// 工具执行器：never-throws 契约的唯一实现点
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具，返回 Observation 文本；任何失败路径都落在返回值里
    pub async fn execute(&self, tool: ToolName, arg: &str) -> String {
        let start = Instant::now();

        let Some(t) = self.registry.get(tool) else {
            return format!("Error: tool '{}' is not available in this deployment.", tool);
        };

        let result = timeout(self.timeout, t.execute(arg)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool.as_str(),
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "arg_preview": arg_preview(arg),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => format!("Error: {}", e),
            Err(_) => format!(
                "Error: tool '{}' timed out after {}s.",
                tool,
                self.timeout.as_secs()
            ),
        }
    }

    pub fn tool_names(&self) -> Vec<ToolName> {
        self.registry.tool_names()
    }
}

fn arg_preview(arg: &str) -> String {
    if arg.chars().count() > 200 {
        format!("{}...", arg.chars().take(200).collect::<String>())
    } else {
        arg.to_string()
    }
}
