//! CodeInterpreter 工具：将代码片段交给配置的解释器命令执行
//!
//! 沙箱边界是配置中的解释器命令（如 ["node", "-e"] 或 ["python3", "-c"]）；
//! 未配置时拒绝执行。带超时，stdout/stderr 合并为 Observation，超长截断。

use async_trait::async_trait;
use tokio::process::Command;

use crate::model::ToolName;
use crate::tools::{truncate_chars, Tool};

pub struct CodeInterpreterTool {
    /// 解释器命令与前置参数，代码片段作为最后一个参数追加
    interpreter: Vec<String>,
    timeout_secs: u64,
    max_result_chars: usize,
}

impl CodeInterpreterTool {
    pub fn new(interpreter: Vec<String>, timeout_secs: u64, max_result_chars: usize) -> Self {
        Self {
            interpreter,
            timeout_secs,
            max_result_chars,
        }
    }
}

#[async_trait]
impl Tool for CodeInterpreterTool {
    fn name(&self) -> ToolName {
        ToolName::CodeInterpreter
    }

    fn description(&self) -> &str {
        "Execute a snippet of code with the configured interpreter."
    }

    async fn execute(&self, arg: &str) -> Result<String, String> {
        let snippet = arg.trim();
        if snippet.is_empty() {
            return Err("Missing code snippet".to_string());
        }
        let Some((program, prefix_args)) = self.interpreter.split_first() else {
            return Err("Code interpreter is not configured on this deployment".to_string());
        };

        tracing::info!(interpreter = %program, chars = snippet.len(), "code interpreter execute");

        let mut cmd = Command::new(program);
        cmd.args(prefix_args).arg(snippet);

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            cmd.output(),
        )
        .await
        .map_err(|_| format!("Execution timed out after {}s", self.timeout_secs))?
        .map_err(|e| format!("during execution: {}", e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(format!(
                "during execution: exit {:?}\nstderr: {}",
                output.status,
                stderr.trim()
            ));
        }

        let combined = if stderr.trim().is_empty() {
            format!("Execution result: {}", stdout.trim())
        } else {
            format!(
                "Execution result: {}\nstderr: {}",
                stdout.trim(),
                stderr.trim()
            )
        };
        Ok(truncate_chars(&combined, self.max_result_chars, "... (truncated)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_interpreter_rejects() {
        let tool = CodeInterpreterTool::new(vec![], 5, 4000);
        let err = tool.execute("1 + 1").await.unwrap_err();
        assert!(err.contains("not configured"));
    }

    #[tokio::test]
    async fn test_runs_snippet_through_shell_interpreter() {
        // sh 在测试环境总是可用，用它替代 node/python 验证管线
        let tool = CodeInterpreterTool::new(
            vec!["sh".to_string(), "-c".to_string()],
            5,
            4000,
        );
        let obs = tool.execute("echo $((1024 * 768))").await.unwrap();
        assert!(obs.contains("786432"));
    }
}
