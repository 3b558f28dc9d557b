//! Mock 文本生成客户端（用于测试，无需 API）
//!
//! 按脚本顺序逐条返回预置 completion，并记录每次收到的完整历史，
//! 便于断言 Observation 是否回注到了下一轮上下文。

use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{GroundedResult, Message, TextGenerator};
use crate::model::ModelParams;

/// 脚本化 Mock：依次弹出预置回复；脚本耗尽后返回固定 Final Answer
pub struct ScriptedGenerator {
    replies: Mutex<Vec<String>>,
    /// 每次 generate 收到的 (system, history) 快照
    calls: Mutex<Vec<(String, Vec<Message>)>>,
}

impl ScriptedGenerator {
    pub fn new<S: Into<String>>(replies: Vec<S>) -> Self {
        let mut replies: Vec<String> = replies.into_iter().map(Into::into).collect();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    /// 第 n 次调用收到的 (system, history) 快照
    pub fn call(&self, n: usize) -> Option<(String, Vec<Message>)> {
        self.calls.lock().expect("calls lock").get(n).cloned()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        system: &str,
        history: &[Message],
        _params: &ModelParams,
    ) -> Result<String, String> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((system.to_string(), history.to_vec()));
        let reply = self
            .replies
            .lock()
            .expect("replies lock")
            .pop()
            .unwrap_or_else(|| "Final Answer: (script exhausted)".to_string());
        Ok(reply)
    }

    async fn generate_grounded(&self, query: &str) -> Result<GroundedResult, String> {
        let text = self
            .generate("", &[Message::user(query)], &ModelParams::default())
            .await?;
        Ok(GroundedResult {
            text,
            sources: Vec::new(),
        })
    }
}

/// 始终失败的 Mock（LLM 故障路径测试用）
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(
        &self,
        _system: &str,
        _history: &[Message],
        _params: &ModelParams,
    ) -> Result<String, String> {
        Err("simulated LLM failure".to_string())
    }
}
