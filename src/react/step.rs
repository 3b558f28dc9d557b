//! ReAct 单步记录
//!
//! 一次 Thought→Action→Observation 循环产出一条 ReActStep；带 final_answer
//! 的步为终态步，一次运行内恰好出现一条（被取消的运行除外）。

use serde::{Deserialize, Serialize};

/// 单步记录（运行内只追加）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReActStep {
    pub thought: String,
    /// 规范化后的动作文本，如 `GoogleSearch("rust 1.80")`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
}

impl ReActStep {
    /// 非终态步：动作 + 观察
    pub fn acted(
        thought: impl Into<String>,
        action: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            thought: thought.into(),
            action: Some(action.into()),
            observation: Some(observation.into()),
            final_answer: None,
        }
    }

    /// 非终态步：无动作，仅观察（纠错反馈）
    pub fn observed(thought: impl Into<String>, observation: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            action: None,
            observation: Some(observation.into()),
            final_answer: None,
        }
    }

    /// 终态步：最终回答
    pub fn terminal(thought: impl Into<String>, final_answer: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            action: None,
            observation: None,
            final_answer: Some(final_answer.into()),
        }
    }

    pub fn is_final(&self) -> bool {
        self.final_answer.is_some()
    }
}
