//! 执行状态注册表
//!
//! (agent/pipeline id) -> 可观察执行状态 + 取消句柄。同一 id 至多一个
//! 在途运行（start 先取消旧句柄）；不同 id 的运行相互独立并发。
//! 步事件经 unbounded channel 依序写回状态，终态在通道完全清空后设置，
//! 观察者不会看到「已终态但步骤缺失」的中间态。每个状态条目由其当前
//! 运行独占写入，迟到的旧运行写入按运行代号丢弃。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::TextGenerator;
use crate::model::{AgentDef, PipelineDef};
use crate::pipeline::{run_pipeline, PipelineStep};
use crate::react::{run_react, ReActStep, ReactSession};
use crate::tools::ToolExecutor;

/// 用户取消时呈现的提示文本
pub const CANCELLED_MESSAGE: &str = "Execution stopped by user.";

/// 运行状态（UI 可见的全部）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ExecutionStatus {
    Running,
    Success,
    Error,
    Cancelled,
}

/// 对话角色（Agent 运行历史用）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ChatRole {
    User,
    Agent,
}

/// Agent 运行历史中的一轮
#[derive(Clone, Debug, Serialize)]
pub struct ChatTurn {
    pub id: String,
    pub role: ChatRole,
    /// User 轮为输入文本；Agent 轮为最终回答（运行中为空串）
    pub content: String,
    pub thinking_steps: Vec<ReActStep>,
}

impl ChatTurn {
    fn user(content: impl Into<String>) -> Self {
        Self {
            id: format!("turn_{}", uuid::Uuid::new_v4()),
            role: ChatRole::User,
            content: content.into(),
            thinking_steps: Vec::new(),
        }
    }

    fn agent() -> Self {
        Self {
            id: format!("turn_{}", uuid::Uuid::new_v4()),
            role: ChatRole::Agent,
            content: String::new(),
            thinking_steps: Vec::new(),
        }
    }
}

/// 运行历史：Agent 为对话轮序列，Pipeline 为节点步骤序列
#[derive(Clone, Debug, Serialize)]
pub enum ExecutionHistory {
    Agent(Vec<ChatTurn>),
    Pipeline {
        input: String,
        steps: Vec<PipelineStep>,
    },
}

/// 可观察的执行状态快照
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionState {
    pub status: ExecutionStatus,
    pub history: ExecutionHistory,
    pub error: Option<String>,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        self.status != ExecutionStatus::Running
    }

    /// Agent 运行的思考步（观察便捷入口；Pipeline 运行返回空）
    pub fn agent_steps(&self) -> Vec<ReActStep> {
        match &self.history {
            ExecutionHistory::Agent(turns) => turns
                .iter()
                .filter(|t| t.role == ChatRole::Agent)
                .flat_map(|t| t.thinking_steps.iter().cloned())
                .collect(),
            ExecutionHistory::Pipeline { .. } => Vec::new(),
        }
    }
}

struct ExecutionEntry {
    /// 当前运行的代号；旧运行的迟到写入据此丢弃
    run_id: u64,
    cancel: CancellationToken,
    state: ExecutionState,
}

/// 进程级执行注册表
///
/// 持有生成端与工具执行器；Agent/Pipeline 定义由调用方（库）按次传入，
/// 因为库内容可被用户编辑。
#[derive(Clone)]
pub struct ExecutionRegistry {
    inner: Arc<RwLock<HashMap<String, ExecutionEntry>>>,
    next_run_id: Arc<AtomicU64>,
    generator: Arc<dyn TextGenerator>,
    executor: Arc<ToolExecutor>,
}

impl ExecutionRegistry {
    pub fn new(generator: Arc<dyn TextGenerator>, executor: Arc<ToolExecutor>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            next_run_id: Arc::new(AtomicU64::new(0)),
            generator,
            executor,
        }
    }

    /// 启动一次 Agent 运行；同 id 的旧运行先被取消并整体覆盖
    pub async fn start_agent_run(
        &self,
        agent: &AgentDef,
        all_agents: &[AgentDef],
        input: &str,
    ) {
        let item_id = agent.id.clone();
        let history = ExecutionHistory::Agent(vec![ChatTurn::user(input), ChatTurn::agent()]);
        let (run_id, cancel) = self.install_run(&item_id, history).await;

        let registry = self.clone();
        let generator = self.generator.clone();
        let executor = self.executor.clone();
        let agent = agent.clone();
        let all_agents = all_agents.to_vec();
        let input = input.to_string();
        let token = cancel.clone();

        tokio::spawn(async move {
            let (tx, mut rx) = mpsc::unbounded_channel::<ReActStep>();
            let engine = {
                let token = token.clone();
                tokio::spawn(async move {
                    let session = ReactSession {
                        generator,
                        executor: &executor,
                        all_agents: &all_agents,
                        cancel_token: token,
                        step_tx: Some(&tx),
                    };
                    run_react(&session, &agent, &input).await.map(|_| ())
                })
            };

            // 依序写回；engine 结束后 tx 关闭，recv 返回 None
            while let Some(step) = rx.recv().await {
                registry.append_agent_step(&item_id, run_id, step).await;
            }
            let outcome = match engine.await {
                Ok(result) => result,
                Err(e) => Err(AgentError::Internal(format!("agent engine task: {}", e))),
            };
            registry.finish(&item_id, run_id, outcome).await;
        });
    }

    /// 启动一次 Pipeline 运行；语义同 start_agent_run
    pub async fn start_pipeline_run(
        &self,
        pipeline: &PipelineDef,
        all_agents: &[AgentDef],
        input: &str,
    ) {
        let item_id = pipeline.id.clone();
        let history = ExecutionHistory::Pipeline {
            input: input.to_string(),
            steps: Vec::new(),
        };
        let (run_id, cancel) = self.install_run(&item_id, history).await;

        let registry = self.clone();
        let generator = self.generator.clone();
        let executor = self.executor.clone();
        let pipeline = pipeline.clone();
        let all_agents = all_agents.to_vec();
        let input = input.to_string();
        let token = cancel.clone();

        tokio::spawn(async move {
            let (tx, mut rx) = mpsc::unbounded_channel::<PipelineStep>();
            let engine = {
                let token = token.clone();
                tokio::spawn(async move {
                    run_pipeline(
                        &pipeline,
                        &input,
                        &all_agents,
                        generator,
                        &executor,
                        Some(&tx),
                        token,
                    )
                    .await
                    .map(|_| ())
                })
            };

            while let Some(step) = rx.recv().await {
                registry.append_pipeline_step(&item_id, run_id, step).await;
            }
            let outcome = match engine.await {
                Ok(result) => result,
                Err(e) => Err(AgentError::Internal(format!("pipeline engine task: {}", e))),
            };
            registry.finish(&item_id, run_id, outcome).await;
        });
    }

    /// 发出取消信号；不等待运行方观察到
    pub async fn stop(&self, item_id: &str) {
        let map = self.inner.read().await;
        if let Some(entry) = map.get(item_id) {
            entry.cancel.cancel();
            tracing::info!(item = %item_id, "stop requested");
        }
    }

    /// 当前状态快照
    pub async fn get(&self, item_id: &str) -> Option<ExecutionState> {
        self.inner.read().await.get(item_id).map(|e| e.state.clone())
    }

    /// 清除条目（对应的 agent/pipeline 被删除时调用）；在途运行一并取消
    pub async fn remove(&self, item_id: &str) {
        let mut map = self.inner.write().await;
        if let Some(entry) = map.remove(item_id) {
            entry.cancel.cancel();
        }
    }

    /// 取消旧运行并装入新运行条目，返回 (运行代号, 取消句柄)
    async fn install_run(
        &self,
        item_id: &str,
        history: ExecutionHistory,
    ) -> (u64, CancellationToken) {
        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let mut map = self.inner.write().await;
        if let Some(prev) = map.get(item_id) {
            prev.cancel.cancel();
        }
        map.insert(
            item_id.to_string(),
            ExecutionEntry {
                run_id,
                cancel: cancel.clone(),
                state: ExecutionState {
                    status: ExecutionStatus::Running,
                    history,
                    error: None,
                },
            },
        );
        (run_id, cancel)
    }

    async fn append_agent_step(&self, item_id: &str, run_id: u64, step: ReActStep) {
        let mut map = self.inner.write().await;
        let Some(entry) = map.get_mut(item_id) else {
            return;
        };
        if entry.run_id != run_id {
            return;
        }
        if let ExecutionHistory::Agent(turns) = &mut entry.state.history {
            if let Some(turn) = turns.iter_mut().rev().find(|t| t.role == ChatRole::Agent) {
                if let Some(answer) = &step.final_answer {
                    turn.content = answer.clone();
                }
                turn.thinking_steps.push(step);
            }
        }
    }

    async fn append_pipeline_step(&self, item_id: &str, run_id: u64, step: PipelineStep) {
        let mut map = self.inner.write().await;
        let Some(entry) = map.get_mut(item_id) else {
            return;
        };
        if entry.run_id != run_id {
            return;
        }
        if let ExecutionHistory::Pipeline { steps, .. } = &mut entry.state.history {
            steps.push(step);
        }
    }

    async fn finish(&self, item_id: &str, run_id: u64, outcome: Result<(), AgentError>) {
        let mut map = self.inner.write().await;
        let Some(entry) = map.get_mut(item_id) else {
            return;
        };
        if entry.run_id != run_id {
            return;
        }
        match outcome {
            Ok(()) => {
                entry.state.status = ExecutionStatus::Success;
            }
            Err(e) if e.is_cancelled() => {
                entry.state.status = ExecutionStatus::Cancelled;
                entry.state.error = Some(CANCELLED_MESSAGE.to_string());
            }
            Err(e) => {
                tracing::warn!(item = %item_id, error = %e, "run failed");
                entry.state.status = ExecutionStatus::Error;
                entry.state.error = Some(e.to_string());
            }
        }
    }
}
