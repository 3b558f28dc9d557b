//! Pipeline 调度器
//!
//! 按拓扑序严格串行执行节点（不做分支内并行，保证确定的读后写链与
//! 有界资源占用）；多父输出聚合为按边序编号的小节；每个节点的取消
//! 检查发生在节点启动前，已记录的步在取消后保持原样。

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::TextGenerator;
use crate::model::{AgentDef, PipelineDef};
use crate::pipeline::PipelineGraph;
use crate::react::{run_react, ReActStep, ReactSession};
use crate::tools::ToolExecutor;

/// 一个节点执行完毕产出的记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineStep {
    pub node_id: String,
    pub agent_id: String,
    pub agent_name: String,
    /// 该节点实际收到的输入（聚合后的文本）
    pub input: String,
    /// 该节点 Agent 的最终回答
    pub output: String,
    /// 节点内部的 ReAct 步（含终态步）
    pub steps: Vec<ReActStep>,
}

/// 执行一条 Pipeline，返回拓扑序最后一个节点的输出
///
/// 环在任何节点运行前即失败；节点引用的 Agent 缺失在该节点处失败；
/// 取消沿用 ReAct 循环的同一信号。
pub async fn run_pipeline(
    pipeline: &PipelineDef,
    initial_input: &str,
    all_agents: &[AgentDef],
    generator: Arc<dyn TextGenerator>,
    executor: &ToolExecutor,
    step_tx: Option<&mpsc::UnboundedSender<PipelineStep>>,
    cancel_token: CancellationToken,
) -> Result<String, AgentError> {
    if pipeline.nodes.is_empty() {
        return Err(AgentError::EmptyPipeline);
    }

    let graph = PipelineGraph::new(&pipeline.nodes, &pipeline.edges);
    let order = graph.topological_order()?;

    let nodes_by_id: HashMap<&str, &crate::model::PipelineNode> = pipeline
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n))
        .collect();

    tracing::info!(pipeline = %pipeline.name, nodes = order.len(), "pipeline run start");

    let mut outputs: HashMap<String, String> = HashMap::new();
    let mut last_output = initial_input.to_string();

    for node_id in &order {
        if cancel_token.is_cancelled() {
            tracing::info!(pipeline = %pipeline.name, node = %node_id, "pipeline run cancelled");
            return Err(AgentError::Cancelled);
        }

        let node = nodes_by_id
            .get(node_id.as_str())
            .expect("topological order only contains declared nodes");
        let agent = all_agents
            .iter()
            .find(|a| a.id == node.agent_id)
            .ok_or_else(|| AgentError::AgentNotFound(node.agent_id.clone()))?;

        let input = gather_node_input(pipeline, all_agents, node_id, &outputs, initial_input);

        let session = ReactSession {
            generator: generator.clone(),
            executor,
            all_agents,
            cancel_token: cancel_token.clone(),
            step_tx: None,
        };
        let result = run_react(&session, agent, &input).await?;

        let step = PipelineStep {
            node_id: node_id.clone(),
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            input,
            output: result.answer.clone(),
            steps: result.steps,
        };
        if let Some(tx) = step_tx {
            let _ = tx.send(step);
        }

        outputs.insert(node_id.clone(), result.answer.clone());
        last_output = result.answer;
    }

    Ok(last_output)
}

/// 聚合节点输入：无父用 Pipeline 原始输入；单父原样透传；
/// 多父按边声明顺序编号分节，并标注来源 Agent 名
fn gather_node_input(
    pipeline: &PipelineDef,
    all_agents: &[AgentDef],
    node_id: &str,
    outputs: &HashMap<String, String>,
    initial_input: &str,
) -> String {
    let parents: Vec<&crate::model::PipelineEdge> = pipeline
        .edges
        .iter()
        .filter(|e| e.target == node_id && outputs.contains_key(&e.source))
        .collect();

    match parents.len() {
        0 => initial_input.to_string(),
        1 => outputs[&parents[0].source].clone(),
        n => {
            let mut input = format!(
                "You have received {} inputs from upstream agents. \
                 Use all of them to fulfil your task.",
                n
            );
            for (i, edge) in parents.iter().enumerate() {
                let source_name = pipeline
                    .nodes
                    .iter()
                    .find(|node| node.id == edge.source)
                    .and_then(|node| all_agents.iter().find(|a| a.id == node.agent_id))
                    .map(|a| a.name.clone())
                    .unwrap_or_else(|| edge.source.clone());
                input.push_str(&format!(
                    "\n\n--- Input {} (from {}) ---\n{}",
                    i + 1,
                    source_name,
                    outputs[&edge.source]
                ));
            }
            input
        }
    }
}
