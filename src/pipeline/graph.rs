//! Pipeline 依赖图
//!
//! 邻接表 + 入度表实现 Kahn 拓扑排序；排序遗漏节点即存在环，
//! 运行前快速失败。排序结果对同一输入可复现（按节点/边的声明顺序）。

use std::collections::{HashMap, VecDeque};

use crate::core::AgentError;
use crate::model::{PipelineEdge, PipelineNode};

/// Pipeline 依赖图
pub struct PipelineGraph {
    /// 节点声明顺序（保证排序可复现）
    node_order: Vec<String>,
    /// 邻接表：节点 -> 后继节点（按边声明顺序）
    adjacency: HashMap<String, Vec<String>>,
    /// 入度表：节点 -> 未满足的前驱数
    in_degree: HashMap<String, usize>,
}

impl PipelineGraph {
    pub fn new(nodes: &[PipelineNode], edges: &[PipelineEdge]) -> Self {
        let mut node_order = Vec::with_capacity(nodes.len());
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        let mut in_degree: HashMap<String, usize> = HashMap::new();

        for node in nodes {
            node_order.push(node.id.clone());
            adjacency.entry(node.id.clone()).or_default();
            in_degree.entry(node.id.clone()).or_insert(0);
        }

        for edge in edges {
            if !in_degree.contains_key(&edge.source) || !in_degree.contains_key(&edge.target) {
                tracing::warn!(edge = %edge.id, "edge references unknown node, ignored");
                continue;
            }
            adjacency
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
            *in_degree.entry(edge.target.clone()).or_insert(0) += 1;
        }

        Self {
            node_order,
            adjacency,
            in_degree,
        }
    }

    /// Kahn 拓扑排序；遗漏任何节点说明图含环
    pub fn topological_order(&self) -> Result<Vec<String>, AgentError> {
        let mut in_degree = self.in_degree.clone();
        let mut ready: VecDeque<String> = self
            .node_order
            .iter()
            .filter(|id| in_degree.get(*id).copied() == Some(0))
            .cloned()
            .collect();
        let mut order = Vec::with_capacity(self.node_order.len());

        while let Some(id) = ready.pop_front() {
            if let Some(successors) = self.adjacency.get(&id) {
                for succ in successors {
                    if let Some(degree) = in_degree.get_mut(succ) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push_back(succ.clone());
                        }
                    }
                }
            }
            order.push(id);
        }

        if order.len() != self.node_order.len() {
            return Err(AgentError::PipelineCycle);
        }
        Ok(order)
    }
}
