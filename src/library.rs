//! Agent / Pipeline 定义库
//!
//! 内置一组预定义 Agent 与示例 Pipeline，并支持从 JSON 库文件加载
//! 用户自定义项。删除 Agent 时同步剥离 Meta Agent 的 sub_agent_ids
//! 引用与 Pipeline 中引用该 Agent 的节点及其关联边，避免悬空 id。

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::model::{AgentDef, ModelParams, PipelineDef, PipelineEdge, PipelineNode, Position, ToolConfig, ToolName};

/// JSON 库文件的顶层结构
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LibraryFile {
    #[serde(default)]
    pub agents: Vec<AgentDef>,
    #[serde(default)]
    pub pipelines: Vec<PipelineDef>,
}

/// 定义库：执行核心的只读输入，编辑操作由宿主驱动
#[derive(Debug, Default)]
pub struct Library {
    agents: Vec<AgentDef>,
    pipelines: Vec<PipelineDef>,
}

impl Library {
    /// 内置预定义集合
    pub fn builtin() -> Self {
        let lib = Self {
            agents: builtin_agents(),
            pipelines: builtin_pipelines(),
        };
        debug_assert!(lib.validate().is_ok());
        lib
    }

    /// 从 JSON 文件加载；文件内容附加在内置集合之后
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AgentError::LibraryError(format!("read {:?}: {}", path.as_ref(), e)))?;
        let file: LibraryFile = serde_json::from_str(&raw)
            .map_err(|e| AgentError::LibraryError(format!("parse library JSON: {}", e)))?;

        let mut lib = Self::builtin();
        lib.agents.extend(file.agents);
        lib.pipelines.extend(file.pipelines);
        lib.validate()?;
        Ok(lib)
    }

    /// 不变量校验：id 唯一；Meta Agent 不引用自身且子 Agent 均存在
    pub fn validate(&self) -> Result<(), AgentError> {
        let mut seen = std::collections::HashSet::new();
        for a in &self.agents {
            if !seen.insert(a.id.as_str()) {
                return Err(AgentError::LibraryError(format!(
                    "duplicate agent id: {}",
                    a.id
                )));
            }
            if a.sub_agent_ids.contains(&a.id) {
                return Err(AgentError::LibraryError(format!(
                    "agent '{}' lists itself as a sub-agent",
                    a.id
                )));
            }
            for sub in &a.sub_agent_ids {
                if !self.agents.iter().any(|other| &other.id == sub) {
                    return Err(AgentError::LibraryError(format!(
                        "agent '{}' references unknown sub-agent '{}'",
                        a.id, sub
                    )));
                }
            }
        }
        let mut seen = std::collections::HashSet::new();
        for p in &self.pipelines {
            if !seen.insert(p.id.as_str()) {
                return Err(AgentError::LibraryError(format!(
                    "duplicate pipeline id: {}",
                    p.id
                )));
            }
        }
        Ok(())
    }

    pub fn agents(&self) -> &[AgentDef] {
        &self.agents
    }

    pub fn pipelines(&self) -> &[PipelineDef] {
        &self.pipelines
    }

    pub fn agent(&self, id: &str) -> Option<&AgentDef> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn pipeline(&self, id: &str) -> Option<&PipelineDef> {
        self.pipelines.iter().find(|p| p.id == id)
    }

    /// 按 id 或名称查找（CLI 便捷入口）
    pub fn resolve_agent(&self, key: &str) -> Option<&AgentDef> {
        self.agent(key)
            .or_else(|| self.agents.iter().find(|a| a.name == key))
    }

    pub fn resolve_pipeline(&self, key: &str) -> Option<&PipelineDef> {
        self.pipeline(key)
            .or_else(|| self.pipelines.iter().find(|p| p.name == key))
    }

    /// 删除 Agent，并剥离所有对它的引用（Meta 子列表、Pipeline 节点与关联边）。
    /// 返回是否确实删除了条目；调用方应同步清除其执行状态。
    pub fn remove_agent(&mut self, id: &str) -> bool {
        let before = self.agents.len();
        self.agents.retain(|a| a.id != id);
        if self.agents.len() == before {
            return false;
        }

        for a in &mut self.agents {
            a.sub_agent_ids.retain(|sub| sub != id);
        }
        for p in &mut self.pipelines {
            let removed_nodes: Vec<String> = p
                .nodes
                .iter()
                .filter(|n| n.agent_id == id)
                .map(|n| n.id.clone())
                .collect();
            p.nodes.retain(|n| n.agent_id != id);
            p.edges
                .retain(|e| !removed_nodes.contains(&e.source) && !removed_nodes.contains(&e.target));
        }
        true
    }

    pub fn remove_pipeline(&mut self, id: &str) -> bool {
        let before = self.pipelines.len();
        self.pipelines.retain(|p| p.id != id);
        self.pipelines.len() != before
    }
}

fn default_tools(enabled: &[ToolName]) -> Vec<ToolConfig> {
    vec![
        tool_config(ToolName::GoogleSearch, "Search Google for up-to-date information.", enabled),
        tool_config(
            ToolName::HttpRequest,
            "Make a GET request to a URL to fetch data, e.g., from an API.",
            enabled,
        ),
        tool_config(
            ToolName::CodeInterpreter,
            "Execute a snippet of code with the configured interpreter.",
            enabled,
        ),
        tool_config(
            ToolName::WebBrowser,
            "Get the main text content from a URL. Best for reading articles.",
            enabled,
        ),
    ]
}

fn tool_config(name: ToolName, description: &str, enabled: &[ToolName]) -> ToolConfig {
    ToolConfig {
        name,
        enabled: enabled.contains(&name),
        description: description.to_string(),
    }
}

fn builtin_agents() -> Vec<AgentDef> {
    vec![
        AgentDef {
            id: "agent-researcher-1".to_string(),
            name: "Web Researcher".to_string(),
            description: "An expert researcher that uses web search to find information and then \
                          reads the content of webpages."
                .to_string(),
            instruction: "You are a world-class researcher. Your goal is to answer user queries \
with the most up-to-date information from the web.

Your process:
1. Search: use the 'GoogleSearch' tool to find relevant URLs for the user's query.
2. Read: choose the most promising URL and use the 'WebBrowser' tool to read its content.
3. Synthesize: formulate a comprehensive answer from what you read.

Do not provide a final answer until you have gathered sufficient information from your tools.

Your response format MUST be:
Thought: [Your reasoning for the action]
Action: [ToolName(args)]

After the observation, you can either perform another action or provide the final answer.
Final Answer: [Your conclusive, well-supported response]"
                .to_string(),
            tools: default_tools(&[ToolName::GoogleSearch, ToolName::WebBrowser]),
            files: vec![],
            is_meta: false,
            sub_agent_ids: vec![],
            params: ModelParams {
                temperature: 0.3,
                max_output_tokens: 2048,
                ..Default::default()
            },
        },
        AgentDef {
            id: "agent-cot-math-3".to_string(),
            name: "Math Tutor".to_string(),
            description: "A math tutor that solves problems step-by-step using Chain of Thought."
                .to_string(),
            instruction: "You are a math tutor. Your task is to solve the user's math problem.
- Do not use any tools.
- Think step-by-step and show your work clearly before providing the final answer.
- Your final response to the user MUST be formatted as:
Final Answer: [Your final calculated answer]"
                .to_string(),
            tools: default_tools(&[]),
            files: vec![],
            is_meta: false,
            sub_agent_ids: vec![],
            params: ModelParams {
                temperature: 0.2,
                max_output_tokens: 1024,
                ..Default::default()
            },
        },
        AgentDef {
            id: "agent-crypto-6".to_string(),
            name: "Crypto Price Checker".to_string(),
            description: "Fetches the latest price for cryptocurrencies using the CoinGecko API."
                .to_string(),
            instruction: "You are a cryptocurrency price assistant. Use the 'HttpRequest' tool to \
call the public CoinGecko API:
`https://api.coingecko.com/api/v3/simple/price?ids=<CRYPTO_NAME>&vs_currencies=<TARGET_CURRENCY>`

Example:
Thought: I need the price of ethereum in eur.
Action: HttpRequest(\"https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=eur\")

You must use the tool to get real-time data. Do not make up prices.

Your final response to the user MUST be formatted as:
Final Answer: [Your final answer with the price]"
                .to_string(),
            tools: default_tools(&[ToolName::HttpRequest]),
            files: vec![],
            is_meta: false,
            sub_agent_ids: vec![],
            params: ModelParams {
                temperature: 0.1,
                max_output_tokens: 512,
                ..Default::default()
            },
        },
        AgentDef {
            id: "agent-ransomware-assessor-json-14".to_string(),
            name: "Ransomware Threat Assessor (JSON)".to_string(),
            description: "Identifies relevant ransomware threats based on company details and \
                          outputs the findings in JSON format."
                .to_string(),
            instruction: "You are a cybersecurity analyst specializing in ransomware threats. \
Identify ransomware groups that might target the described company profile and output your \
findings as a single JSON object with keys `assessed_profile` and `relevant_ransomware_groups`.

If the request lacks company details (sector, country, technologies), respond with:
Final Answer: { \"status\": \"INFORMATION_REQUIRED\", \"required_fields\": [\"company_sector\", \
\"country_of_operation\", \"key_technologies\", \"company_size\", \"high_value_data_types\"] }

Otherwise research with your tools first.

Your response format MUST be:
Thought: [Your reasoning for using a tool or for the final structure]
Action: [ToolName(args)]
...
Final Answer: [Your complete JSON object]"
                .to_string(),
            tools: default_tools(&[ToolName::GoogleSearch, ToolName::HttpRequest]),
            files: vec![],
            is_meta: false,
            sub_agent_ids: vec![],
            params: ModelParams {
                temperature: 0.1,
                max_output_tokens: 4096,
                ..Default::default()
            },
        },
        AgentDef {
            id: "agent-mitre-ttp-identifier-15".to_string(),
            name: "MITRE ATT&CK TTPs Identifier".to_string(),
            description: "Takes ransomware group names as input and finds their associated MITRE \
                          ATT&CK TTPs, outputting in JSON."
                .to_string(),
            instruction: "You are a cybersecurity analyst specializing in the MITRE ATT&CK \
framework. Extract every threat actor named in the input (plain text or JSON) and research each \
one with 'GoogleSearch' and 'WebBrowser' before answering. Consolidate your findings into a \
single JSON object with a `threat_actors` array of `{actor_name, ttps}` entries.

Your response format MUST be:
Thought: [Your reasoning for researching a specific actor]
Action: [ToolName(args)]
...
Final Answer: [Your complete JSON object after all research is done]"
                .to_string(),
            tools: default_tools(&[ToolName::GoogleSearch, ToolName::WebBrowser]),
            files: vec![],
            is_meta: false,
            sub_agent_ids: vec![],
            params: ModelParams {
                temperature: 0.1,
                max_output_tokens: 8192,
                ..Default::default()
            },
        },
        AgentDef {
            id: "agent-data-visualizer-16".to_string(),
            name: "Data Visualizer".to_string(),
            description: "Takes structured data (like JSON) and presents it in a clear, \
                          human-readable Markdown report."
                .to_string(),
            instruction: "You are an expert data analyst. Transform the structured data you \
receive into a rich, human-readable Markdown report: a high-level summary, key metrics, and \
well-structured tables. Do NOT add information not present in the input.

Your final output must be a single block of well-formatted Markdown.
Final Answer: [Your formatted Markdown report]"
                .to_string(),
            tools: default_tools(&[]),
            files: vec![],
            is_meta: false,
            sub_agent_ids: vec![],
            params: ModelParams {
                temperature: 0.1,
                max_output_tokens: 4096,
                ..Default::default()
            },
        },
    ]
}

fn builtin_pipelines() -> Vec<PipelineDef> {
    vec![PipelineDef {
        id: "pipeline-ttp-analysis-1".to_string(),
        name: "Ransomware Actor TTP Analysis".to_string(),
        description: "Identifies ransomware threats (JSON), finds their MITRE TTPs (JSON), then \
                      presents the final data in a readable format."
            .to_string(),
        nodes: vec![
            PipelineNode {
                id: "node-1".to_string(),
                agent_id: "agent-ransomware-assessor-json-14".to_string(),
                position: Position { x: 50.0, y: 150.0 },
            },
            PipelineNode {
                id: "node-2".to_string(),
                agent_id: "agent-mitre-ttp-identifier-15".to_string(),
                position: Position { x: 350.0, y: 150.0 },
            },
            PipelineNode {
                id: "node-3".to_string(),
                agent_id: "agent-data-visualizer-16".to_string(),
                position: Position { x: 650.0, y: 150.0 },
            },
        ],
        edges: vec![
            PipelineEdge {
                id: "edge-1-2".to_string(),
                source: "node-1".to_string(),
                target: "node-2".to_string(),
            },
            PipelineEdge {
                id: "edge-2-3".to_string(),
                source: "node-2".to_string(),
                target: "node-3".to_string(),
            },
        ],
    }]
}
