//! Hive - Rust 多智能体编排系统
//!
//! 无界面 CLI 宿主：加载定义库，经 ExecutionRegistry 启动一次
//! Agent / Pipeline 运行，轮询执行状态把步骤打印到终端；
//! Ctrl-C 发出取消信号，等待运行方协作式停止。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};

use hive::config::load_config;
use hive::core::{ExecutionHistory, ExecutionRegistry, ExecutionStatus};
use hive::library::Library;
use hive::llm::{OpenAiGenerator, TextGenerator};
use hive::react::ReActStep;
use hive::tools::{
    CodeInterpreterTool, GoogleSearchTool, HttpRequestTool, ToolExecutor, ToolRegistry,
    WebBrowserTool,
};

const USAGE: &str = "Usage:
  hive list
  hive agent <id-or-name> <input>
  hive pipeline <id-or-name> <input>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg = load_config(None).context("Failed to load config")?;

    let library = match &cfg.library.path {
        Some(path) => Library::load(path).context("Failed to load library file")?,
        None => Library::builtin(),
    };

    match args.first().map(String::as_str) {
        Some("list") => {
            println!("Agents:");
            for a in library.agents() {
                println!("  {:<40} {}", a.id, a.name);
            }
            println!("Pipelines:");
            for p in library.pipelines() {
                println!("  {:<40} {}", p.id, p.name);
            }
            Ok(())
        }
        Some(kind @ ("agent" | "pipeline")) => {
            let (Some(key), Some(input)) = (args.get(1), args.get(2)) else {
                bail!(USAGE);
            };
            run(kind, key, input, &cfg, &library).await
        }
        _ => bail!(USAGE),
    }
}

async fn run(
    kind: &str,
    key: &str,
    input: &str,
    cfg: &hive::config::AppConfig,
    library: &Library,
) -> anyhow::Result<()> {
    let api_key = std::env::var(&cfg.llm.api_key_env).ok();
    let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        api_key.as_deref(),
    ));

    let mut tools = ToolRegistry::new();
    tools.register(GoogleSearchTool::new(generator.clone()));
    tools.register(HttpRequestTool::new(
        cfg.tools.allowed_domains.clone(),
        cfg.tools.tool_timeout_secs,
        cfg.tools.http_max_result_chars,
    ));
    tools.register(WebBrowserTool::new(
        cfg.tools.allowed_domains.clone(),
        cfg.tools.tool_timeout_secs,
        cfg.tools.browser_max_result_chars,
    ));
    tools.register(CodeInterpreterTool::new(
        cfg.tools.interpreter_command.clone(),
        cfg.tools.tool_timeout_secs,
        cfg.tools.browser_max_result_chars,
    ));
    let executor = Arc::new(ToolExecutor::new(tools, cfg.tools.tool_timeout_secs));

    let registry = ExecutionRegistry::new(generator, executor);
    let all_agents = library.agents().to_vec();

    let item_id = match kind {
        "agent" => {
            let agent = library
                .resolve_agent(key)
                .with_context(|| format!("No agent matches '{}'", key))?;
            println!("[{}] {}", agent.name, input);
            registry.start_agent_run(agent, &all_agents, input).await;
            agent.id.clone()
        }
        _ => {
            let pipeline = library
                .resolve_pipeline(key)
                .with_context(|| format!("No pipeline matches '{}'", key))?;
            println!("[{}] {}", pipeline.name, input);
            registry.start_pipeline_run(pipeline, &all_agents, input).await;
            pipeline.id.clone()
        }
    };

    observe(&registry, &item_id).await
}

/// 轮询执行状态，增量打印步骤；Ctrl-C 触发协作式取消
async fn observe(registry: &ExecutionRegistry, item_id: &str) -> anyhow::Result<()> {
    let mut printed_steps = 0;
    let mut printed_nodes = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nStopping...");
                registry.stop(item_id).await;
            }
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
        }

        let Some(state) = registry.get(item_id).await else {
            bail!("Execution state disappeared for '{}'", item_id);
        };

        match &state.history {
            ExecutionHistory::Agent(_) => {
                let steps = state.agent_steps();
                for step in steps.iter().skip(printed_steps) {
                    print_step(step, "");
                }
                printed_steps = steps.len();
            }
            ExecutionHistory::Pipeline { steps, .. } => {
                for step in steps.iter().skip(printed_nodes) {
                    println!("=== Node {} ({}) ===", step.node_id, step.agent_name);
                    for s in &step.steps {
                        print_step(s, "  ");
                    }
                    println!("  Output: {}", step.output);
                }
                printed_nodes = steps.len();
            }
        }

        if state.is_terminal() {
            match state.status {
                ExecutionStatus::Success => println!("\nDone."),
                ExecutionStatus::Cancelled => {
                    println!("\n{}", state.error.unwrap_or_else(|| "Cancelled.".to_string()))
                }
                ExecutionStatus::Error => {
                    bail!(state.error.unwrap_or_else(|| "Unknown error".to_string()))
                }
                ExecutionStatus::Running => unreachable!(),
            }
            return Ok(());
        }
    }
}

fn print_step(step: &ReActStep, indent: &str) {
    println!("{}Thought: {}", indent, step.thought);
    if let Some(action) = &step.action {
        println!("{}Action: {}", indent, action);
    }
    if let Some(observation) = &step.observation {
        println!("{}Observation: {}", indent, observation);
    }
    if let Some(final_answer) = &step.final_answer {
        println!("{}Final Answer: {}", indent, final_answer);
    }
}
