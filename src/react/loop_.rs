//! ReAct 主循环
//!
//! Thought -> Action -> Observation 循环直至 Final Answer、步数耗尽或取消；
//! 支持 Meta Agent 向子 Agent 的递归委派（同一取消令牌贯穿全程）。
//! 工具失败、格式错误、未知工具/子 Agent 都转为 Observation 继续推进，
//! 只有取消与 LLM 调用失败会作为 Err 传出。

use std::sync::Arc;

use async_recursion::async_recursion;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::{Message, TextGenerator};
use crate::model::{AgentDef, ToolName};
use crate::react::{parse_completion, Directive, ReActStep};
use crate::tools::ToolExecutor;

/// 单次运行最大 ReAct 步数，防止死循环
pub const MAX_REACT_STEPS: usize = 10;

/// 子 Agent 委派最大递归深度，防止相互委派造成无限递归
const MAX_DELEGATION_DEPTH: usize = 4;

/// 格式纠错反馈：作为 Observation 回注，促使模型按约定输出
pub const CORRECTIVE_FEEDBACK: &str = "That was not a valid Action or Final Answer. You must use \
    the format 'Action: ToolName(args)' or 'Final Answer: [your answer]'. Please try again.";

/// 步数耗尽时的最终回答
pub const MAX_STEPS_ANSWER: &str =
    "I have reached the maximum number of steps and could not find a conclusive answer.";

/// ReAct 运行结果：最终回答与全部步骤（含终态步）
#[derive(Debug)]
pub struct ReactResult {
    pub answer: String,
    pub steps: Vec<ReActStep>,
}

/// ReAct 会话：生成端、工具执行器、可委派范围与取消令牌
pub struct ReactSession<'a> {
    pub generator: Arc<dyn TextGenerator>,
    pub executor: &'a ToolExecutor,
    /// 子 Agent 委派的解析范围（按伪工具名匹配）
    pub all_agents: &'a [AgentDef],
    pub cancel_token: CancellationToken,
    /// 可选：步事件推送；仅顶层运行的步会被推送，子 Agent 的步只被消费
    pub step_tx: Option<&'a mpsc::UnboundedSender<ReActStep>>,
}

/// system 指令：Agent instruction，Meta 时附子 Agent 伪工具清单
fn build_system_prompt(agent: &AgentDef, all_agents: &[AgentDef]) -> String {
    let mut system = agent.instruction.clone();
    if agent.is_meta && !agent.sub_agent_ids.is_empty() {
        system.push_str("\n\nYou can delegate work to the following sub-agents by calling them like tools:");
        for sub in all_agents
            .iter()
            .filter(|a| a.id != agent.id && agent.sub_agent_ids.contains(&a.id))
        {
            system.push_str(&format!(
                "\n- {}(input): {}",
                sub.pseudo_tool_name(),
                sub.description
            ));
        }
    }
    system
}

/// turn 0：日期行 + 知识文件 + 用户请求
fn build_initial_turn(agent: &AgentDef, user_input: &str) -> String {
    let today = chrono::Local::now().format("%Y-%m-%d");
    let mut turn = format!(
        "Current date is {}. You must use this date to interpret any time-relative queries \
         from the user (e.g., \"last week\", \"today\").",
        today
    );
    for file in &agent.files {
        match &file.content {
            Some(text) => {
                turn.push_str(&format!("\n\nAttached document '{}':\n{}", file.name, text));
            }
            None => {
                let mime = file.mime_type.as_deref().unwrap_or("unknown");
                turn.push_str(&format!(
                    "\n\nAttached document '{}' ({}) is binary and not inlined.",
                    file.name, mime
                ));
            }
        }
    }
    turn.push_str(&format!("\n\nHere is the user's request:\n{}", user_input));
    turn
}

/// 规范化动作文本：`Name("json 转义后的参数")`
fn format_action(name: &str, args: &str) -> String {
    format!(
        "{}({})",
        name,
        serde_json::Value::String(args.to_string())
    )
}

fn send_step(tx: &Option<&mpsc::UnboundedSender<ReActStep>>, step: &ReActStep) {
    if let Some(t) = tx {
        let _ = t.send(step.clone());
    }
}

/// 执行一次 Agent 运行
///
/// 终止于三种定义良好的结局：Final Answer、步数耗尽（带说明的最终回答，
/// 不算错误）、取消（Err(Cancelled)，已产出的步保持原样）。
pub async fn run_react(
    session: &ReactSession<'_>,
    agent: &AgentDef,
    user_input: &str,
) -> Result<ReactResult, AgentError> {
    run_react_inner(session, agent, user_input, 0).await
}

#[async_recursion]
async fn run_react_inner(
    session: &ReactSession<'_>,
    agent: &AgentDef,
    user_input: &str,
    depth: usize,
) -> Result<ReactResult, AgentError> {
    let system = build_system_prompt(agent, session.all_agents);
    let mut history = vec![Message::user(build_initial_turn(agent, user_input))];
    let mut steps: Vec<ReActStep> = Vec::new();
    let enabled = agent.enabled_tools();

    tracing::info!(agent = %agent.name, depth, "react run start");

    for cycle in 0..MAX_REACT_STEPS {
        // 协作式取消：只在循环边界检查；已产出的步保持不变，不追加额外步
        if session.cancel_token.is_cancelled() {
            tracing::info!(agent = %agent.name, cycle, "react run cancelled");
            return Err(AgentError::Cancelled);
        }

        let output = session
            .generator
            .generate(&system, &history, &agent.params)
            .await
            .map_err(AgentError::LlmError)?;

        // 在途调用期间到达的取消：完成的结果被丢弃，按取消上报
        if session.cancel_token.is_cancelled() {
            tracing::info!(agent = %agent.name, cycle, "in-flight completion discarded on cancel");
            return Err(AgentError::Cancelled);
        }
        history.push(Message::assistant(output.clone()));

        let parsed = parse_completion(&output);
        if let Directive::FinalAnswer(ref answer) = parsed.directive {
            let step = ReActStep::terminal(parsed.thought.clone(), answer.clone());
            if depth == 0 {
                send_step(&session.step_tx, &step);
            }
            steps.push(step);
            return Ok(ReactResult {
                answer: answer.clone(),
                steps,
            });
        }

        let (step, observation) = match parsed.directive {
            Directive::ToolCall { ref name, ref args } => {
                match name
                    .parse::<ToolName>()
                    .ok()
                    .filter(|t| enabled.contains(t))
                {
                    Some(tool) => {
                        let observation = session.executor.execute(tool, args).await;
                        let step = ReActStep::acted(
                            parsed.thought,
                            format_action(name, args),
                            observation.clone(),
                        );
                        (step, observation)
                    }
                    // 未知或未启用的工具与格式错误同样处理：回注纠错反馈
                    None => (
                        corrective_step(&output, &parsed.thought),
                        CORRECTIVE_FEEDBACK.to_string(),
                    ),
                }
            }
            Directive::SubAgentCall { ref name, ref args } if agent.is_meta => {
                let observation =
                    delegate_to_sub_agent(session, agent, name, args, depth).await?;
                let step = ReActStep::acted(
                    parsed.thought,
                    format_action(name, args),
                    observation.clone(),
                );
                (step, observation)
            }
            _ => (
                corrective_step(&output, &parsed.thought),
                CORRECTIVE_FEEDBACK.to_string(),
            ),
        };

        // 工具/委派的在途结果同样服从取消：未记录的步不再补记
        if session.cancel_token.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        if depth == 0 {
            send_step(&session.step_tx, &step);
        }
        steps.push(step);
        history.push(Message::user(format!("Observation: {}", observation)));
    }

    // 步数耗尽：按定义的终局返回，不作为错误
    tracing::info!(agent = %agent.name, max_steps = MAX_REACT_STEPS, "react budget exhausted");
    let step = ReActStep::terminal("Max steps reached.", MAX_STEPS_ANSWER);
    if depth == 0 {
        send_step(&session.step_tx, &step);
    }
    steps.push(step);
    Ok(ReactResult {
        answer: MAX_STEPS_ANSWER.to_string(),
        steps,
    })
}

/// 无效输出的非终态步：整条输出作为思考，固定纠错反馈作为观察
fn corrective_step(raw_output: &str, fallback_thought: &str) -> ReActStep {
    let thought = if raw_output.trim().is_empty() {
        fallback_thought.to_string()
    } else {
        raw_output.trim().to_string()
    };
    ReActStep::observed(thought, CORRECTIVE_FEEDBACK)
}

/// 子 Agent 委派：按伪工具名解析、校验授权，递归运行并取其最终回答作为观察。
/// 子 Agent 自身的中间步不上浮；取消在递归中照常传播。
async fn delegate_to_sub_agent(
    session: &ReactSession<'_>,
    agent: &AgentDef,
    pseudo_name: &str,
    args: &str,
    depth: usize,
) -> Result<String, AgentError> {
    let resolved = session
        .all_agents
        .iter()
        .find(|a| a.pseudo_tool_name() == pseudo_name);

    let sub = match resolved {
        Some(s) if s.id != agent.id && agent.sub_agent_ids.contains(&s.id) => s,
        Some(s) => {
            return Ok(format!(
                "Error: agent '{}' is not in this agent's permitted sub-agent list.",
                s.name
            ))
        }
        None => {
            return Ok(format!(
                "Error: no sub-agent matches '{}'. Use one of the listed Agent_ tools.",
                pseudo_name
            ))
        }
    };

    if depth + 1 >= MAX_DELEGATION_DEPTH {
        return Ok(format!(
            "Error: sub-agent delegation depth limit ({}) reached.",
            MAX_DELEGATION_DEPTH
        ));
    }

    tracing::info!(parent = %agent.name, sub = %sub.name, "delegating to sub-agent");
    match run_react_inner(session, sub, args, depth + 1).await {
        Ok(result) => Ok(result.answer),
        // 取消贯穿整棵委派树
        Err(AgentError::Cancelled) => Err(AgentError::Cancelled),
        // 子 Agent 的 LLM 故障不拖垮父运行，降级为观察文本
        Err(e) => Ok(format!("Error: sub-agent '{}' failed: {}", sub.name, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedGenerator;
    use crate::model::{ModelParams, ToolConfig};
    use crate::tools::{Tool, ToolRegistry};
    use async_trait::async_trait;

    struct FakeSearch;

    #[async_trait]
    impl Tool for FakeSearch {
        fn name(&self) -> ToolName {
            ToolName::GoogleSearch
        }
        fn description(&self) -> &str {
            "fake search"
        }
        async fn execute(&self, _arg: &str) -> Result<String, String> {
            Ok("MOCK RESULT".to_string())
        }
    }

    fn executor_with_fake_search() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(FakeSearch);
        ToolExecutor::new(registry, 5)
    }

    fn agent(id: &str, name: &str, tools: Vec<ToolConfig>) -> AgentDef {
        AgentDef {
            id: id.to_string(),
            name: name.to_string(),
            description: format!("{} description", name),
            instruction: "You are a test agent.".to_string(),
            tools,
            files: vec![],
            is_meta: false,
            sub_agent_ids: vec![],
            params: ModelParams::default(),
        }
    }

    fn session<'a>(
        generator: Arc<dyn TextGenerator>,
        executor: &'a ToolExecutor,
        all_agents: &'a [AgentDef],
    ) -> ReactSession<'a> {
        ReactSession {
            generator,
            executor,
            all_agents,
            cancel_token: CancellationToken::new(),
            step_tx: None,
        }
    }

    #[tokio::test]
    async fn test_direct_final_answer_single_call_no_tools() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            "Thought: 25% of 180 is 45.\nFinal Answer: 45",
        ]));
        let executor = executor_with_fake_search();
        let agents = vec![agent("a1", "Math Tutor", vec![])];

        let s = session(generator.clone(), &executor, &agents);
        let result = run_react(&s, &agents[0], "What is 25% of 180?")
            .await
            .unwrap();

        assert_eq!(result.answer, "45");
        assert_eq!(result.steps.len(), 1);
        assert!(result.steps[0].is_final());
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_then_final_answer() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            "Thought: search first\nAction: GoogleSearch(\"rust release\")",
            "Thought: got it\nFinal Answer: found it",
        ]));
        let executor = executor_with_fake_search();
        let agents = vec![agent(
            "a1",
            "Researcher",
            vec![ToolConfig::enabled(ToolName::GoogleSearch, "search")],
        )];

        let s = session(generator.clone(), &executor, &agents);
        let result = run_react(&s, &agents[0], "find rust release").await.unwrap();

        assert_eq!(result.steps.len(), 2);
        assert_eq!(
            result.steps[0].observation.as_deref(),
            Some("MOCK RESULT")
        );
        assert_eq!(
            result.steps[0].action.as_deref(),
            Some("GoogleSearch(\"rust release\")")
        );

        // Observation 必须回注到第二次调用的历史中
        let (_, history) = generator.call(1).unwrap();
        assert!(history
            .iter()
            .any(|m| m.content == "Observation: MOCK RESULT"));
    }

    #[tokio::test]
    async fn test_invalid_output_gets_corrective_feedback() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            "I will just answer directly without markers.",
            "Final Answer: ok now",
        ]));
        let executor = executor_with_fake_search();
        let agents = vec![agent("a1", "Sloppy", vec![])];

        let s = session(generator.clone(), &executor, &agents);
        let result = run_react(&s, &agents[0], "hello").await.unwrap();

        assert_eq!(result.steps.len(), 2);
        assert_eq!(
            result.steps[0].observation.as_deref(),
            Some(CORRECTIVE_FEEDBACK)
        );
        assert_eq!(
            result.steps[0].thought,
            "I will just answer directly without markers."
        );

        let (_, history) = generator.call(1).unwrap();
        assert!(history
            .iter()
            .any(|m| m.content == format!("Observation: {}", CORRECTIVE_FEEDBACK)));
    }

    #[tokio::test]
    async fn test_disabled_tool_gets_corrective_feedback() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            "Thought: try a forbidden tool\nAction: HttpRequest(\"https://x.dev\")",
            "Final Answer: fine",
        ]));
        let executor = executor_with_fake_search();
        let agents = vec![agent(
            "a1",
            "Limited",
            vec![ToolConfig::disabled(ToolName::HttpRequest, "http")],
        )];

        let s = session(generator.clone(), &executor, &agents);
        let result = run_react(&s, &agents[0], "fetch").await.unwrap();

        assert_eq!(
            result.steps[0].observation.as_deref(),
            Some(CORRECTIVE_FEEDBACK)
        );
        assert!(result.steps[0].action.is_none());
    }

    #[tokio::test]
    async fn test_budget_exhaustion_yields_terminal_answer() {
        let replies: Vec<String> = (0..MAX_REACT_STEPS)
            .map(|i| format!("ramble without markers, round {}", i))
            .collect();
        let generator = Arc::new(ScriptedGenerator::new(replies));
        let executor = executor_with_fake_search();
        let agents = vec![agent("a1", "Stuck", vec![])];

        let s = session(generator.clone(), &executor, &agents);
        let result = run_react(&s, &agents[0], "loop forever").await.unwrap();

        assert_eq!(result.answer, MAX_STEPS_ANSWER);
        assert_eq!(result.steps.len(), MAX_REACT_STEPS + 1);
        assert!(result.steps.last().unwrap().is_final());
        assert_eq!(generator.call_count(), MAX_REACT_STEPS);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_cycle_emits_no_steps() {
        let generator = Arc::new(ScriptedGenerator::new(vec!["Final Answer: never"]));
        let executor = executor_with_fake_search();
        let agents = vec![agent("a1", "Cancelled", vec![])];

        let token = CancellationToken::new();
        token.cancel();
        let s = ReactSession {
            generator: generator.clone(),
            executor: &executor,
            all_agents: &agents,
            cancel_token: token,
            step_tx: None,
        };

        let err = run_react(&s, &agents[0], "hi").await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_meta_agent_delegates_and_consumes_sub_answer() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            "Thought: delegate this\nAction: Agent_Helper(\"do X\")",
            "Thought: doing X\nFinal Answer: helper done",
            "Thought: collected\nFinal Answer: parent done",
        ]));
        let executor = executor_with_fake_search();

        let mut meta = agent("m1", "Coordinator", vec![]);
        meta.is_meta = true;
        meta.sub_agent_ids = vec!["h1".to_string()];
        let helper = agent("h1", "Helper", vec![]);
        let agents = vec![meta, helper];

        let s = session(generator.clone(), &executor, &agents);
        let result = run_react(&s, &agents[0], "coordinate").await.unwrap();

        assert_eq!(result.answer, "parent done");
        // 父运行仅两步：委派步（观察 = 子 Agent 最终回答）+ 终态步
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[0].observation.as_deref(), Some("helper done"));
        assert_eq!(
            result.steps[0].action.as_deref(),
            Some("Agent_Helper(\"do X\")")
        );
        assert_eq!(generator.call_count(), 3);

        // 子 Agent 清单进入 system 指令
        let (system, _) = generator.call(0).unwrap();
        assert!(system.contains("Agent_Helper(input)"));
    }

    #[tokio::test]
    async fn test_unpermitted_sub_agent_becomes_error_observation() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            "Thought: sneak\nAction: Agent_Outsider(\"x\")",
            "Final Answer: gave up",
        ]));
        let executor = executor_with_fake_search();

        let mut meta = agent("m1", "Coordinator", vec![]);
        meta.is_meta = true;
        meta.sub_agent_ids = vec!["h1".to_string()];
        let helper = agent("h1", "Helper", vec![]);
        let outsider = agent("o1", "Outsider", vec![]);
        let agents = vec![meta, helper, outsider];

        let s = session(generator.clone(), &executor, &agents);
        let result = run_react(&s, &agents[0], "coordinate").await.unwrap();

        let obs = result.steps[0].observation.as_deref().unwrap();
        assert!(obs.starts_with("Error:"));
        assert!(obs.contains("not in this agent's permitted sub-agent list"));
        // 未授权的子 Agent 不能被运行
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_non_meta_agent_cannot_delegate() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            "Thought: try\nAction: Agent_Helper(\"x\")",
            "Final Answer: done",
        ]));
        let executor = executor_with_fake_search();
        let plain = agent("p1", "Plain", vec![]);
        let helper = agent("h1", "Helper", vec![]);
        let agents = vec![plain, helper];

        let s = session(generator.clone(), &executor, &agents);
        let result = run_react(&s, &agents[0], "go").await.unwrap();

        assert_eq!(
            result.steps[0].observation.as_deref(),
            Some(CORRECTIVE_FEEDBACK)
        );
    }

    #[tokio::test]
    async fn test_generator_failure_propagates_as_llm_error() {
        let generator = Arc::new(crate::llm::FailingGenerator);
        let executor = executor_with_fake_search();
        let agents = vec![agent("a1", "Unlucky", vec![])];

        let s = session(generator, &executor, &agents);
        let err = run_react(&s, &agents[0], "hi").await.unwrap_err();
        assert!(matches!(err, AgentError::LlmError(_)));
    }

    #[tokio::test]
    async fn test_sub_agent_llm_failure_degrades_to_observation() {
        // 父与子共用生成端：第一次成功（委派），第二次（子运行）失败
        struct FailSecond {
            calls: std::sync::atomic::AtomicUsize,
        }

        #[async_trait]
        impl TextGenerator for FailSecond {
            async fn generate(
                &self,
                _system: &str,
                _history: &[Message],
                _params: &ModelParams,
            ) -> Result<String, String> {
                match self
                    .calls
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                {
                    0 => Ok("Thought: delegate\nAction: Agent_Helper(\"do X\")".to_string()),
                    1 => Err("backend unavailable".to_string()),
                    _ => Ok("Final Answer: recovered without helper".to_string()),
                }
            }
        }

        let generator = Arc::new(FailSecond {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let executor = executor_with_fake_search();

        let mut meta = agent("m1", "Coordinator", vec![]);
        meta.is_meta = true;
        meta.sub_agent_ids = vec!["h1".to_string()];
        let helper = agent("h1", "Helper", vec![]);
        let agents = vec![meta, helper];

        let s = session(generator, &executor, &agents);
        let result = run_react(&s, &agents[0], "coordinate").await.unwrap();

        let obs = result.steps[0].observation.as_deref().unwrap();
        assert!(obs.starts_with("Error: sub-agent 'Helper' failed"));
        assert_eq!(result.answer, "recovered without helper");
    }

    #[tokio::test]
    async fn test_date_line_and_request_in_initial_turn() {
        let generator = Arc::new(ScriptedGenerator::new(vec!["Final Answer: ok"]));
        let executor = executor_with_fake_search();
        let agents = vec![agent("a1", "Dated", vec![])];

        let s = session(generator.clone(), &executor, &agents);
        run_react(&s, &agents[0], "what happened last week?")
            .await
            .unwrap();

        let (_, history) = generator.call(0).unwrap();
        assert!(history[0].content.starts_with("Current date is "));
        assert!(history[0]
            .content
            .contains("Here is the user's request:\nwhat happened last week?"));
    }
}
