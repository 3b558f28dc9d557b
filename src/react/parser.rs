//! Action 解析：从原始 completion 提取 Thought / Action / Final Answer
//!
//! 解析器一次性把文本归类为带类型的 Directive（FinalAnswer / ToolCall /
//! SubAgentCall / Invalid），循环不再按字符串前缀反复判断。
//! Final Answer 标记优先于任何 Action 形态的文本。

use std::sync::OnceLock;

use regex::Regex;

/// 子 Agent 伪工具前缀：Action 名以此开头时按委派处理
pub const SUB_AGENT_PREFIX: &str = "Agent_";

/// 无 Thought 标记时的回退思考文本
pub const DEFAULT_THOUGHT: &str = "I need to determine the next step.";

/// 解析后的指令
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// 终止循环：最终回答
    FinalAnswer(String),
    /// 调用注册工具（名称合法性由循环校验）
    ToolCall { name: String, args: String },
    /// Meta Agent 委派子 Agent（name 为完整伪工具名，含前缀）
    SubAgentCall { name: String, args: String },
    /// 两种标记都未出现；回注纠错反馈后继续
    Invalid,
}

/// 一次解析结果：思考文本 + 指令
#[derive(Clone, Debug)]
pub struct ParsedCompletion {
    pub thought: String,
    pub directive: Directive,
}

fn thought_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Thought:\s*(.*?)(?:Action:|Final Answer:|$)").expect("thought regex")
    })
}

fn final_answer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)Final Answer:\s*(.*)").expect("final answer regex"))
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)Action:\s*(\w+)\((.*)\)").expect("action regex"))
}

fn key_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)^\w+\s*=\s*"(.*)"$"#).expect("key value regex"))
}

/// 参数解包：`key="value"` 取 value；成对的 "..." / '...' / `...` 去掉一层外引号
fn unwrap_args(raw: &str) -> String {
    let args = raw.trim();

    if let Some(c) = key_value_re().captures(args) {
        return c[1].to_string();
    }

    for quote in ['"', '\'', '`'] {
        if args.len() >= 2 && args.starts_with(quote) && args.ends_with(quote) {
            return args[1..args.len() - 1].to_string();
        }
    }
    args.to_string()
}

/// 解析一条 completion。
/// Thought 取 `Thought:` 之后、下一个标记之前的文本；缺失时用固定回退。
pub fn parse_completion(text: &str) -> ParsedCompletion {
    let thought = thought_re()
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| DEFAULT_THOUGHT.to_string());

    // Final Answer 优先：即使同时出现 Action 文本也按终止处理
    if let Some(c) = final_answer_re().captures(text) {
        return ParsedCompletion {
            thought,
            directive: Directive::FinalAnswer(c[1].trim().to_string()),
        };
    }

    if let Some(c) = action_re().captures(text) {
        let name = c[1].trim().to_string();
        let args = unwrap_args(&c[2]);
        let directive = if name.starts_with(SUB_AGENT_PREFIX) {
            Directive::SubAgentCall { name, args }
        } else {
            Directive::ToolCall { name, args }
        };
        return ParsedCompletion { thought, directive };
    }

    ParsedCompletion {
        thought,
        directive: Directive::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_answer_terminates() {
        let p = parse_completion("Thought: done reasoning\nFinal Answer: 42");
        assert_eq!(p.thought, "done reasoning");
        assert_eq!(p.directive, Directive::FinalAnswer("42".to_string()));
    }

    #[test]
    fn test_final_answer_wins_over_action() {
        // 同一条输出里 Action 与 Final Answer 并存时按终止处理
        let p = parse_completion(
            "Thought: both\nAction: GoogleSearch(\"rust\")\nFinal Answer: rust is a language",
        );
        assert!(matches!(p.directive, Directive::FinalAnswer(_)));
    }

    #[test]
    fn test_action_with_double_quotes() {
        let p = parse_completion("Thought: search\nAction: GoogleSearch(\"latest rust release\")");
        assert_eq!(
            p.directive,
            Directive::ToolCall {
                name: "GoogleSearch".to_string(),
                args: "latest rust release".to_string(),
            }
        );
    }

    #[test]
    fn test_action_with_backticks_and_single_quotes() {
        let p = parse_completion("Action: HttpRequest(`https://api.example.com`)");
        assert_eq!(
            p.directive,
            Directive::ToolCall {
                name: "HttpRequest".to_string(),
                args: "https://api.example.com".to_string(),
            }
        );
        let p = parse_completion("Action: WebBrowser('https://example.org')");
        assert_eq!(
            p.directive,
            Directive::ToolCall {
                name: "WebBrowser".to_string(),
                args: "https://example.org".to_string(),
            }
        );
    }

    #[test]
    fn test_action_key_value_form() {
        let p = parse_completion("Action: GoogleSearch(query=\"el clasico score\")");
        assert_eq!(
            p.directive,
            Directive::ToolCall {
                name: "GoogleSearch".to_string(),
                args: "el clasico score".to_string(),
            }
        );
    }

    #[test]
    fn test_multiline_args_kept() {
        let p = parse_completion("Action: CodeInterpreter(\"const a = 1;\nreturn a + 1;\")");
        match p.directive {
            Directive::ToolCall { name, args } => {
                assert_eq!(name, "CodeInterpreter");
                assert!(args.contains('\n'));
            }
            other => panic!("unexpected directive: {:?}", other),
        }
    }

    #[test]
    fn test_sub_agent_prefix_resolves_to_delegation() {
        let p = parse_completion("Thought: delegate\nAction: Agent_Helper(\"do X\")");
        assert_eq!(
            p.directive,
            Directive::SubAgentCall {
                name: "Agent_Helper".to_string(),
                args: "do X".to_string(),
            }
        );
    }

    #[test]
    fn test_no_marker_is_invalid_with_fallback_thought() {
        let p = parse_completion("I will just ramble without any markers.");
        assert_eq!(p.directive, Directive::Invalid);
        assert_eq!(p.thought, DEFAULT_THOUGHT);
    }

    #[test]
    fn test_thought_captured_before_action() {
        let p = parse_completion("Thought: need data\nAction: HttpRequest(\"https://x.dev\")");
        assert_eq!(p.thought, "need data");
    }
}
