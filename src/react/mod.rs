//! ReAct 引擎：Action 解析、单步记录与主循环

pub mod loop_;
pub mod parser;
pub mod step;

pub use loop_::{
    run_react, ReactResult, ReactSession, CORRECTIVE_FEEDBACK, MAX_REACT_STEPS, MAX_STEPS_ANSWER,
};
pub use parser::{parse_completion, Directive, ParsedCompletion, DEFAULT_THOUGHT, SUB_AGENT_PREFIX};
pub use step::ReActStep;
