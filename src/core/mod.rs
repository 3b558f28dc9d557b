//! 核心编排层：错误类型与执行状态注册表

pub mod error;
pub mod execution;

pub use error::AgentError;
pub use execution::{
    ChatRole, ChatTurn, ExecutionHistory, ExecutionRegistry, ExecutionState, ExecutionStatus,
    CANCELLED_MESSAGE,
};
