//! 文本生成服务抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::{FailingGenerator, ScriptedGenerator};
pub use openai::OpenAiGenerator;
pub use traits::{GroundedResult, GroundingSource, Message, Role, TextGenerator};
