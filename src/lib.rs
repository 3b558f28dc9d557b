//! Hive - Rust 多智能体编排系统
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与执行状态注册表
//! - **library**: 内置与文件加载的 Agent / Pipeline 定义库
//! - **llm**: 文本生成服务抽象与实现（OpenAI 兼容 / Mock）
//! - **model**: Agent、工具配置与 Pipeline 图数据模型
//! - **pipeline**: 依赖图拓扑排序与节点调度
//! - **react**: Action 解析与 ReAct 主循环
//! - **tools**: 工具箱（GoogleSearch、HttpRequest、WebBrowser、CodeInterpreter）与执行器

pub mod config;
pub mod core;
pub mod library;
pub mod llm;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod react;
pub mod tools;
