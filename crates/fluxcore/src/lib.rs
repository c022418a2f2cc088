//! Core abstractions for the flux engine
//!
//! This crate provides the flow data model, the closed set of node kinds
//! with their typed configurations, the error taxonomy, and the execution
//! trace types that all other components depend on. It has no runtime
//! dependencies.

mod error;
mod flow;
mod node;
mod trace;
pub mod value;

pub use error::{EngineError, FlowError};
pub use flow::{
    port, EdgeDef, FlowDefinition, NodeDef, PortDef, PortDirection, VariableDeclaration,
};
pub use node::{
    CallFlowConfig, ForLoopConfig, ForeachConfig, IfElseConfig, LlmCallConfig, LogConfig,
    ManualTriggerConfig, MergeConfig, MergeOutput, NodeConfig, NodeKind, NotificationConfig,
    RateLimitConfig, RateLimitMode, SwitchConfig, SystemApiConfig, TtsConfig, VariableConfig,
    WhileLoopConfig,
};
pub use trace::{LogEntry, LogLevel, NodeRun, Notification, RunStatus, Severity};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, EngineError>;
