use thiserror::Error;

/// Errors raised while loading and validating a flow definition.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("edge {edge} references unknown node: {node}")]
    UnknownEdgeNode { edge: String, node: String },

    #[error("invalid config for node {node}: {reason}")]
    InvalidConfig { node: String, reason: String },

    #[error("node {0} requires a script body")]
    MissingScript(String),
}

/// Errors raised while executing a flow.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid flow: {0}")]
    Flow(#[from] FlowError),

    #[error("flow {0} has no start node")]
    NoStartNode(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("unknown sub-flow: {0}")]
    UnknownFlow(String),

    #[error("recursive sub-flow call: {0} is already on the call stack")]
    RecursiveCall(String),

    #[error("sub-flow call depth exceeded ({0})")]
    CallDepthExceeded(usize),

    #[error("node execution limit exceeded ({0})")]
    ExecutionLimitExceeded(u32),

    #[error("execution aborted")]
    Aborted,

    #[error("script error: {0}")]
    Script(String),

    #[error("capability not available: {0}")]
    Capability(String),

    #[error("system api error: {0}")]
    Host(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("sub-flow {flow} failed: {reason}")]
    SubFlow { flow: String, reason: String },
}

impl EngineError {
    /// Guard-rail failures terminate the whole run and are never redirected
    /// through a node's `error` port.
    pub fn is_guard_rail(&self) -> bool {
        matches!(
            self,
            EngineError::RecursiveCall(_)
                | EngineError::CallDepthExceeded(_)
                | EngineError::ExecutionLimitExceeded(_)
                | EngineError::Aborted
        )
    }
}
