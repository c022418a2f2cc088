use crate::graph::CompiledFlow;
use crate::registry::FlowRegistry;
use crate::sandbox::ScriptSandbox;
use chrono::Utc;
use fluxcore::value;
use fluxcore::{
    port, EngineError, FlowDefinition, LogEntry, NodeDef, NodeKind, NodeRun, Notification,
    RunStatus,
};
use fluxhost::SystemApi;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Maximum sub-flow nesting depth.
pub const MAX_CALL_DEPTH: usize = 10;

/// Upper bound on node dispatches per execution, the backstop against
/// cyclic and runaway graphs.
pub const MAX_NODE_EXECUTIONS: u32 = 10_000;

/// The sole output contract of an execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub execution_log: Vec<NodeRun>,
    pub logs: Vec<LogEntry>,
    pub notifications: Vec<Notification>,
    pub variables: Map<String, Value>,
    pub error: Option<String>,
}

/// State shared across every engine of one execution: the dispatch counter
/// and abort flag span sub-flows and multiple start nodes alike.
#[derive(Default)]
pub(crate) struct Shared {
    dispatched: AtomicU32,
    abort: AtomicBool,
}

/// Cooperative cancellation: stops new dispatches and loop iterations, never
/// preempts an in-flight await.
#[derive(Clone)]
pub struct AbortHandle(Arc<Shared>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.abort.store(true, Ordering::Relaxed);
    }
}

/// Per-execution mutable state. Sub-flow executions get a fresh one; only
/// the [`Shared`] counters cross that boundary.
pub(crate) struct ExecState {
    pub(crate) variables: Map<String, Value>,
    pub(crate) merges: HashMap<String, Map<String, Value>>,
    pub(crate) throttle: HashMap<String, Instant>,
    pub(crate) trace: Vec<NodeRun>,
}

impl ExecState {
    pub(crate) fn new() -> Self {
        Self {
            variables: Map::new(),
            merges: HashMap::new(),
            throttle: HashMap::new(),
            trace: Vec::new(),
        }
    }

    fn seed(&mut self, def: &FlowDefinition) {
        for decl in &def.variables {
            self.variables
                .insert(decl.name.clone(), decl.default_value.clone());
        }
    }
}

/// Outcome of one node invocation.
pub(crate) enum Dispatch {
    /// Emit `value` along the edges connected to `port`.
    Route { port: String, value: Value },
    /// A merge node still missing inputs on other connected ports.
    Waiting,
    /// No outcome and no routing (comment nodes).
    Silent,
}

impl Dispatch {
    pub(crate) fn out(value: Value) -> Self {
        Dispatch::Route {
            port: port::OUT.to_string(),
            value,
        }
    }

    pub(crate) fn route(port: impl Into<String>, value: Value) -> Self {
        Dispatch::Route {
            port: port.into(),
            value,
        }
    }
}

pub(crate) fn config_mismatch(node: &NodeDef) -> EngineError {
    EngineError::Config(format!(
        "node {} carries a config that does not match kind {}",
        node.id, node.node_type
    ))
}

/// Interprets one flow execution.
///
/// An executor is single-use state-wise: construct one per run (the
/// [`FlowRuntime`](crate::FlowRuntime) facade does this). Sub-flow calls
/// spawn a fresh child executor with the call stack copied and extended, so
/// nested executions can never corrupt sibling state.
pub struct FlowExecutor {
    pub(crate) api: Arc<SystemApi>,
    pub(crate) sandbox: Arc<dyn ScriptSandbox>,
    pub(crate) registry: Arc<dyn FlowRegistry>,
    pub(crate) shared: Arc<Shared>,
    call_stack: Vec<String>,
}

impl FlowExecutor {
    pub fn new(
        api: Arc<SystemApi>,
        sandbox: Arc<dyn ScriptSandbox>,
        registry: Arc<dyn FlowRegistry>,
    ) -> Self {
        Self {
            api,
            sandbox,
            registry,
            shared: Arc::new(Shared::default()),
            call_stack: Vec::new(),
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle(Arc::clone(&self.shared))
    }

    pub(crate) fn aborted(&self) -> bool {
        self.shared.abort.load(Ordering::Relaxed)
    }

    /// Child engine for a sub-flow call: same api, sandbox, registry and
    /// shared counters; call stack extended by value with the parent flow.
    pub(crate) fn spawn_child(&self, parent_flow_id: &str) -> FlowExecutor {
        let mut call_stack = self.call_stack.clone();
        call_stack.push(parent_flow_id.to_string());
        FlowExecutor {
            api: Arc::clone(&self.api),
            sandbox: Arc::clone(&self.sandbox),
            registry: Arc::clone(&self.registry),
            shared: Arc::clone(&self.shared),
            call_stack,
        }
    }

    /// Run every enabled `start` node of `flow` sequentially.
    pub async fn execute_flow(&self, flow: &FlowDefinition, initial_input: Value) -> ExecutionResult {
        let started = Instant::now();
        tracing::info!(flow = %flow.id, name = %flow.name, "starting flow execution");
        let mut state = ExecState::new();
        let outcome = self.run_flow(flow, initial_input, &mut state).await;
        self.finish(flow, state, outcome, started)
    }

    /// Begin at a specific webhook/schedule/manual node, with the caller's
    /// trigger metadata as the input context.
    pub async fn execute_from_trigger(
        &self,
        flow: &FlowDefinition,
        node_id: &str,
        payload: Value,
    ) -> ExecutionResult {
        let started = Instant::now();
        tracing::info!(flow = %flow.id, node = node_id, "starting flow execution from trigger");
        let mut state = ExecState::new();
        let outcome = self
            .run_from_trigger(flow, node_id, payload, &mut state)
            .await;
        self.finish(flow, state, outcome, started)
    }

    pub(crate) async fn run_flow(
        &self,
        flow: &FlowDefinition,
        initial_input: Value,
        state: &mut ExecState,
    ) -> Result<(), EngineError> {
        self.check_guard_rails(flow)?;
        let compiled = CompiledFlow::compile(flow.clone())?;
        let starts = compiled.start_nodes();
        if starts.is_empty() {
            return Err(EngineError::NoStartNode(flow.id.clone()));
        }
        state.seed(compiled.definition());
        let context = value::into_context(initial_input);
        for idx in starts {
            self.run_node(&compiled, state, idx, context.clone(), None)
                .await?;
        }
        Ok(())
    }

    async fn run_from_trigger(
        &self,
        flow: &FlowDefinition,
        node_id: &str,
        payload: Value,
        state: &mut ExecState,
    ) -> Result<(), EngineError> {
        self.check_guard_rails(flow)?;
        let compiled = CompiledFlow::compile(flow.clone())?;
        let idx = compiled
            .node_index(node_id)
            .ok_or_else(|| EngineError::NodeNotFound(node_id.to_string()))?;
        let node = compiled.node(idx);
        if !node.node_type.is_trigger() {
            return Err(EngineError::Config(format!(
                "node {} ({}) cannot begin an execution",
                node_id, node.node_type
            )));
        }
        state.seed(compiled.definition());
        let context = value::into_context(payload);
        self.run_node(&compiled, state, idx, context, None).await
    }

    /// Recursion and depth protection, checked before any node dispatches.
    fn check_guard_rails(&self, flow: &FlowDefinition) -> Result<(), EngineError> {
        if self.call_stack.contains(&flow.id) {
            return Err(EngineError::RecursiveCall(flow.id.clone()));
        }
        if self.call_stack.len() >= MAX_CALL_DEPTH {
            return Err(EngineError::CallDepthExceeded(MAX_CALL_DEPTH));
        }
        Ok(())
    }

    fn finish(
        &self,
        flow: &FlowDefinition,
        state: ExecState,
        outcome: Result<(), EngineError>,
        started: Instant,
    ) -> ExecutionResult {
        let elapsed = started.elapsed();
        match outcome {
            Ok(()) => {
                tracing::info!(flow = %flow.id, ?elapsed, "flow execution completed");
                ExecutionResult {
                    success: true,
                    execution_log: state.trace,
                    logs: self.api.logs(),
                    notifications: self.api.notifications(),
                    variables: state.variables,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(flow = %flow.id, error = %e, ?elapsed, "flow execution failed");
                ExecutionResult {
                    success: false,
                    execution_log: state.trace,
                    logs: self.api.logs(),
                    notifications: self.api.notifications(),
                    variables: state.variables,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Execute one node and route its outcome, depth-first.
    ///
    /// Boxed because loop bodies and edge fan-out re-enter this function
    /// recursively.
    pub(crate) fn run_node<'a>(
        &'a self,
        flow: &'a CompiledFlow,
        state: &'a mut ExecState,
        idx: usize,
        context: Value,
        via_port: Option<String>,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        async move {
            let node = flow.node(idx);
            if node.disabled {
                return Ok(());
            }
            if self.aborted() {
                return Err(EngineError::Aborted);
            }
            let dispatched = self.shared.dispatched.fetch_add(1, Ordering::Relaxed) + 1;
            if dispatched > MAX_NODE_EXECUTIONS {
                return Err(EngineError::ExecutionLimitExceeded(MAX_NODE_EXECUTIONS));
            }

            let started_at = Utc::now();
            tracing::debug!(node = %node.id, kind = %node.node_type, "dispatching node");

            match self
                .dispatch(flow, state, idx, &context, via_port.as_deref())
                .await
            {
                Ok(Dispatch::Route { port, value }) => {
                    state.trace.push(run_entry(
                        node,
                        started_at,
                        RunStatus::Completed,
                        Some(value.clone()),
                        None,
                    ));
                    self.route(flow, state, idx, &port, &context, value).await
                }
                Ok(Dispatch::Waiting) => {
                    let mut entry =
                        run_entry(node, started_at, RunStatus::Waiting, None, None);
                    entry.finished_at = None;
                    state.trace.push(entry);
                    Ok(())
                }
                Ok(Dispatch::Silent) => {
                    state
                        .trace
                        .push(run_entry(node, started_at, RunStatus::Completed, None, None));
                    Ok(())
                }
                Err(e) if !e.is_guard_rail() && flow.has_error_edge(idx) => {
                    tracing::warn!(node = %node.id, error = %e, "node failed; routing through error port");
                    let failure = json!({
                        "message": e.to_string(),
                        "stack": format!("{:?}", e),
                        "nodeId": node.id,
                        "nodeName": node.label(),
                        "nodeType": node.node_type.as_str(),
                        "timestamp": Utc::now().to_rfc3339(),
                        "input": context.clone(),
                    });
                    state.trace.push(run_entry(
                        node,
                        started_at,
                        RunStatus::Failed,
                        Some(failure.clone()),
                        Some(e.to_string()),
                    ));
                    self.route(flow, state, idx, port::ERROR, &context, failure)
                        .await
                }
                Err(e) => {
                    state.trace.push(run_entry(
                        node,
                        started_at,
                        RunStatus::Failed,
                        None,
                        Some(e.to_string()),
                    ));
                    Err(e)
                }
            }
        }
        .boxed()
    }

    /// Fire every enabled edge on `port`, in definition order.
    pub(crate) async fn route(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        port: &str,
        context: &Value,
        result: Value,
    ) -> Result<(), EngineError> {
        let edges = flow.edges_from(idx, port);
        if edges.is_empty() {
            tracing::trace!(node = %flow.node(idx).id, port, "no listeners on port");
            return Ok(());
        }
        let downstream = value::with_result(context, result);
        for &e in edges {
            let edge = flow.edge(e);
            let target = flow
                .node_index(&edge.target_node_id)
                .ok_or_else(|| EngineError::NodeNotFound(edge.target_node_id.clone()))?;
            self.run_node(
                flow,
                state,
                target,
                downstream.clone(),
                Some(edge.target_port_id.clone()),
            )
            .await?;
        }
        Ok(())
    }

    /// The dispatch table: one arm per node kind.
    async fn dispatch(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        context: &Value,
        via_port: Option<&str>,
    ) -> Result<Dispatch, EngineError> {
        let node = flow.node(idx);
        match node.node_type {
            NodeKind::Start => Ok(Dispatch::out(context.clone())),
            NodeKind::ManualTrigger => self.manual_trigger(flow, state, idx, context).await,
            NodeKind::WebhookTrigger | NodeKind::ScheduleTrigger => {
                Ok(Dispatch::out(context.clone()))
            }
            NodeKind::Script => self.script(flow, state, idx, context).await,
            NodeKind::SystemApi => self.system_api(flow, idx).await,
            NodeKind::IfElse => self.if_else(flow, state, idx, context).await,
            NodeKind::Switch => self.switch(flow, state, idx, context).await,
            NodeKind::ForLoop => self.for_loop(flow, state, idx, context).await,
            NodeKind::WhileLoop => self.while_loop(flow, state, idx, context).await,
            NodeKind::Foreach => self.foreach(flow, state, idx, context).await,
            NodeKind::ReadVariable => self.read_variable(flow, state, idx),
            NodeKind::WriteVariable => self.write_variable(flow, state, idx, context),
            NodeKind::Log => self.log_node(flow, idx, context),
            NodeKind::LlmCall => self.llm_call(flow, state, idx, context).await,
            NodeKind::Notification => self.notification(flow, idx, context),
            NodeKind::Tts => self.tts(flow, idx, context).await,
            NodeKind::Stt => self.stt().await,
            NodeKind::CallFlow => self.call_flow(flow, idx, context).await,
            NodeKind::RateLimit => self.rate_limit(flow, state, idx, context).await,
            NodeKind::Comment => Ok(Dispatch::Silent),
            NodeKind::Merge => self.merge(flow, state, idx, context, via_port),
        }
    }
}

fn run_entry(
    node: &NodeDef,
    started_at: chrono::DateTime<Utc>,
    status: RunStatus,
    result: Option<Value>,
    error: Option<String>,
) -> NodeRun {
    NodeRun {
        node_id: node.id.clone(),
        node_name: node.label().to_string(),
        node_type: node.node_type.as_str().to_string(),
        status,
        started_at,
        finished_at: Some(Utc::now()),
        result,
        error,
    }
}
