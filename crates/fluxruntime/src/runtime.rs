use crate::executor::{ExecutionResult, FlowExecutor};
use crate::registry::{FlowRegistry, InMemoryFlowRegistry};
use crate::sandbox::{LuaSandbox, ScriptSandbox};
use fluxcore::{EngineError, FlowDefinition};
use fluxhost::SystemApi;
use serde_json::Value;
use std::sync::Arc;

/// Runtime facade: one System API, one sandbox, one flow registry, and a
/// fresh stateless engine per run.
pub struct FlowRuntime {
    api: Arc<SystemApi>,
    sandbox: Arc<dyn ScriptSandbox>,
    registry: Arc<InMemoryFlowRegistry>,
}

impl FlowRuntime {
    pub fn new(api: SystemApi) -> Self {
        Self::with_sandbox(api, Arc::new(LuaSandbox::new()))
    }

    pub fn with_sandbox(api: SystemApi, sandbox: Arc<dyn ScriptSandbox>) -> Self {
        Self {
            api: Arc::new(api),
            sandbox,
            registry: Arc::new(InMemoryFlowRegistry::new()),
        }
    }

    pub fn api(&self) -> &Arc<SystemApi> {
        &self.api
    }

    pub fn registry(&self) -> &Arc<InMemoryFlowRegistry> {
        &self.registry
    }

    /// Make a flow resolvable as a `call_flow` target.
    pub fn register_flow(&self, flow: FlowDefinition) {
        self.registry.register(flow);
    }

    /// A fresh engine with its own log/notification buffers, for callers
    /// that need the abort handle before starting the run.
    pub fn executor(&self) -> FlowExecutor {
        FlowExecutor::new(
            Arc::new(self.api.with_fresh_sinks()),
            Arc::clone(&self.sandbox),
            self.registry.clone() as Arc<dyn FlowRegistry>,
        )
    }

    pub async fn execute(&self, flow: &FlowDefinition, input: Value) -> ExecutionResult {
        self.executor().execute_flow(flow, input).await
    }

    pub async fn execute_by_id(
        &self,
        id: &str,
        input: Value,
    ) -> Result<ExecutionResult, EngineError> {
        let flow = self
            .registry
            .get_flow_by_id(id)
            .ok_or_else(|| EngineError::UnknownFlow(id.to_string()))?;
        Ok(self.executor().execute_flow(&flow, input).await)
    }

    /// Entry point for webhook/schedule layers: begin at a specific trigger
    /// node with caller-supplied trigger metadata.
    pub async fn trigger(
        &self,
        flow: &FlowDefinition,
        node_id: &str,
        payload: Value,
    ) -> ExecutionResult {
        self.executor()
            .execute_from_trigger(flow, node_id, payload)
            .await
    }
}
