//! Sub-flow invocation.

use crate::executor::{config_mismatch, Dispatch, ExecState, FlowExecutor};
use crate::graph::CompiledFlow;
use crate::registry::FlowRegistry;
use fluxcore::{value, EngineError, NodeConfig};
use serde_json::{Map, Value};

impl FlowExecutor {
    /// Resolves the configured flow id through the registry and runs it on a
    /// fresh child engine.
    ///
    /// The child gets its own variable map (only an explicit `_parentInput`
    /// handoff crosses the boundary) while the log and notification sinks
    /// stay shared so the top-level result aggregates nested activity.
    /// Recursion and depth violations raised by the child stay fatal; any
    /// other child failure surfaces as a catchable sub-flow error.
    pub(crate) async fn call_flow(
        &self,
        flow: &CompiledFlow,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let node = flow.node(idx);
        let cfg = match flow.config(idx) {
            NodeConfig::CallFlow(c) => c,
            _ => return Err(config_mismatch(node)),
        };
        let child_def = self
            .registry
            .get_flow_by_id(&cfg.flow_id)
            .ok_or_else(|| EngineError::UnknownFlow(cfg.flow_id.clone()))?;

        let capabilities = self.api.capabilities();
        if let Some(unsupported) = child_def
            .nodes
            .iter()
            .find(|n| !n.disabled && !capabilities.supports(n.node_type))
        {
            return Err(EngineError::Capability(format!(
                "sub-flow {} uses node kind {} which this host cannot run",
                child_def.id, unsupported.node_type
            )));
        }

        let mut child_input = Map::new();
        if cfg.pass_input {
            child_input.insert(value::PARENT_INPUT_KEY.to_string(), context.clone());
        }

        tracing::info!(parent = %flow.id(), child = %child_def.id, "invoking sub-flow");
        let child = self.spawn_child(flow.id());
        let mut child_state = ExecState::new();
        match child
            .run_flow(&child_def, Value::Object(child_input), &mut child_state)
            .await
        {
            Ok(()) => Ok(Dispatch::out(Value::Object(child_state.variables))),
            Err(e) if e.is_guard_rail() => Err(e),
            Err(e) => Err(EngineError::SubFlow {
                flow: cfg.flow_id.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
