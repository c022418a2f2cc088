//! Branching, loops and fan-in joins.

use crate::executor::{config_mismatch, Dispatch, ExecState, FlowExecutor};
use crate::graph::CompiledFlow;
use crate::sandbox::ScriptSandbox;
use fluxcore::{port, value, EngineError, MergeOutput, NodeConfig};
use serde_json::{json, Value};

impl FlowExecutor {
    /// Evaluates the condition and fires exactly one of `true`/`false`,
    /// passing the upstream result through unchanged.
    pub(crate) async fn if_else(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let node = flow.node(idx);
        let cfg = match flow.config(idx) {
            NodeConfig::IfElse(c) => c,
            _ => return Err(config_mismatch(node)),
        };
        let condition = self
            .sandbox
            .eval_expression(&cfg.condition, &self.api, context, &mut state.variables)
            .await?;
        let branch = if value::truthy(&condition) {
            port::TRUE
        } else {
            port::FALSE
        };
        tracing::debug!(node = %node.id, branch, "condition evaluated");
        Ok(Dispatch::route(branch, value::incoming(context)))
    }

    /// Matches the stringified evaluation against the ordered case list;
    /// routes `case_<index>` or `default` with the evaluated value.
    pub(crate) async fn switch(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let node = flow.node(idx);
        let cfg = match flow.config(idx) {
            NodeConfig::Switch(c) => c,
            _ => return Err(config_mismatch(node)),
        };
        let evaluated = self
            .sandbox
            .eval_expression(&cfg.expression, &self.api, context, &mut state.variables)
            .await?;
        let text = value::stringify(&evaluated);
        let branch = cfg
            .cases
            .iter()
            .position(|case| case == &text)
            .map(port::case)
            .unwrap_or_else(|| port::DEFAULT.to_string());
        tracing::debug!(node = %node.id, case = %text, branch = %branch, "switch evaluated");
        Ok(Dispatch::route(branch, evaluated))
    }

    /// Runs the `body` sub-graph once per iteration, depth-first, with the
    /// index variable bound; routes `done` afterwards.
    pub(crate) async fn for_loop(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let cfg = match flow.config(idx) {
            NodeConfig::ForLoop(c) => c.clone(),
            _ => return Err(config_mismatch(flow.node(idx))),
        };
        for i in 0..cfg.count {
            if self.aborted() {
                return Err(EngineError::Aborted);
            }
            state
                .variables
                .insert(cfg.index_variable.clone(), json!(i));
            self.route(flow, state, idx, port::BODY, context, json!(i))
                .await?;
        }
        Ok(Dispatch::route(
            port::DONE,
            json!({ "iterations": cfg.count }),
        ))
    }

    /// Re-evaluates the condition before each `body` iteration, bounded by
    /// `maxIterations`.
    pub(crate) async fn while_loop(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let cfg = match flow.config(idx) {
            NodeConfig::WhileLoop(c) => c.clone(),
            _ => return Err(config_mismatch(flow.node(idx))),
        };
        let mut iterations = 0u64;
        while iterations < cfg.max_iterations {
            if self.aborted() {
                return Err(EngineError::Aborted);
            }
            let condition = self
                .sandbox
                .eval_expression(&cfg.condition, &self.api, context, &mut state.variables)
                .await?;
            if !value::truthy(&condition) {
                break;
            }
            self.route(flow, state, idx, port::BODY, context, json!(iterations))
                .await?;
            iterations += 1;
        }
        Ok(Dispatch::route(
            port::DONE,
            json!({ "iterations": iterations }),
        ))
    }

    /// Evaluates the source expression to an array and fires `loop` once per
    /// element with item/index bound; routes `done` with the element count.
    pub(crate) async fn foreach(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let cfg = match flow.config(idx) {
            NodeConfig::Foreach(c) => c.clone(),
            _ => return Err(config_mismatch(flow.node(idx))),
        };
        let source = self
            .sandbox
            .eval_expression(
                &cfg.source_expression,
                &self.api,
                context,
                &mut state.variables,
            )
            .await?;
        let items = match source {
            Value::Array(items) => items,
            other => {
                return Err(EngineError::Config(format!(
                    "foreach source must be an array, got {}",
                    value::type_name(&other)
                )))
            }
        };
        let count = items.len();
        for (i, item) in items.into_iter().enumerate() {
            if self.aborted() {
                return Err(EngineError::Aborted);
            }
            state.variables.insert(cfg.index_variable.clone(), json!(i));
            state
                .variables
                .insert(cfg.item_variable.clone(), item.clone());
            self.route(flow, state, idx, port::LOOP, context, item)
                .await?;
        }
        Ok(Dispatch::route(port::DONE, json!({ "count": count })))
    }

    /// Records one value per connected input port; emits the aggregate only
    /// once every connected port has reported, otherwise stays waiting with
    /// the accumulator intact for a later invocation under the same node id.
    pub(crate) fn merge(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        context: &Value,
        via_port: Option<&str>,
    ) -> Result<Dispatch, EngineError> {
        let node = flow.node(idx);
        let cfg = match flow.config(idx) {
            NodeConfig::Merge(c) => c,
            _ => return Err(config_mismatch(node)),
        };
        let port_id = via_port.unwrap_or(port::IN).to_string();
        let connected = flow.merge_ports(idx);

        let ready = {
            let slot = state.merges.entry(node.id.clone()).or_default();
            slot.insert(port_id, value::incoming(context));
            !connected.is_empty() && connected.iter().all(|p| slot.contains_key(p))
        };
        if !ready {
            tracing::debug!(node = %node.id, "merge waiting for remaining ports");
            return Ok(Dispatch::Waiting);
        }

        // Cleared on emission so a later wave re-accumulates from scratch.
        let slot = state.merges.remove(&node.id).unwrap_or_default();
        let aggregate = match cfg.output {
            MergeOutput::Object => Value::Object(slot),
            MergeOutput::Array => Value::Array(
                connected
                    .iter()
                    .filter_map(|p| slot.get(p).cloned())
                    .collect(),
            ),
        };
        Ok(Dispatch::out(aggregate))
    }
}
