use fluxcore::FlowDefinition;
use std::collections::HashMap;
use std::sync::RwLock;

/// Resolves sub-flow ids for `call_flow` nodes.
pub trait FlowRegistry: Send + Sync {
    fn get_flow_by_id(&self, id: &str) -> Option<FlowDefinition>;
}

/// Registry of flows known to a runtime.
#[derive(Default)]
pub struct InMemoryFlowRegistry {
    flows: RwLock<HashMap<String, FlowDefinition>>,
}

impl InMemoryFlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flow, replacing any previous definition with the same id.
    pub fn register(&self, flow: FlowDefinition) {
        tracing::info!(flow = %flow.id, name = %flow.name, "registering flow");
        self.flows
            .write()
            .expect("flow registry poisoned")
            .insert(flow.id.clone(), flow);
    }

    pub fn list_flow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .flows
            .read()
            .expect("flow registry poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

impl FlowRegistry for InMemoryFlowRegistry {
    fn get_flow_by_id(&self, id: &str) -> Option<FlowDefinition> {
        self.flows
            .read()
            .expect("flow registry poisoned")
            .get(id)
            .cloned()
    }
}
