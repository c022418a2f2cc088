use fluxcore::{FlowDefinition, FlowError, NodeConfig, NodeDef, NodeKind};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use std::collections::HashMap;

/// A flow definition compiled for execution.
///
/// Compilation validates the document up front (per-kind config parsing,
/// edge endpoint resolution) and precomputes the lookups the executor needs:
/// per-(node, output-port) edge lists in definition order and each merge
/// node's set of connected input ports.
pub struct CompiledFlow {
    def: FlowDefinition,
    configs: Vec<NodeConfig>,
    index: HashMap<String, usize>,
    out_edges: HashMap<(usize, String), Vec<usize>>,
    merge_ports: HashMap<usize, Vec<String>>,
    graph: DiGraph<usize, usize>,
}

impl CompiledFlow {
    pub fn compile(def: FlowDefinition) -> Result<Self, FlowError> {
        let mut index = HashMap::new();
        for (i, node) in def.nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(FlowError::DuplicateNode(node.id.clone()));
            }
        }

        let mut configs = Vec::with_capacity(def.nodes.len());
        for node in &def.nodes {
            configs.push(NodeConfig::compile(node)?);
        }

        let mut graph = DiGraph::new();
        let indices: Vec<_> = (0..def.nodes.len()).map(|i| graph.add_node(i)).collect();

        let mut out_edges: HashMap<(usize, String), Vec<usize>> = HashMap::new();
        let mut merge_ports: HashMap<usize, Vec<String>> = HashMap::new();
        for (e, edge) in def.edges.iter().enumerate() {
            let source = *index.get(&edge.source_node_id).ok_or_else(|| {
                FlowError::UnknownEdgeNode {
                    edge: edge.id.clone(),
                    node: edge.source_node_id.clone(),
                }
            })?;
            let target = *index.get(&edge.target_node_id).ok_or_else(|| {
                FlowError::UnknownEdgeNode {
                    edge: edge.id.clone(),
                    node: edge.target_node_id.clone(),
                }
            })?;
            if edge.disabled {
                continue;
            }
            graph.add_edge(indices[source], indices[target], e);
            out_edges
                .entry((source, edge.source_port_id.clone()))
                .or_default()
                .push(e);
            if def.nodes[target].node_type == NodeKind::Merge {
                let ports = merge_ports.entry(target).or_default();
                if !ports.contains(&edge.target_port_id) {
                    ports.push(edge.target_port_id.clone());
                }
            }
        }

        let compiled = Self {
            def,
            configs,
            index,
            out_edges,
            merge_ports,
            graph,
        };
        if compiled.is_cyclic() {
            tracing::debug!(
                flow = %compiled.def.id,
                "flow graph contains cycles; the dispatch limit bounds execution"
            );
        }
        Ok(compiled)
    }

    pub fn definition(&self) -> &FlowDefinition {
        &self.def
    }

    pub fn id(&self) -> &str {
        &self.def.id
    }

    pub fn node(&self, idx: usize) -> &NodeDef {
        &self.def.nodes[idx]
    }

    pub fn config(&self, idx: usize) -> &NodeConfig {
        &self.configs[idx]
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn edge(&self, idx: usize) -> &fluxcore::EdgeDef {
        &self.def.edges[idx]
    }

    /// Enabled edges leaving `port` of node `idx`, in definition order.
    pub fn edges_from(&self, idx: usize, port: &str) -> &[usize] {
        self.out_edges
            .get(&(idx, port.to_string()))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_error_edge(&self, idx: usize) -> bool {
        !self.edges_from(idx, fluxcore::port::ERROR).is_empty()
    }

    /// Enabled `start` nodes in definition order.
    pub fn start_nodes(&self) -> Vec<usize> {
        self.def
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.node_type == NodeKind::Start && !n.disabled)
            .map(|(i, _)| i)
            .collect()
    }

    /// Input ports of a merge node with at least one enabled inbound edge,
    /// in definition order.
    pub fn merge_ports(&self, idx: usize) -> &[String] {
        self.merge_ports
            .get(&idx)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }
}
