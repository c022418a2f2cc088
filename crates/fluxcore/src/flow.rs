use crate::node::NodeKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known port ids used by the built-in node kinds.
pub mod port {
    pub const IN: &str = "in";
    pub const OUT: &str = "out";
    pub const TRUE: &str = "true";
    pub const FALSE: &str = "false";
    pub const ERROR: &str = "error";
    pub const DONE: &str = "done";
    pub const BODY: &str = "body";
    pub const LOOP: &str = "loop";
    pub const SKIPPED: &str = "skipped";
    pub const DEFAULT: &str = "default";

    /// Port id for the `switch` branch matching case `index`.
    pub fn case(index: usize) -> String {
        format!("case_{}", index)
    }
}

/// Complete flow definition, loaded read-only for each execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: u32,
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
    #[serde(default)]
    pub variables: Vec<VariableDeclaration>,
}

impl FlowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: 1,
            nodes: Vec::new(),
            edges: Vec::new(),
            variables: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: NodeDef) -> String {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Connect an output port of one node to an input port of another.
    pub fn connect(
        &mut self,
        source_node: impl Into<String>,
        source_port: impl Into<String>,
        target_node: impl Into<String>,
        target_port: impl Into<String>,
    ) {
        let id = format!("e{}", self.edges.len() + 1);
        self.edges.push(EdgeDef {
            id,
            source_node_id: source_node.into(),
            source_port_id: source_port.into(),
            target_node_id: target_node.into(),
            target_port_id: target_port.into(),
            disabled: false,
        });
    }

    pub fn declare_variable(&mut self, name: impl Into<String>, default_value: Value) {
        self.variables.push(VariableDeclaration {
            name: name.into(),
            default_value,
        });
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// One step in a flow, tagged by node kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDef {
    pub id: String,
    pub node_type: NodeKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default)]
    pub inputs: Vec<PortDef>,
    #[serde(default)]
    pub outputs: Vec<PortDef>,
    #[serde(default)]
    pub disabled: bool,
}

impl NodeDef {
    pub fn new(id: impl Into<String>, node_type: NodeKind) -> Self {
        Self {
            id: id.into(),
            node_type,
            name: None,
            config: Map::new(),
            script: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            disabled: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Display name, falling back to the node id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Directed, port-qualified connection between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDef {
    pub id: String,
    pub source_node_id: String,
    pub source_port_id: String,
    pub target_node_id: String,
    pub target_port_id: String,
    #[serde(default)]
    pub disabled: bool,
}

/// Named socket on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDef {
    pub id: String,
    pub direction: PortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

/// Seeds one entry of the per-execution variable map
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDeclaration {
    pub name: String,
    #[serde(default)]
    pub default_value: Value,
}
