use crate::error::FlowError;
use crate::flow::NodeDef;
use crate::trace::LogLevel;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of node kinds the engine can execute.
///
/// The wire tag is the snake_case kind name; `js_execute` is accepted as an
/// alias for `script` so documents produced by the original authoring tool
/// keep loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    ManualTrigger,
    WebhookTrigger,
    ScheduleTrigger,
    #[serde(alias = "js_execute")]
    Script,
    SystemApi,
    IfElse,
    Switch,
    ForLoop,
    WhileLoop,
    Foreach,
    ReadVariable,
    WriteVariable,
    Log,
    LlmCall,
    Notification,
    Tts,
    Stt,
    CallFlow,
    RateLimit,
    Comment,
    Merge,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::ManualTrigger => "manual_trigger",
            NodeKind::WebhookTrigger => "webhook_trigger",
            NodeKind::ScheduleTrigger => "schedule_trigger",
            NodeKind::Script => "script",
            NodeKind::SystemApi => "system_api",
            NodeKind::IfElse => "if_else",
            NodeKind::Switch => "switch",
            NodeKind::ForLoop => "for_loop",
            NodeKind::WhileLoop => "while_loop",
            NodeKind::Foreach => "foreach",
            NodeKind::ReadVariable => "read_variable",
            NodeKind::WriteVariable => "write_variable",
            NodeKind::Log => "log",
            NodeKind::LlmCall => "llm_call",
            NodeKind::Notification => "notification",
            NodeKind::Tts => "tts",
            NodeKind::Stt => "stt",
            NodeKind::CallFlow => "call_flow",
            NodeKind::RateLimit => "rate_limit",
            NodeKind::Comment => "comment",
            NodeKind::Merge => "merge",
        }
    }

    /// Kinds that can begin an execution.
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            NodeKind::Start
                | NodeKind::ManualTrigger
                | NodeKind::WebhookTrigger
                | NodeKind::ScheduleTrigger
        )
    }

    /// Kinds that require a client-side surface (notification banner,
    /// speakers, microphone). A headless host must refuse these.
    pub fn is_client_only(&self) -> bool {
        matches!(self, NodeKind::Notification | NodeKind::Tts | NodeKind::Stt)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualTriggerConfig {
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemApiConfig {
    pub method: String,
    #[serde(default)]
    pub args: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfElseConfig {
    pub condition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchConfig {
    pub expression: String,
    #[serde(default)]
    pub cases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForLoopConfig {
    pub count: u64,
    #[serde(default = "default_index_variable")]
    pub index_variable: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhileLoopConfig {
    pub condition: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeachConfig {
    pub source_expression: String,
    #[serde(default = "default_item_variable")]
    pub item_variable: String,
    #[serde(default = "default_index_variable")]
    pub index_variable: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableConfig {
    pub variable_name: String,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_true")]
    pub include_result: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmCallConfig {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub severity: crate::trace::Severity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsConfig {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFlowConfig {
    pub flow_id: String,
    #[serde(default)]
    pub pass_input: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitMode {
    Delay,
    Throttle,
    Debounce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub mode: RateLimitMode,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutput {
    #[default]
    Object,
    Array,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeConfig {
    #[serde(default)]
    pub output: MergeOutput,
}

fn default_index_variable() -> String {
    "index".to_string()
}

fn default_item_variable() -> String {
    "item".to_string()
}

fn default_max_iterations() -> u64 {
    1000
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

/// Typed, validated view of a node's raw `config` map.
///
/// Compiled once at flow-load time so malformed flows fail before any node
/// dispatches.
#[derive(Debug, Clone)]
pub enum NodeConfig {
    None,
    ManualTrigger(ManualTriggerConfig),
    Script,
    SystemApi(SystemApiConfig),
    IfElse(IfElseConfig),
    Switch(SwitchConfig),
    ForLoop(ForLoopConfig),
    WhileLoop(WhileLoopConfig),
    Foreach(ForeachConfig),
    Variable(VariableConfig),
    Log(LogConfig),
    LlmCall(LlmCallConfig),
    Notification(NotificationConfig),
    Tts(TtsConfig),
    CallFlow(CallFlowConfig),
    RateLimit(RateLimitConfig),
    Merge(MergeConfig),
}

impl NodeConfig {
    pub fn compile(node: &NodeDef) -> Result<Self, FlowError> {
        let config = match node.node_type {
            NodeKind::Start
            | NodeKind::WebhookTrigger
            | NodeKind::ScheduleTrigger
            | NodeKind::Comment
            | NodeKind::Stt => NodeConfig::None,
            NodeKind::ManualTrigger => NodeConfig::ManualTrigger(section(node)?),
            NodeKind::Script => {
                if node.script.as_deref().map_or(true, |s| s.trim().is_empty()) {
                    return Err(FlowError::MissingScript(node.id.clone()));
                }
                NodeConfig::Script
            }
            NodeKind::SystemApi => NodeConfig::SystemApi(section(node)?),
            NodeKind::IfElse => {
                let cfg: IfElseConfig = section(node)?;
                if cfg.condition.trim().is_empty() {
                    return Err(FlowError::InvalidConfig {
                        node: node.id.clone(),
                        reason: "condition must not be empty".to_string(),
                    });
                }
                NodeConfig::IfElse(cfg)
            }
            NodeKind::Switch => NodeConfig::Switch(section(node)?),
            NodeKind::ForLoop => NodeConfig::ForLoop(section(node)?),
            NodeKind::WhileLoop => NodeConfig::WhileLoop(section(node)?),
            NodeKind::Foreach => NodeConfig::Foreach(section(node)?),
            NodeKind::ReadVariable | NodeKind::WriteVariable => {
                NodeConfig::Variable(section(node)?)
            }
            NodeKind::Log => NodeConfig::Log(section(node)?),
            NodeKind::LlmCall => {
                let cfg: LlmCallConfig = section(node)?;
                if cfg.prompt.is_none() && node.script.is_none() {
                    return Err(FlowError::InvalidConfig {
                        node: node.id.clone(),
                        reason: "llm_call needs either a prompt or a script".to_string(),
                    });
                }
                NodeConfig::LlmCall(cfg)
            }
            NodeKind::Notification => NodeConfig::Notification(section(node)?),
            NodeKind::Tts => NodeConfig::Tts(section(node)?),
            NodeKind::CallFlow => {
                let cfg: CallFlowConfig = section(node)?;
                if cfg.flow_id.trim().is_empty() {
                    return Err(FlowError::InvalidConfig {
                        node: node.id.clone(),
                        reason: "flowId must not be empty".to_string(),
                    });
                }
                NodeConfig::CallFlow(cfg)
            }
            NodeKind::RateLimit => NodeConfig::RateLimit(section(node)?),
            NodeKind::Merge => NodeConfig::Merge(section(node)?),
        };
        Ok(config)
    }
}

/// Deserialize a node's raw config map into the kind-specific struct.
fn section<T: DeserializeOwned>(node: &NodeDef) -> Result<T, FlowError> {
    serde_json::from_value(Value::Object(node.config.clone())).map_err(|e| {
        FlowError::InvalidConfig {
            node: node.id.clone(),
            reason: e.to_string(),
        }
    })
}
