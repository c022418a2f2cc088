//! Scripting, System API access, variables, logging and client-surface
//! nodes.

use crate::executor::{config_mismatch, Dispatch, ExecState, FlowExecutor};
use crate::graph::CompiledFlow;
use crate::sandbox::ScriptSandbox;
use fluxcore::{port, value, EngineError, LogLevel, NodeConfig, RateLimitMode, Severity};
use fluxhost::{utils, AiApi, DataApi, FileApi, ShoppingApi, SpeechApi, StoreApi};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

impl FlowExecutor {
    /// Produces a payload from the node script or the configured literal.
    pub(crate) async fn manual_trigger(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let node = flow.node(idx);
        let cfg = match flow.config(idx) {
            NodeConfig::ManualTrigger(c) => c,
            _ => return Err(config_mismatch(node)),
        };
        let payload = match &node.script {
            Some(script) => {
                self.sandbox
                    .execute(script, &self.api, context, &mut state.variables)
                    .await?
            }
            None => cfg.payload.clone().unwrap_or(Value::Null),
        };
        Ok(Dispatch::out(payload))
    }

    /// Runs the node script in the sandbox; the script's return value is the
    /// node result.
    pub(crate) async fn script(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let node = flow.node(idx);
        let source = node
            .script
            .as_deref()
            .ok_or_else(|| EngineError::Config(format!("node {} has no script", node.id)))?;
        let result = self
            .sandbox
            .execute(source, &self.api, context, &mut state.variables)
            .await?;
        Ok(Dispatch::out(result))
    }

    /// Invokes a configured System API method by dotted name.
    pub(crate) async fn system_api(
        &self,
        flow: &CompiledFlow,
        idx: usize,
    ) -> Result<Dispatch, EngineError> {
        let node = flow.node(idx);
        let cfg = match flow.config(idx) {
            NodeConfig::SystemApi(c) => c,
            _ => return Err(config_mismatch(node)),
        };
        self.api
            .log(LogLevel::Info, format!("system api call: {}", cfg.method));
        let args = cfg.args.clone().unwrap_or(Value::Null);

        let result = match cfg.method.as_str() {
            "data.persons" | "data.getPersons" => self.api.data.persons().await?,
            "data.tasks" | "data.getTasks" => self.api.data.tasks().await?,
            "data.projects" | "data.getProjects" => self.api.data.projects().await?,
            "data.shoppingLists" | "data.getShoppingLists" => {
                self.api.data.shopping_lists().await?
            }
            "store.all" | "variables.getAll" => self.api.store.all().await?,
            "store.get" | "variables.get" => {
                self.api.store.get(str_arg(&args, "key")?).await?
            }
            "store.set" | "variables.set" => {
                let val = args.get("value").cloned().unwrap_or(Value::Null);
                self.api
                    .store
                    .set(str_arg(&args, "key")?, val.clone())
                    .await?;
                val
            }
            "file.read" => json!(self.api.file.read(str_arg(&args, "path")?).await?),
            "file.write" => {
                self.api
                    .file
                    .write(str_arg(&args, "path")?, str_arg(&args, "contents")?)
                    .await?;
                json!(true)
            }
            "file.list" => json!(self.api.file.list(str_arg(&args, "path")?).await?),
            "notify" => {
                self.api
                    .notify(str_arg(&args, "message")?, severity_arg(&args))?;
                json!(true)
            }
            "shopping.createList" => {
                self.api.shopping.create_list(str_arg(&args, "name")?).await?
            }
            "shopping.addItem" => {
                self.api
                    .shopping
                    .add_item(str_arg(&args, "list")?, str_arg(&args, "item")?)
                    .await?
            }
            "shopping.checkItem" => {
                self.api
                    .shopping
                    .check_item(str_arg(&args, "list")?, str_arg(&args, "item")?)
                    .await?
            }
            "utils.uuid" => json!(utils::uuid()),
            "utils.sleep" => {
                let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(0);
                utils::sleep(ms).await;
                json!(true)
            }
            "ai.isConfigured" => json!(self.api.ai.is_configured()),
            "speech.isTtsConfigured" => json!(self.api.speech.is_tts_configured()),
            "speech.isSttConfigured" => json!(self.api.speech.is_stt_configured()),
            other => {
                return Err(EngineError::Config(format!(
                    "unknown system api method: {}",
                    other
                )))
            }
        };
        Ok(Dispatch::out(result))
    }

    pub(crate) fn read_variable(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
    ) -> Result<Dispatch, EngineError> {
        let cfg = match flow.config(idx) {
            NodeConfig::Variable(c) => c,
            _ => return Err(config_mismatch(flow.node(idx))),
        };
        let val = state
            .variables
            .get(&cfg.variable_name)
            .cloned()
            .unwrap_or(Value::Null);
        Ok(Dispatch::out(val))
    }

    /// Writes the configured literal, or the upstream result when no literal
    /// is set.
    pub(crate) fn write_variable(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let cfg = match flow.config(idx) {
            NodeConfig::Variable(c) => c,
            _ => return Err(config_mismatch(flow.node(idx))),
        };
        let val = cfg
            .value
            .clone()
            .unwrap_or_else(|| value::incoming(context));
        state
            .variables
            .insert(cfg.variable_name.clone(), val.clone());
        Ok(Dispatch::out(val))
    }

    /// Writes through the System API logger, optionally serializing the
    /// upstream result; passes the upstream result through.
    pub(crate) fn log_node(
        &self,
        flow: &CompiledFlow,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let node = flow.node(idx);
        let cfg = match flow.config(idx) {
            NodeConfig::Log(c) => c,
            _ => return Err(config_mismatch(node)),
        };
        let incoming = value::incoming(context);
        let mut message = cfg
            .message
            .clone()
            .unwrap_or_else(|| node.label().to_string());
        if cfg.include_result {
            message = format!("{}: {}", message, incoming);
        }
        self.api.log(cfg.level, message);
        Ok(Dispatch::out(incoming))
    }

    /// Builds a prompt (literal or scripted) and awaits the AI chat
    /// capability.
    pub(crate) async fn llm_call(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let node = flow.node(idx);
        let cfg = match flow.config(idx) {
            NodeConfig::LlmCall(c) => c,
            _ => return Err(config_mismatch(node)),
        };
        let prompt = match &node.script {
            Some(script) => {
                let built = self
                    .sandbox
                    .execute(script, &self.api, context, &mut state.variables)
                    .await?;
                value::stringify(&built)
            }
            None => cfg.prompt.clone().ok_or_else(|| {
                EngineError::Config(format!("node {} has neither prompt nor script", node.id))
            })?,
        };
        tracing::debug!(node = %node.id, "awaiting chat completion");
        let reply = self.api.ai.chat(&prompt).await?;
        Ok(Dispatch::out(json!(reply)))
    }

    /// Client-only: raises a notification or fails explicitly on hosts
    /// without that surface.
    pub(crate) fn notification(
        &self,
        flow: &CompiledFlow,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let cfg = match flow.config(idx) {
            NodeConfig::Notification(c) => c,
            _ => return Err(config_mismatch(flow.node(idx))),
        };
        let message = cfg
            .message
            .clone()
            .unwrap_or_else(|| value::stringify(&value::incoming(context)));
        self.api.notify(message.clone(), cfg.severity)?;
        Ok(Dispatch::out(
            json!({ "message": message, "severity": cfg.severity }),
        ))
    }

    /// Client-only: speaks the configured text or the upstream result.
    pub(crate) async fn tts(
        &self,
        flow: &CompiledFlow,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let cfg = match flow.config(idx) {
            NodeConfig::Tts(c) => c,
            _ => return Err(config_mismatch(flow.node(idx))),
        };
        let text = cfg
            .text
            .clone()
            .unwrap_or_else(|| value::stringify(&value::incoming(context)));
        self.api.speech.say(&text).await?;
        Ok(Dispatch::out(json!(text)))
    }

    /// Client-only: waits for a transcript from the speech recognizer.
    pub(crate) async fn stt(&self) -> Result<Dispatch, EngineError> {
        let transcript = self.api.speech.listen().await?;
        Ok(Dispatch::out(json!(transcript)))
    }

    /// `delay` sleeps and continues; `throttle` keeps a per-node last-fired
    /// timestamp and routes `skipped` inside the interval. `debounce`
    /// behaves like `delay`: a trailing-edge cancel-and-wait variant would
    /// need per-node timers the engine does not keep.
    pub(crate) async fn rate_limit(
        &self,
        flow: &CompiledFlow,
        state: &mut ExecState,
        idx: usize,
        context: &Value,
    ) -> Result<Dispatch, EngineError> {
        let node = flow.node(idx);
        let cfg = match flow.config(idx) {
            NodeConfig::RateLimit(c) => c,
            _ => return Err(config_mismatch(node)),
        };
        match cfg.mode {
            RateLimitMode::Delay | RateLimitMode::Debounce => {
                utils::sleep(cfg.interval_ms).await;
                Ok(Dispatch::out(value::incoming(context)))
            }
            RateLimitMode::Throttle => {
                let interval = Duration::from_millis(cfg.interval_ms);
                let open = state
                    .throttle
                    .get(&node.id)
                    .map_or(true, |last| last.elapsed() >= interval);
                if open {
                    state.throttle.insert(node.id.clone(), Instant::now());
                    Ok(Dispatch::out(value::incoming(context)))
                } else {
                    tracing::debug!(node = %node.id, "throttled");
                    Ok(Dispatch::route(port::SKIPPED, value::incoming(context)))
                }
            }
        }
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str, EngineError> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| {
        EngineError::Config(format!("system api call is missing string arg: {}", key))
    })
}

fn severity_arg(args: &Value) -> Severity {
    match args.get("severity").and_then(Value::as_str) {
        Some("warning") | Some("warn") => Severity::Warning,
        Some("alert") | Some("error") => Severity::Alert,
        _ => Severity::Info,
    }
}
