use async_trait::async_trait;
use fluxcore::{EngineError, LogLevel, Severity};
use fluxhost::{utils, SystemApi};
use mlua::{Lua, LuaSerdeExt, SerializeOptions};
use serde_json::{Map, Value};

/// Script-evaluation facility exposed to scriptable nodes.
///
/// Each call sees exactly three bindings: `input` (the current context,
/// including the upstream `_result`), `variables` (the live flow-scoped
/// variable map; mutations are visible downstream) and `api` (the sync-safe
/// System API surface). Script failures surface as [`EngineError::Script`]
/// and are catchable through a node's `error` port.
#[async_trait]
pub trait ScriptSandbox: Send + Sync {
    async fn execute(
        &self,
        source: &str,
        api: &SystemApi,
        input: &Value,
        variables: &mut Map<String, Value>,
    ) -> Result<Value, EngineError>;

    /// Evaluate a bare expression such as a branch condition. The source is
    /// wrapped as `return (<expr>)` before evaluation.
    async fn eval_expression(
        &self,
        expr: &str,
        api: &SystemApi,
        input: &Value,
        variables: &mut Map<String, Value>,
    ) -> Result<Value, EngineError> {
        let wrapped = format!("return ({})", expr);
        self.execute(&wrapped, api, input, variables).await
    }
}

/// Lua-backed sandbox. One fresh, scrubbed VM per call; nothing survives
/// between invocations except what scripts write into `variables`.
#[derive(Default)]
pub struct LuaSandbox;

impl LuaSandbox {
    pub fn new() -> Self {
        Self
    }

    fn eval(
        &self,
        source: &str,
        api: &SystemApi,
        input: &Value,
        variables: &mut Map<String, Value>,
    ) -> Result<Value, EngineError> {
        let lua = Lua::new();
        let globals = lua.globals();

        // No filesystem, process or module access from inside a flow.
        for name in [
            "os",
            "io",
            "package",
            "debug",
            "require",
            "dofile",
            "load",
            "loadstring",
            "collectgarbage",
        ] {
            globals.set(name, mlua::Value::Nil).map_err(script_err)?;
        }

        // JSON null must land as Lua nil, not the null sentinel, so
        // `input.missing == nil` behaves the way script authors expect.
        let options = SerializeOptions::new()
            .serialize_none_to_null(false)
            .serialize_unit_to_null(false);
        globals
            .set(
                "input",
                lua.to_value_with(input, options).map_err(script_err)?,
            )
            .map_err(script_err)?;
        globals
            .set(
                "variables",
                lua.to_value_with(&Value::Object(variables.clone()), options)
                    .map_err(script_err)?,
            )
            .map_err(script_err)?;
        globals
            .set("api", api_table(&lua, api).map_err(script_err)?)
            .map_err(script_err)?;

        let result: mlua::Value = lua.load(source).eval().map_err(script_err)?;
        let result: Value = lua.from_value(result).map_err(script_err)?;

        // Mutations made by the script become the new variable map.
        let after: mlua::Value = globals.get("variables").map_err(script_err)?;
        if let Ok(Value::Object(map)) = lua.from_value::<Value>(after) {
            *variables = map;
        }

        Ok(result)
    }
}

#[async_trait]
impl ScriptSandbox for LuaSandbox {
    async fn execute(
        &self,
        source: &str,
        api: &SystemApi,
        input: &Value,
        variables: &mut Map<String, Value>,
    ) -> Result<Value, EngineError> {
        self.eval(source, api, input, variables)
    }
}

fn script_err(e: mlua::Error) -> EngineError {
    EngineError::Script(e.to_string())
}

/// The System API surface scripts can reach synchronously: logging,
/// notifications and utilities. Data queries and AI calls have dedicated
/// node kinds.
fn api_table(lua: &Lua, api: &SystemApi) -> mlua::Result<mlua::Table> {
    let root = lua.create_table()?;

    let log = lua.create_table()?;
    for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
        let sink = api.log_sink();
        log.set(
            level.as_str(),
            lua.create_function(move |_, message: String| {
                sink.push(level, message);
                Ok(())
            })?,
        )?;
    }
    root.set("log", log)?;

    let capabilities = api.capabilities();
    let notifications = api.notification_sink();
    root.set(
        "notify",
        lua.create_function(move |_, (message, severity): (String, Option<String>)| {
            if !capabilities.notifications {
                return Err(mlua::Error::external(
                    "notifications are not supported on this host",
                ));
            }
            let severity = match severity.as_deref() {
                Some("warning") | Some("warn") => Severity::Warning,
                Some("alert") | Some("error") => Severity::Alert,
                _ => Severity::Info,
            };
            notifications.push(message, severity);
            Ok(())
        })?,
    )?;

    let utils_table = lua.create_table()?;
    utils_table.set("uuid", lua.create_function(|_, ()| Ok(utils::uuid()))?)?;
    utils_table.set(
        "now",
        lua.create_function(|_, ()| Ok(utils::now().to_rfc3339()))?,
    )?;
    utils_table.set(
        "timestamp",
        lua.create_function(|_, ()| Ok(utils::now().timestamp_millis()))?,
    )?;
    root.set("utils", utils_table)?;

    Ok(root)
}
