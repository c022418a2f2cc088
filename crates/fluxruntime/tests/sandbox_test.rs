// crates/fluxruntime/tests/sandbox_test.rs

use fluxcore::EngineError;
use fluxhost::hosts::{headless, MemoryHost};
use fluxhost::SystemApi;
use fluxruntime::{LuaSandbox, ScriptSandbox};
use serde_json::{json, Map, Value};

fn api() -> SystemApi {
    MemoryHost::new().into_api()
}

fn vars(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn bare_expressions_are_wrapped_and_evaluated() {
    let sandbox = LuaSandbox::new();
    let mut variables = Map::new();
    let result = sandbox
        .eval_expression("1 + 2", &api(), &Value::Null, &mut variables)
        .await
        .expect("expression should evaluate");
    assert_eq!(result, json!(3));
}

#[tokio::test]
async fn full_statement_bodies_run_as_chunks() {
    let sandbox = LuaSandbox::new();
    let mut variables = Map::new();
    let result = sandbox
        .execute(
            "local doubled = 10 * 2\nreturn doubled + 2",
            &api(),
            &Value::Null,
            &mut variables,
        )
        .await
        .expect("script should run");
    assert_eq!(result, json!(22));
}

#[tokio::test]
async fn input_context_is_visible() {
    let sandbox = LuaSandbox::new();
    let mut variables = Map::new();
    let input = json!({"value": 7, "_result": {"nested": true}});
    let result = sandbox
        .execute(
            "if input._result.nested then return input.value + 1 end",
            &api(),
            &input,
            &mut variables,
        )
        .await
        .expect("script should run");
    assert_eq!(result, json!(8));
}

#[tokio::test]
async fn variable_mutations_are_visible_after_the_call() {
    let sandbox = LuaSandbox::new();
    let mut variables = vars(&[("count", json!(1))]);
    let result = sandbox
        .execute(
            "variables.count = variables.count + 1\nvariables.fresh = 'yes'\nreturn variables.count",
            &api(),
            &Value::Null,
            &mut variables,
        )
        .await
        .expect("script should run");
    assert_eq!(result, json!(2));
    assert_eq!(variables["count"], json!(2));
    assert_eq!(variables["fresh"], json!("yes"));
}

#[tokio::test]
async fn script_failures_surface_as_script_errors() {
    let sandbox = LuaSandbox::new();
    let mut variables = Map::new();
    let err = sandbox
        .execute("error('nope')", &api(), &Value::Null, &mut variables)
        .await
        .expect_err("script should fail");
    match &err {
        EngineError::Script(message) => assert!(message.contains("nope")),
        other => panic!("unexpected error: {:?}", other),
    }
    // Script errors are node-local, never guard rails.
    assert!(!err.is_guard_rail());
}

#[tokio::test]
async fn scripts_can_log_through_the_api_binding() {
    let sandbox = LuaSandbox::new();
    let api = api();
    let mut variables = Map::new();
    sandbox
        .execute(
            "api.log.info('hi from lua')\napi.notify('ding', 'warning')\nreturn true",
            &api,
            &Value::Null,
            &mut variables,
        )
        .await
        .expect("script should run");

    assert!(api.logs().iter().any(|e| e.message == "hi from lua"));
    assert!(api.notifications().iter().any(|n| n.message == "ding"));
}

#[tokio::test]
async fn notify_fails_inside_scripts_on_headless_hosts() {
    let sandbox = LuaSandbox::new();
    let api = headless(&api());
    let mut variables = Map::new();
    let err = sandbox
        .execute("api.notify('ding')", &api, &Value::Null, &mut variables)
        .await
        .expect_err("notify should fail");
    assert!(err.to_string().contains("not supported"));
}

#[tokio::test]
async fn utility_bindings_are_available() {
    let sandbox = LuaSandbox::new();
    let mut variables = Map::new();
    let result = sandbox
        .execute(
            "return { id = api.utils.uuid(), at = api.utils.timestamp() }",
            &api(),
            &Value::Null,
            &mut variables,
        )
        .await
        .expect("script should run");
    assert!(!result["id"].as_str().expect("uuid").is_empty());
    assert!(result["at"].as_i64().expect("timestamp") > 0);
}

#[tokio::test]
async fn dangerous_globals_are_scrubbed() {
    let sandbox = LuaSandbox::new();
    let mut variables = Map::new();
    let result = sandbox
        .execute(
            "return os == nil and io == nil and require == nil",
            &api(),
            &Value::Null,
            &mut variables,
        )
        .await
        .expect("script should run");
    assert_eq!(result, json!(true));
}

#[tokio::test]
async fn each_call_gets_a_fresh_vm() {
    let sandbox = LuaSandbox::new();
    let mut variables = Map::new();
    sandbox
        .execute("leak = 42 return true", &api(), &Value::Null, &mut variables)
        .await
        .expect("first call should run");
    let result = sandbox
        .execute("return leak == nil", &api(), &Value::Null, &mut variables)
        .await
        .expect("second call should run");
    assert_eq!(result, json!(true));
}
