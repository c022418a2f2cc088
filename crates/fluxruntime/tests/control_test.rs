// crates/fluxruntime/tests/control_test.rs

use fluxcore::{FlowDefinition, NodeDef, NodeKind, RunStatus};
use fluxhost::hosts::MemoryHost;
use fluxruntime::FlowRuntime;
use serde_json::{json, Value};

fn runtime() -> FlowRuntime {
    FlowRuntime::new(MemoryHost::new().into_api())
}

fn write_node(id: &str, variable: &str) -> NodeDef {
    NodeDef::new(id, NodeKind::WriteVariable).with_config("variableName", variable)
}

#[tokio::test]
async fn if_else_fires_exactly_one_branch() {
    let mut flow = FlowDefinition::new("branching", "Branching");
    flow.declare_variable("flag", json!(true));
    flow.add_node(NodeDef::new("start", NodeKind::Start));
    flow.add_node(
        NodeDef::new("branch", NodeKind::IfElse).with_config("condition", "variables.flag"),
    );
    flow.add_node(write_node("yes", "took_true"));
    flow.add_node(write_node("no", "took_false"));
    flow.connect("start", "out", "branch", "in");
    flow.connect("branch", "true", "yes", "in");
    flow.connect("branch", "false", "no", "in");

    let result = runtime().execute(&flow, Value::Null).await;
    assert!(result.success, "error: {:?}", result.error);
    assert!(result.variables.contains_key("took_true"));
    assert!(!result.variables.contains_key("took_false"));

    // Flip the flag: the other branch, and only it, fires.
    flow.variables[0].default_value = json!(false);
    let result = runtime().execute(&flow, Value::Null).await;
    assert!(result.success);
    assert!(!result.variables.contains_key("took_true"));
    assert!(result.variables.contains_key("took_false"));
}

#[tokio::test]
async fn if_else_coerces_falsy_values() {
    for (flag, expect_true) in [
        (json!(0), false),
        (json!(""), false),
        (json!("x"), true),
        (json!(2), true),
    ] {
        let mut flow = FlowDefinition::new("coerce", "Coercion");
        flow.declare_variable("flag", flag.clone());
        flow.add_node(NodeDef::new("start", NodeKind::Start));
        flow.add_node(
            NodeDef::new("branch", NodeKind::IfElse).with_config("condition", "variables.flag"),
        );
        flow.add_node(write_node("yes", "took_true"));
        flow.connect("start", "out", "branch", "in");
        flow.connect("branch", "true", "yes", "in");

        let result = runtime().execute(&flow, Value::Null).await;
        assert!(result.success);
        assert_eq!(
            result.variables.contains_key("took_true"),
            expect_true,
            "flag {:?}",
            flag
        );
    }
}

#[tokio::test]
async fn switch_routes_matching_case_or_default() {
    let build = |expression: &str| {
        let mut flow = FlowDefinition::new("switching", "Switching");
        flow.add_node(NodeDef::new("start", NodeKind::Start));
        flow.add_node(
            NodeDef::new("pick", NodeKind::Switch)
                .with_config("expression", expression)
                .with_config("cases", json!(["a", "b"])),
        );
        flow.add_node(write_node("wa", "case_a"));
        flow.add_node(write_node("wb", "case_b"));
        flow.add_node(write_node("wd", "fell_through"));
        flow.connect("start", "out", "pick", "in");
        flow.connect("pick", "case_0", "wa", "in");
        flow.connect("pick", "case_1", "wb", "in");
        flow.connect("pick", "default", "wd", "in");
        flow
    };

    let result = runtime().execute(&build("'b'"), Value::Null).await;
    assert!(result.success);
    assert!(result.variables.contains_key("case_b"));
    assert!(!result.variables.contains_key("case_a"));
    assert!(!result.variables.contains_key("fell_through"));

    let result = runtime().execute(&build("'c'"), Value::Null).await;
    assert!(result.success);
    assert!(result.variables.contains_key("fell_through"));
    assert!(!result.variables.contains_key("case_a"));
    assert!(!result.variables.contains_key("case_b"));
}

#[tokio::test]
async fn for_loop_runs_the_body_once_per_index_in_order() {
    let mut flow = FlowDefinition::new("looping", "Looping");
    flow.declare_variable("seen", json!(""));
    flow.add_node(NodeDef::new("start", NodeKind::Start));
    flow.add_node(
        NodeDef::new("spin", NodeKind::ForLoop)
            .with_config("count", 5)
            .with_config("indexVariable", "i"),
    );
    flow.add_node(
        NodeDef::new("record", NodeKind::Script)
            .with_script("variables.seen = variables.seen .. tostring(variables.i) return variables.seen"),
    );
    flow.add_node(write_node("w", "done_value"));
    flow.connect("start", "out", "spin", "in");
    flow.connect("spin", "body", "record", "in");
    flow.connect("spin", "done", "w", "in");

    let result = runtime().execute(&flow, Value::Null).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.variables["seen"], json!("01234"));
    assert_eq!(result.variables["done_value"]["iterations"], json!(5));
}

#[tokio::test]
async fn while_loop_stops_when_the_condition_turns_false() {
    let mut flow = FlowDefinition::new("while", "While");
    flow.declare_variable("n", json!(0));
    flow.add_node(NodeDef::new("start", NodeKind::Start));
    flow.add_node(
        NodeDef::new("spin", NodeKind::WhileLoop).with_config("condition", "variables.n < 3"),
    );
    flow.add_node(
        NodeDef::new("bump", NodeKind::Script)
            .with_script("variables.n = variables.n + 1 return variables.n"),
    );
    flow.add_node(write_node("w", "done_value"));
    flow.connect("start", "out", "spin", "in");
    flow.connect("spin", "body", "bump", "in");
    flow.connect("spin", "done", "w", "in");

    let result = runtime().execute(&flow, Value::Null).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.variables["n"], json!(3));
    assert_eq!(result.variables["done_value"]["iterations"], json!(3));
}

#[tokio::test]
async fn while_loop_is_bounded_by_max_iterations() {
    let mut flow = FlowDefinition::new("while", "While");
    flow.declare_variable("ticks", json!(0));
    flow.add_node(NodeDef::new("start", NodeKind::Start));
    flow.add_node(
        NodeDef::new("spin", NodeKind::WhileLoop)
            .with_config("condition", "true")
            .with_config("maxIterations", 7),
    );
    flow.add_node(
        NodeDef::new("bump", NodeKind::Script)
            .with_script("variables.ticks = variables.ticks + 1 return variables.ticks"),
    );
    flow.connect("start", "out", "spin", "in");
    flow.connect("spin", "body", "bump", "in");

    let result = runtime().execute(&flow, Value::Null).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.variables["ticks"], json!(7));
}

#[tokio::test]
async fn foreach_visits_every_element_with_item_and_index_bound() {
    let mut flow = FlowDefinition::new("each", "Foreach");
    flow.declare_variable("items", json!([10, 20, 30]));
    flow.declare_variable("sum", json!(0));
    flow.add_node(NodeDef::new("start", NodeKind::Start));
    flow.add_node(
        NodeDef::new("walk", NodeKind::Foreach)
            .with_config("sourceExpression", "variables.items"),
    );
    flow.add_node(
        NodeDef::new("acc", NodeKind::Script)
            .with_script("variables.sum = variables.sum + variables.item + variables.index return variables.sum"),
    );
    flow.add_node(write_node("w", "done_value"));
    flow.connect("start", "out", "walk", "in");
    flow.connect("walk", "loop", "acc", "in");
    flow.connect("walk", "done", "w", "in");

    let result = runtime().execute(&flow, Value::Null).await;

    assert!(result.success, "error: {:?}", result.error);
    // 10 + 20 + 30 plus indexes 0 + 1 + 2
    assert_eq!(result.variables["sum"], json!(63));
    assert_eq!(result.variables["done_value"]["count"], json!(3));
}

#[tokio::test]
async fn foreach_rejects_non_array_sources() {
    let mut flow = FlowDefinition::new("each", "Foreach");
    flow.add_node(NodeDef::new("start", NodeKind::Start));
    flow.add_node(
        NodeDef::new("walk", NodeKind::Foreach).with_config("sourceExpression", "5"),
    );
    flow.connect("start", "out", "walk", "in");

    let result = runtime().execute(&flow, Value::Null).await;

    assert!(!result.success);
    assert!(result.error.expect("error expected").contains("array"));
}

#[tokio::test]
async fn merge_emits_once_after_both_ports() {
    let mut flow = FlowDefinition::new("joining", "Joining");
    flow.add_node(NodeDef::new("a", NodeKind::Start));
    flow.add_node(NodeDef::new("b", NodeKind::Start));
    flow.add_node(NodeDef::new("left-value", NodeKind::Script).with_script("return 'A'"));
    flow.add_node(NodeDef::new("right-value", NodeKind::Script).with_script("return 'B'"));
    flow.add_node(NodeDef::new("join", NodeKind::Merge));
    flow.add_node(write_node("w", "merged"));
    flow.connect("a", "out", "left-value", "in");
    flow.connect("b", "out", "right-value", "in");
    flow.connect("left-value", "out", "join", "left");
    flow.connect("right-value", "out", "join", "right");
    flow.connect("join", "out", "w", "in");

    let result = runtime().execute(&flow, Value::Null).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.variables["merged"], json!({"left": "A", "right": "B"}));

    // The first invocation waited; the second completed. Exactly one
    // emission reached the write node.
    let join_statuses: Vec<RunStatus> = result
        .execution_log
        .iter()
        .filter(|r| r.node_id == "join")
        .map(|r| r.status)
        .collect();
    assert_eq!(join_statuses, vec![RunStatus::Waiting, RunStatus::Completed]);
    let write_count = result
        .execution_log
        .iter()
        .filter(|r| r.node_id == "w")
        .count();
    assert_eq!(write_count, 1);
}

#[tokio::test]
async fn merge_with_one_port_fired_stays_waiting() {
    let mut flow = FlowDefinition::new("joining", "Joining");
    flow.add_node(NodeDef::new("a", NodeKind::Start));
    // The right branch exists in the graph but nothing ever fires it.
    flow.add_node(NodeDef::new("orphan", NodeKind::ManualTrigger));
    flow.add_node(NodeDef::new("join", NodeKind::Merge));
    flow.add_node(write_node("w", "merged"));
    flow.connect("a", "out", "join", "left");
    flow.connect("orphan", "out", "join", "right");
    flow.connect("join", "out", "w", "in");

    let result = runtime().execute(&flow, Value::Null).await;

    assert!(result.success);
    assert!(!result.variables.contains_key("merged"));
    let join_run = result
        .execution_log
        .iter()
        .find(|r| r.node_id == "join")
        .expect("join should be logged");
    assert_eq!(join_run.status, RunStatus::Waiting);
    assert!(join_run.finished_at.is_none());
}

#[tokio::test]
async fn merge_can_aggregate_in_connection_order_as_array() {
    let mut flow = FlowDefinition::new("joining", "Joining");
    flow.add_node(NodeDef::new("a", NodeKind::Start));
    flow.add_node(NodeDef::new("b", NodeKind::Start));
    flow.add_node(NodeDef::new("first", NodeKind::Script).with_script("return 1"));
    flow.add_node(NodeDef::new("second", NodeKind::Script).with_script("return 2"));
    flow.add_node(NodeDef::new("join", NodeKind::Merge).with_config("output", "array"));
    flow.add_node(write_node("w", "merged"));
    flow.connect("a", "out", "first", "in");
    flow.connect("b", "out", "second", "in");
    flow.connect("first", "out", "join", "left");
    flow.connect("second", "out", "join", "right");
    flow.connect("join", "out", "w", "in");

    let result = runtime().execute(&flow, Value::Null).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.variables["merged"], json!([1, 2]));
}

#[tokio::test]
async fn throttle_routes_skipped_inside_the_interval() {
    let mut flow = FlowDefinition::new("limited", "Throttled");
    flow.declare_variable("fired", json!(0));
    flow.add_node(NodeDef::new("a", NodeKind::Start));
    flow.add_node(NodeDef::new("b", NodeKind::Start));
    flow.add_node(
        NodeDef::new("gate", NodeKind::RateLimit)
            .with_config("mode", "throttle")
            .with_config("intervalMs", 60_000),
    );
    flow.add_node(
        NodeDef::new("count", NodeKind::Script)
            .with_script("variables.fired = variables.fired + 1 return variables.fired"),
    );
    flow.add_node(write_node("skipped", "was_skipped"));
    flow.connect("a", "out", "gate", "in");
    flow.connect("b", "out", "gate", "in");
    flow.connect("gate", "out", "count", "in");
    flow.connect("gate", "skipped", "skipped", "in");

    let result = runtime().execute(&flow, Value::Null).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.variables["fired"], json!(1));
    assert!(result.variables.contains_key("was_skipped"));
}

#[tokio::test]
async fn debounce_behaves_like_delay() {
    // Pinned on purpose: a future cancel-and-wait debounce is a deliberate
    // behavior change, not a drive-by fix.
    for mode in ["delay", "debounce"] {
        let mut flow = FlowDefinition::new("limited", "Delayed");
        flow.add_node(NodeDef::new("start", NodeKind::Start));
        flow.add_node(
            NodeDef::new("gate", NodeKind::RateLimit)
                .with_config("mode", mode)
                .with_config("intervalMs", 5),
        );
        flow.add_node(write_node("w", "passed"));
        flow.connect("start", "out", "gate", "in");
        flow.connect("gate", "out", "w", "in");

        let result = runtime().execute(&flow, Value::Null).await;

        assert!(result.success, "mode {}: {:?}", mode, result.error);
        assert!(result.variables.contains_key("passed"), "mode {}", mode);
    }
}

#[tokio::test]
async fn comment_nodes_do_nothing_but_are_logged() {
    let mut flow = FlowDefinition::new("notes", "Notes");
    flow.add_node(NodeDef::new("start", NodeKind::Start));
    flow.add_node(NodeDef::new("why", NodeKind::Comment).with_name("explains the flow"));
    flow.add_node(write_node("w", "after_comment"));
    flow.connect("start", "out", "why", "in");
    flow.connect("why", "out", "w", "in");

    let result = runtime().execute(&flow, Value::Null).await;

    assert!(result.success);
    // Comments have no outcome, so nothing flows past them.
    assert!(!result.variables.contains_key("after_comment"));
    assert!(result.execution_log.iter().any(|r| r.node_id == "why"));
}
