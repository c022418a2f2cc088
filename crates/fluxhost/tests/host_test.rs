// crates/fluxhost/tests/host_test.rs

use fluxcore::{LogLevel, NodeKind, Severity};
use fluxhost::hosts::{headless, MemoryHost};
use fluxhost::{AiApi, FileApi, HostError, ShoppingApi, SpeechApi, StoreApi};
use serde_json::json;

#[tokio::test]
async fn memory_files_round_trip() {
    let host = MemoryHost::new();
    host.write("notes/todo.txt", "water plants").await.expect("write");
    assert_eq!(host.read("notes/todo.txt").await.expect("read"), "water plants");

    host.write("notes/other.txt", "x").await.expect("write");
    let listed = host.list("notes/").await.expect("list");
    assert_eq!(listed, vec!["notes/other.txt", "notes/todo.txt"]);

    let err = host.read("missing.txt").await.expect_err("missing file");
    assert!(matches!(err, HostError::Io(_)));
}

#[tokio::test]
async fn store_variables_are_distinct_per_key() {
    let host = MemoryHost::new();
    host.set("mood", json!("calm")).await.expect("set");
    assert_eq!(host.get("mood").await.expect("get"), json!("calm"));
    assert_eq!(host.get("unset").await.expect("get"), json!(null));
    assert_eq!(host.all().await.expect("all"), json!({"mood": "calm"}));
}

#[tokio::test]
async fn shopping_lists_track_items_and_checkmarks() {
    let host = MemoryHost::new();
    host.create_list("groceries").await.expect("create");
    host.add_item("groceries", "milk").await.expect("add");
    let list = host.check_item("groceries", "milk").await.expect("check");
    assert_eq!(list["items"][0], json!({"name": "milk", "checked": true}));

    let err = host.create_list("groceries").await.expect_err("duplicate");
    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn scripted_chat_pops_replies_then_echoes() {
    let host = MemoryHost::new().with_chat_replies(vec!["pong".to_string()]);
    let api = host.into_api();
    assert_eq!(api.ai.chat("ping").await.expect("chat"), "pong");
    assert_eq!(api.ai.chat("ping").await.expect("chat"), "echo: ping");
}

#[tokio::test]
async fn speech_collects_spoken_text_and_queued_transcripts() {
    let host = MemoryHost::new();
    host.say("good morning").await.expect("say");
    assert_eq!(host.spoken(), vec!["good morning"]);

    host.push_transcript("turn on the lights");
    assert_eq!(host.listen().await.expect("listen"), "turn on the lights");
    let err = host.listen().await.expect_err("queue drained");
    assert!(matches!(err, HostError::NotConfigured(_)));
}

#[tokio::test]
async fn headless_hosts_refuse_client_only_capabilities() {
    let api = headless(&MemoryHost::new().into_api());

    let err = api.speech.say("hi").await.expect_err("say should fail");
    assert!(matches!(err, HostError::Unsupported(_)));
    assert!(!api.speech.is_tts_configured());

    let err = api.notify("ding", Severity::Info).expect_err("notify should fail");
    assert!(matches!(err, HostError::Unsupported(_)));

    let caps = api.capabilities();
    assert!(!caps.supports(NodeKind::Tts));
    assert!(!caps.supports(NodeKind::Notification));
    assert!(caps.supports(NodeKind::Script));
}

#[tokio::test]
async fn sinks_aggregate_logs_and_notifications() {
    let api = MemoryHost::new().into_api();
    api.log(LogLevel::Info, "first");
    api.log(LogLevel::Warn, "second");
    api.notify("look here", Severity::Warning).expect("notify");

    let logs = api.logs();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].message, "first");
    assert_eq!(logs[1].level, LogLevel::Warn);
    assert_eq!(api.notifications()[0].severity, Severity::Warning);

    // Sinks are shared by reference: a clone sees the same buffers.
    let clone = api.clone();
    clone.log(LogLevel::Info, "third");
    assert_eq!(api.logs().len(), 3);
}
