use crate::error::HostError;
use chrono::Utc;
use fluxcore::{LogEntry, LogLevel, NodeKind, Notification, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// File capability group.
#[async_trait::async_trait]
pub trait FileApi: Send + Sync {
    async fn read(&self, path: &str) -> Result<String, HostError>;
    async fn write(&self, path: &str, contents: &str) -> Result<(), HostError>;
    async fn list(&self, path: &str) -> Result<Vec<String>, HostError>;
}

/// Read access to the host's domain records.
#[async_trait::async_trait]
pub trait DataApi: Send + Sync {
    async fn persons(&self) -> Result<Value, HostError>;
    async fn tasks(&self) -> Result<Value, HostError>;
    async fn projects(&self) -> Result<Value, HostError>;
    async fn shopping_lists(&self) -> Result<Value, HostError>;
}

/// Data-layer key/value variables, persisted by the host. Distinct from the
/// engine's per-execution variable map.
#[async_trait::async_trait]
pub trait StoreApi: Send + Sync {
    async fn get(&self, key: &str) -> Result<Value, HostError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), HostError>;
    async fn all(&self) -> Result<Value, HostError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// AI capability group.
#[async_trait::async_trait]
pub trait AiApi: Send + Sync {
    async fn chat(&self, prompt: &str) -> Result<String, HostError>;
    async fn chat_messages(&self, messages: &[ChatMessage]) -> Result<String, HostError>;
    fn is_configured(&self) -> bool;
}

/// Text-to-speech and speech-to-text capability group.
#[async_trait::async_trait]
pub trait SpeechApi: Send + Sync {
    async fn say(&self, text: &str) -> Result<(), HostError>;
    async fn stop(&self) -> Result<(), HostError>;
    async fn listen(&self) -> Result<String, HostError>;
    fn is_tts_configured(&self) -> bool;
    fn is_stt_configured(&self) -> bool;
}

/// Shopping list mutation group.
#[async_trait::async_trait]
pub trait ShoppingApi: Send + Sync {
    async fn create_list(&self, name: &str) -> Result<Value, HostError>;
    async fn add_item(&self, list: &str, item: &str) -> Result<Value, HostError>;
    async fn check_item(&self, list: &str, item: &str) -> Result<Value, HostError>;
}

/// What a host can actually serve. Used by the engine to screen sub-flows
/// before spawning a child execution.
#[derive(Debug, Clone, Copy)]
pub struct HostCapabilities {
    pub notifications: bool,
    pub speech: bool,
}

impl HostCapabilities {
    pub fn full() -> Self {
        Self {
            notifications: true,
            speech: true,
        }
    }

    pub fn headless() -> Self {
        Self {
            notifications: false,
            speech: false,
        }
    }

    pub fn supports(&self, kind: NodeKind) -> bool {
        match kind {
            NodeKind::Notification => self.notifications,
            NodeKind::Tts | NodeKind::Stt => self.speech,
            _ => true,
        }
    }
}

/// Shared, append-only log buffer. Cloned by reference into child engines so
/// one top-level result aggregates all nested activity.
#[derive(Clone, Default)]
pub struct LogSink(Arc<Mutex<Vec<LogEntry>>>);

impl LogSink {
    pub fn push(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!(target: "flux::flow", "{}", message),
            LogLevel::Info => tracing::info!(target: "flux::flow", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "flux::flow", "{}", message),
            LogLevel::Error => tracing::error!(target: "flux::flow", "{}", message),
        }
        self.0.lock().expect("log sink poisoned").push(LogEntry {
            level,
            message,
            timestamp: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.0.lock().expect("log sink poisoned").clone()
    }
}

/// Shared notification buffer, same sharing rules as [`LogSink`].
#[derive(Clone, Default)]
pub struct NotificationSink(Arc<Mutex<Vec<Notification>>>);

impl NotificationSink {
    pub fn push(&self, message: impl Into<String>, severity: Severity) {
        self.0
            .lock()
            .expect("notification sink poisoned")
            .push(Notification {
                message: message.into(),
                severity,
                timestamp: Utc::now(),
            });
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.0.lock().expect("notification sink poisoned").clone()
    }
}

/// The injected capability surface a flow executes against.
///
/// Capability groups are trait objects so hosts can mix and match
/// implementations; the log and notification sinks live here so parent and
/// child (sub-flow) executions share them by reference.
#[derive(Clone)]
pub struct SystemApi {
    pub file: Arc<dyn FileApi>,
    pub data: Arc<dyn DataApi>,
    pub store: Arc<dyn StoreApi>,
    pub ai: Arc<dyn AiApi>,
    pub speech: Arc<dyn SpeechApi>,
    pub shopping: Arc<dyn ShoppingApi>,
    capabilities: HostCapabilities,
    logs: LogSink,
    notifications: NotificationSink,
}

impl SystemApi {
    pub fn new(
        file: Arc<dyn FileApi>,
        data: Arc<dyn DataApi>,
        store: Arc<dyn StoreApi>,
        ai: Arc<dyn AiApi>,
        speech: Arc<dyn SpeechApi>,
        shopping: Arc<dyn ShoppingApi>,
        capabilities: HostCapabilities,
    ) -> Self {
        Self {
            file,
            data,
            store,
            ai,
            speech,
            shopping,
            capabilities,
            logs: LogSink::default(),
            notifications: NotificationSink::default(),
        }
    }

    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    /// Same capability groups, fresh log/notification buffers. Runtimes hand
    /// each execution its own pair; sub-flows of that execution then share
    /// them by reference.
    pub fn with_fresh_sinks(&self) -> SystemApi {
        let mut api = self.clone();
        api.logs = LogSink::default();
        api.notifications = NotificationSink::default();
        api
    }

    /// Replace the capability flags, e.g. when re-hosting an api headless.
    pub fn with_capabilities(mut self, capabilities: HostCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.logs.push(level, message);
    }

    pub fn notify(
        &self,
        message: impl Into<String>,
        severity: Severity,
    ) -> Result<(), HostError> {
        if !self.capabilities.notifications {
            return Err(HostError::Unsupported("notifications"));
        }
        self.notifications.push(message, severity);
        Ok(())
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.snapshot()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.snapshot()
    }

    /// Handle for sinks that outlive a borrow of the api (script bindings).
    pub fn log_sink(&self) -> LogSink {
        self.logs.clone()
    }

    pub fn notification_sink(&self) -> NotificationSink {
        self.notifications.clone()
    }
}
