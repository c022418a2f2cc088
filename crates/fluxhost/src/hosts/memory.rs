use crate::api::{
    AiApi, ChatMessage, DataApi, FileApi, HostCapabilities, ShoppingApi, SpeechApi, StoreApi,
    SystemApi,
};
use crate::error::HostError;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Fully in-memory, deterministic host.
///
/// Serves every capability group without touching the outside world, which
/// makes it the default host for the CLI and the fixture for engine tests:
/// same flow in, same snapshot out.
#[derive(Clone, Default)]
pub struct MemoryHost {
    files: Arc<Mutex<HashMap<String, String>>>,
    store: Arc<Mutex<Map<String, Value>>>,
    lists: Arc<Mutex<Vec<ShoppingList>>>,
    spoken: Arc<Mutex<Vec<String>>>,
    transcripts: Arc<Mutex<VecDeque<String>>>,
    chat: ScriptedChat,
}

#[derive(Clone, Debug)]
struct ShoppingList {
    name: String,
    items: Vec<(String, bool)>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the capability surface backed by this host. The host handle
    /// stays usable for inspecting side effects afterwards.
    pub fn into_api(self) -> SystemApi {
        SystemApi::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.chat.clone()),
            Arc::new(self.clone()),
            Arc::new(self),
            HostCapabilities::full(),
        )
    }

    /// Queue canned AI replies, popped in order by `ai.chat`.
    pub fn with_chat_replies(self, replies: Vec<String>) -> Self {
        *self.chat.replies.lock().expect("chat replies poisoned") = replies.into();
        self
    }

    /// Queue a transcript returned by the next `speech.listen` call.
    pub fn push_transcript(&self, transcript: impl Into<String>) {
        self.transcripts
            .lock()
            .expect("transcripts poisoned")
            .push_back(transcript.into());
    }

    /// Everything spoken through `speech.say`, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().expect("spoken poisoned").clone()
    }
}

#[async_trait::async_trait]
impl FileApi for MemoryHost {
    async fn read(&self, path: &str) -> Result<String, HostError> {
        self.files
            .lock()
            .expect("files poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| {
                HostError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no such file: {}", path),
                ))
            })
    }

    async fn write(&self, path: &str, contents: &str) -> Result<(), HostError> {
        self.files
            .lock()
            .expect("files poisoned")
            .insert(path.to_string(), contents.to_string());
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<String>, HostError> {
        let files = self.files.lock().expect("files poisoned");
        let mut names: Vec<String> = files
            .keys()
            .filter(|k| k.starts_with(path))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

#[async_trait::async_trait]
impl DataApi for MemoryHost {
    async fn persons(&self) -> Result<Value, HostError> {
        Ok(json!([
            {"id": "p1", "name": "Ada"},
            {"id": "p2", "name": "Linus"},
        ]))
    }

    async fn tasks(&self) -> Result<Value, HostError> {
        Ok(json!([
            {"id": "t1", "title": "water the plants", "done": false},
            {"id": "t2", "title": "take out the trash", "done": true},
        ]))
    }

    async fn projects(&self) -> Result<Value, HostError> {
        Ok(json!([{"id": "pr1", "name": "garden"}]))
    }

    async fn shopping_lists(&self) -> Result<Value, HostError> {
        let lists = self.lists.lock().expect("lists poisoned");
        Ok(Value::Array(lists.iter().map(list_json).collect()))
    }
}

#[async_trait::async_trait]
impl StoreApi for MemoryHost {
    async fn get(&self, key: &str) -> Result<Value, HostError> {
        Ok(self
            .store
            .lock()
            .expect("store poisoned")
            .get(key)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), HostError> {
        self.store
            .lock()
            .expect("store poisoned")
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn all(&self) -> Result<Value, HostError> {
        Ok(Value::Object(self.store.lock().expect("store poisoned").clone()))
    }
}

#[async_trait::async_trait]
impl SpeechApi for MemoryHost {
    async fn say(&self, text: &str) -> Result<(), HostError> {
        self.spoken
            .lock()
            .expect("spoken poisoned")
            .push(text.to_string());
        Ok(())
    }

    async fn stop(&self) -> Result<(), HostError> {
        Ok(())
    }

    async fn listen(&self) -> Result<String, HostError> {
        self.transcripts
            .lock()
            .expect("transcripts poisoned")
            .pop_front()
            .ok_or(HostError::NotConfigured("speech recognition"))
    }

    fn is_tts_configured(&self) -> bool {
        true
    }

    fn is_stt_configured(&self) -> bool {
        !self.transcripts.lock().expect("transcripts poisoned").is_empty()
    }
}

#[async_trait::async_trait]
impl ShoppingApi for MemoryHost {
    async fn create_list(&self, name: &str) -> Result<Value, HostError> {
        let mut lists = self.lists.lock().expect("lists poisoned");
        if lists.iter().any(|l| l.name == name) {
            return Err(HostError::Other(format!("list already exists: {}", name)));
        }
        let list = ShoppingList {
            name: name.to_string(),
            items: Vec::new(),
        };
        let out = list_json(&list);
        lists.push(list);
        Ok(out)
    }

    async fn add_item(&self, list: &str, item: &str) -> Result<Value, HostError> {
        let mut lists = self.lists.lock().expect("lists poisoned");
        let entry = lists
            .iter_mut()
            .find(|l| l.name == list)
            .ok_or_else(|| HostError::Other(format!("no such list: {}", list)))?;
        entry.items.push((item.to_string(), false));
        Ok(list_json(entry))
    }

    async fn check_item(&self, list: &str, item: &str) -> Result<Value, HostError> {
        let mut lists = self.lists.lock().expect("lists poisoned");
        let entry = lists
            .iter_mut()
            .find(|l| l.name == list)
            .ok_or_else(|| HostError::Other(format!("no such list: {}", list)))?;
        let found = entry
            .items
            .iter_mut()
            .find(|(name, _)| name == item)
            .ok_or_else(|| HostError::Other(format!("no such item: {}", item)))?;
        found.1 = true;
        Ok(list_json(entry))
    }
}

fn list_json(list: &ShoppingList) -> Value {
    json!({
        "name": list.name,
        "items": list
            .items
            .iter()
            .map(|(name, checked)| json!({"name": name, "checked": checked}))
            .collect::<Vec<_>>(),
    })
}

/// Deterministic AI stub: pops queued replies, then echoes the prompt.
#[derive(Clone, Default)]
pub struct ScriptedChat {
    replies: Arc<Mutex<VecDeque<String>>>,
}

#[async_trait::async_trait]
impl AiApi for ScriptedChat {
    async fn chat(&self, prompt: &str) -> Result<String, HostError> {
        Ok(self
            .replies
            .lock()
            .expect("chat replies poisoned")
            .pop_front()
            .unwrap_or_else(|| format!("echo: {}", prompt)))
    }

    async fn chat_messages(&self, messages: &[ChatMessage]) -> Result<String, HostError> {
        let prompt = messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        self.chat(prompt).await
    }

    fn is_configured(&self) -> bool {
        true
    }
}
