//! System API: the injected capability surface flows execute against
//!
//! The engine only ever talks to the [`SystemApi`] struct and its capability
//! traits; interchangeable host implementations (desktop, server, test stub)
//! share one contract. Unsupported capabilities fail explicitly; a host
//! never silently swallows a call it cannot serve.

mod api;
mod chat;
mod error;
pub mod hosts;
pub mod utils;

pub use api::{
    AiApi, ChatMessage, DataApi, FileApi, HostCapabilities, LogSink, NotificationSink,
    ShoppingApi, SpeechApi, StoreApi, SystemApi,
};
pub use chat::HttpChatClient;
pub use error::HostError;
