//! Host implementations of the System API contract.

mod headless;
mod memory;

pub use headless::{headless, DeniedSpeech};
pub use memory::{MemoryHost, ScriptedChat};
