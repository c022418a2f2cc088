use crate::api::{HostCapabilities, SpeechApi, SystemApi};
use crate::error::HostError;
use std::sync::Arc;

/// Speech group for hosts without an audio surface. Every call fails with an
/// explicit capability error rather than silently doing nothing.
pub struct DeniedSpeech;

#[async_trait::async_trait]
impl SpeechApi for DeniedSpeech {
    async fn say(&self, _text: &str) -> Result<(), HostError> {
        Err(HostError::Unsupported("text-to-speech"))
    }

    async fn stop(&self) -> Result<(), HostError> {
        Err(HostError::Unsupported("text-to-speech"))
    }

    async fn listen(&self) -> Result<String, HostError> {
        Err(HostError::Unsupported("speech recognition"))
    }

    fn is_tts_configured(&self) -> bool {
        false
    }

    fn is_stt_configured(&self) -> bool {
        false
    }
}

/// Re-host an api for a server process: same data and file groups, but
/// client-only capabilities (speech, notifications) are refused.
pub fn headless(api: &SystemApi) -> SystemApi {
    let mut headless = api.clone().with_capabilities(HostCapabilities::headless());
    headless.speech = Arc::new(DeniedSpeech);
    headless
}
