use fluxcore::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("capability not supported on this host: {0}")]
    Unsupported(&'static str),

    #[error("capability not configured: {0}")]
    NotConfigured(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("{0}")]
    Other(String),
}

impl From<HostError> for EngineError {
    fn from(e: HostError) -> Self {
        match e {
            HostError::Unsupported(what) => {
                EngineError::Capability(format!("{} is not supported on this host", what))
            }
            HostError::NotConfigured(what) => {
                EngineError::Capability(format!("{} is not configured on this host", what))
            }
            other => EngineError::Host(other.to_string()),
        }
    }
}
