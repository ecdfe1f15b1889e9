use std::time::Duration;

use asset_manager::AssetError;
use audio_backend::BackendError;
use thiserror::Error;

use crate::handle::SessionHandle;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio engine not started")]
    NotStarted,
    #[error("playback session not found: {0}")]
    SessionNotFound(SessionHandle),
    /// Native failure, message and code passed through verbatim.
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("operation did not complete within {0:?}")]
    Timeout(Duration),
    #[error("dispatcher worker did not become ready within {0:?}")]
    StartupTimeout(Duration),
    #[error("dispatcher worker stopped before the operation completed")]
    WorkerStopped,
    #[error("operation panicked: {0}")]
    OperationPanicked(String),
    #[error("cannot submit to the dispatcher from its own worker thread")]
    ReentrantSubmit,
    #[error("failed to spawn dispatcher worker: {0}")]
    Spawn(String),
    #[error("invalid engine configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_display_verbatim() {
        let native = BackendError::Native {
            operation: "stop",
            code: 0x8000_4005,
            message: "device lost".into(),
        };
        let err = EngineError::from(native.clone());
        assert_eq!(err.to_string(), native.to_string());
    }

    #[test]
    fn asset_errors_display_verbatim() {
        let err = EngineError::from(AssetError::InvalidFormat("only PCM".into()));
        assert_eq!(err.to_string(), "invalid audio format: only PCM");
    }
}
