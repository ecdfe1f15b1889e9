//! Handle-based playback over a single-threaded native audio backend.
//!
//! Callers on any thread use [`AudioEngine`]; every native call is serialised
//! onto one worker thread by the [`Dispatcher`].

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod handle;
pub mod lifecycle;
pub mod playback;
pub mod registry;
pub mod validate;

pub use config::{DispatcherConfig, EngineConfig};
pub use dispatcher::{Dispatcher, SharedBackend};
pub use engine::AudioEngine;
pub use error::{EngineError, Result};
pub use handle::SessionHandle;
pub use lifecycle::EngineLifecycle;
pub use playback::PlaybackService;
pub use registry::{PlaybackRegistry, SessionRecord, SharedVoice};
pub use validate::{clamp_pan, clamp_volume};

pub use asset_manager::{AssetError, SoundAsset};
pub use audio_backend::{
    AudioBackend, AudioFormat, BackendError, PlaybackParams, PlaybackState, Voice,
};
