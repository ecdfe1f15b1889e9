use std::path::Path;
use std::sync::Arc;

use asset_manager::{DecoderRegistry, SoundAsset, SoundLoader};
use audio_backend::{AudioBackend, PlaybackParams};
use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::handle::SessionHandle;
use crate::lifecycle::EngineLifecycle;

/// Thread-safe entry point. Every method takes `&self`; share it behind an `Arc`.
pub struct AudioEngine {
    lifecycle: EngineLifecycle,
    loader: Mutex<SoundLoader>,
}

impl AudioEngine {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    pub fn with_config(backend: Box<dyn AudioBackend>, config: EngineConfig) -> Self {
        let loader = SoundLoader::new(DecoderRegistry::with_defaults(), config.asset_cache_bytes);
        Self {
            lifecycle: EngineLifecycle::new(backend, config),
            loader: Mutex::new(loader),
        }
    }

    pub fn start(&self) -> Result<()> {
        self.lifecycle.start()
    }

    pub fn shutdown(&self) {
        self.lifecycle.shutdown()
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    pub fn lifecycle(&self) -> &EngineLifecycle {
        &self.lifecycle
    }

    /// Decode (or fetch from cache) the sound at `path`. Needs no running engine.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Arc<SoundAsset>> {
        Ok(self.loader.lock().load(path)?)
    }

    pub fn play(&self, asset: &Arc<SoundAsset>, params: PlaybackParams) -> Result<SessionHandle> {
        self.lifecycle.playback()?.start_playback(asset, params)
    }

    pub fn stop(&self, handle: SessionHandle) -> Result<()> {
        self.lifecycle.playback()?.stop_playback(handle)
    }

    pub fn pause(&self, handle: SessionHandle) -> Result<()> {
        self.lifecycle.playback()?.pause_playback(handle)
    }

    pub fn resume(&self, handle: SessionHandle) -> Result<()> {
        self.lifecycle.playback()?.resume_playback(handle)
    }

    pub fn set_volume(&self, handle: SessionHandle, volume: f64) -> Result<()> {
        self.lifecycle.playback()?.set_volume(handle, volume)
    }

    pub fn set_pan(&self, handle: SessionHandle, pan: f64) -> Result<()> {
        self.lifecycle.playback()?.set_pan(handle, pan)
    }

    pub fn set_master_volume(&self, volume: f64) -> Result<()> {
        self.lifecycle.set_master_volume(volume)
    }

    pub fn is_playing(&self, handle: SessionHandle) -> Result<bool> {
        self.lifecycle.playback()?.is_playing(handle)
    }

    pub fn active_sessions(&self) -> Result<usize> {
        Ok(self.lifecycle.playback()?.session_count())
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.lifecycle.shutdown();
    }
}
