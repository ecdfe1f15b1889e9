use std::sync::Arc;

use audio_backend::AudioBackend;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::dispatcher::{Dispatcher, SharedBackend};
use crate::error::{EngineError, Result};
use crate::playback::PlaybackService;
use crate::validate::clamp_volume;

#[derive(Default)]
struct Running {
    dispatcher: Option<Arc<Dispatcher>>,
    playback: Option<Arc<PlaybackService>>,
}

/// Owns the backend and brings the dispatcher and session service up and down.
pub struct EngineLifecycle {
    backend: SharedBackend,
    config: EngineConfig,
    // held across the whole of start and shutdown so they never interleave
    running: Mutex<Running>,
}

impl EngineLifecycle {
    pub fn new(backend: Box<dyn AudioBackend>, config: EngineConfig) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            config,
            running: Mutex::new(Running::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start the dispatcher (which initialises the backend), then expose playback.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock();
        if running.playback.is_some() {
            return Ok(());
        }

        let dispatcher = Arc::new(Dispatcher::new(
            self.backend.clone(),
            self.config.dispatcher.clone(),
        ));
        dispatcher.start()?;
        let playback = Arc::new(PlaybackService::new(
            dispatcher.clone(),
            self.config.operation_timeout(),
        ));
        running.dispatcher = Some(dispatcher);
        running.playback = Some(playback);
        info!("audio engine started");
        Ok(())
    }

    /// Stop every session, shut the backend down, stop the worker. Idempotent;
    /// cleanup failures are logged, never returned.
    pub fn shutdown(&self) {
        let mut running = self.running.lock();
        let Some(dispatcher) = running.dispatcher.take() else {
            return;
        };
        let playback = running.playback.take();

        if let Some(playback) = playback {
            // callers still holding the service must not add sessions behind stop_all
            playback.close();
            let stopped = playback.stop_all();
            info!(stopped, "stopped active sessions");
        }
        if let Err(e) = dispatcher.submit(
            |backend| Ok(backend.shutdown()?),
            self.config.operation_timeout(),
        ) {
            warn!(error = %e, "backend shutdown failed");
        }
        dispatcher.stop();
        info!("audio engine shut down");
    }

    pub fn is_started(&self) -> bool {
        self.running.lock().playback.is_some()
    }

    pub fn dispatcher(&self) -> Result<Arc<Dispatcher>> {
        self.running
            .lock()
            .dispatcher
            .clone()
            .ok_or(EngineError::NotStarted)
    }

    pub fn playback(&self) -> Result<Arc<PlaybackService>> {
        self.running
            .lock()
            .playback
            .clone()
            .ok_or(EngineError::NotStarted)
    }

    pub fn set_master_volume(&self, volume: f64) -> Result<()> {
        let volume = clamp_volume(volume);
        self.dispatcher()?.submit(
            move |backend| Ok(backend.set_master_volume(volume)?),
            self.config.operation_timeout(),
        )
    }
}

impl Drop for EngineLifecycle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
