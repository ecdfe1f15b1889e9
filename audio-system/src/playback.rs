//! Playback sessions on top of the dispatcher.
//!
//! Lookups happen on the caller's thread; every native voice call is dispatched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use asset_manager::SoundAsset;
use audio_backend::{AudioBackend, BackendError, PlaybackParams, PlaybackState, Voice};
use tracing::{debug, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{EngineError, Result};
use crate::handle::SessionHandle;
use crate::registry::{PlaybackRegistry, SessionRecord, SharedVoice};
use crate::validate::{clamp_pan, clamp_volume};

pub struct PlaybackService {
    dispatcher: Arc<Dispatcher>,
    registry: PlaybackRegistry,
    timeout: Option<Duration>,
    closed: AtomicBool,
}

impl PlaybackService {
    pub fn new(dispatcher: Arc<Dispatcher>, timeout: Option<Duration>) -> Self {
        Self {
            dispatcher,
            registry: PlaybackRegistry::new(),
            timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// Refuse new sessions from now on. Existing sessions are left alone.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &PlaybackRegistry {
        &self.registry
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn session_params(&self, handle: SessionHandle) -> Option<PlaybackParams> {
        self.registry.get(handle).map(|r| r.params())
    }

    /// Create a voice for `asset` and start it. The session is registered only once
    /// the backend has accepted the voice.
    ///
    /// A voice that finishes creation after the caller timed out is stopped and
    /// destroyed on the worker. Fails with `NotStarted` once the service is closed.
    pub fn start_playback(
        &self,
        asset: &Arc<SoundAsset>,
        params: PlaybackParams,
    ) -> Result<SessionHandle> {
        if self.is_closed() {
            return Err(EngineError::NotStarted);
        }
        let params = PlaybackParams {
            volume: clamp_volume(params.volume),
            pan: clamp_pan(params.pan),
            looping: params.looping,
        };
        let format = asset.format;
        let pcm = asset.pcm.clone();
        let source = asset.source_path.clone();
        let voice = self.dispatcher.submit_reclaimable(
            move |backend| Ok(backend.create_voice(&format, pcm, &params)?),
            move |mut voice: Box<dyn Voice>, _: &mut dyn AudioBackend| {
                if let Err(e) = voice.stop() {
                    warn!(error = %e, "failed to stop orphaned voice");
                }
                voice.destroy();
                warn!(
                    source = %source.display(),
                    "reclaimed voice created after caller timed out"
                );
            },
            self.timeout,
        )?;

        let handle = SessionHandle::generate();
        self.registry.insert(Arc::new(SessionRecord::new(
            handle,
            SharedVoice::new(voice),
            asset.clone(),
            params,
        )));
        // closed while the voice was being created: stop_all may already have run
        if self.is_closed() {
            if let Err(e) = self.stop_playback(handle) {
                debug!(%handle, error = %e, "late session already reclaimed");
            }
            return Err(EngineError::NotStarted);
        }
        debug!(%handle, source = %asset.source_path.display(), ?params, "playback started");
        Ok(handle)
    }

    /// Stop and forget a session.
    ///
    /// The record stays registered until the native stop succeeds. Of several
    /// concurrent callers exactly one removes it and destroys the voice; the others
    /// get `SessionNotFound`.
    pub fn stop_playback(&self, handle: SessionHandle) -> Result<()> {
        let record = self.lookup(handle)?;
        self.on_voice(&record, |v| v.stop())?;
        record.set_cached_state(PlaybackState::Stopped);

        let removed = self
            .registry
            .remove(handle)
            .ok_or(EngineError::SessionNotFound(handle))?;
        let voice = removed.voice.clone();
        if let Err(e) = self.dispatcher.submit(
            move |_| {
                voice.lock().destroy();
                Ok(())
            },
            self.timeout,
        ) {
            warn!(%handle, error = %e, "failed to destroy voice");
        }
        debug!(%handle, "playback stopped");
        Ok(())
    }

    pub fn pause_playback(&self, handle: SessionHandle) -> Result<()> {
        let record = self.lookup(handle)?;
        self.on_voice(&record, |v| v.pause())?;
        record.set_cached_state(PlaybackState::Paused);
        debug!(%handle, "playback paused");
        Ok(())
    }

    pub fn resume_playback(&self, handle: SessionHandle) -> Result<()> {
        let record = self.lookup(handle)?;
        self.on_voice(&record, |v| v.resume())?;
        record.set_cached_state(PlaybackState::Playing);
        debug!(%handle, "playback resumed");
        Ok(())
    }

    pub fn set_volume(&self, handle: SessionHandle, volume: f64) -> Result<()> {
        let record = self.lookup(handle)?;
        let volume = clamp_volume(volume);
        self.on_voice(&record, move |v| v.set_volume(volume))?;
        record.update_params(|p| p.volume = volume);
        debug!(%handle, volume, "volume set");
        Ok(())
    }

    pub fn set_pan(&self, handle: SessionHandle, pan: f64) -> Result<()> {
        let record = self.lookup(handle)?;
        let pan = clamp_pan(pan);
        self.on_voice(&record, move |v| v.set_pan(pan))?;
        record.update_params(|p| p.pan = pan);
        debug!(%handle, pan, "pan set");
        Ok(())
    }

    /// Whether the session is audibly playing.
    ///
    /// Unknown handles are simply not playing. A non-looping session is reported
    /// finished once the wall time since it started reaches the asset's duration,
    /// even if the native voice still claims to be playing.
    pub fn is_playing(&self, handle: SessionHandle) -> Result<bool> {
        let Some(record) = self.registry.get(handle) else {
            debug!(%handle, "is_playing: unknown handle");
            return Ok(false);
        };

        let voice = record.voice.clone();
        let queried = self
            .dispatcher
            .submit(move |_| Ok(voice.lock().state()), self.timeout)?;
        let state = match queried {
            Ok(state) => {
                record.set_cached_state(state);
                state
            }
            // destroyed only after removal, so the session is gone
            Err(BackendError::VoiceDestroyed) => return Ok(false),
            Err(e) => {
                let cached = record.cached_state();
                warn!(%handle, error = %e, %cached, "voice state query failed, using cached state");
                cached
            }
        };

        if state.is_playing() && !record.params().looping {
            let elapsed = record.elapsed().as_secs_f64();
            if elapsed >= record.asset.duration_seconds {
                debug!(
                    %handle,
                    elapsed,
                    duration = record.asset.duration_seconds,
                    "is_playing: elapsed past duration"
                );
                return Ok(false);
            }
        }
        Ok(state.is_playing())
    }

    /// Stop every session, logging failures. Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for handle in self.registry.handles() {
            match self.stop_playback(handle) {
                Ok(()) => stopped += 1,
                Err(e) => warn!(%handle, error = %e, "failed to stop playback"),
            }
        }
        stopped
    }

    fn lookup(&self, handle: SessionHandle) -> Result<Arc<SessionRecord>> {
        self.registry
            .get(handle)
            .ok_or(EngineError::SessionNotFound(handle))
    }

    fn on_voice<F>(&self, record: &SessionRecord, op: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Voice) -> std::result::Result<(), BackendError> + Send + 'static,
    {
        let handle = record.handle;
        let voice = record.voice.clone();
        self.dispatcher
            .submit(move |_| Ok(op(&mut **voice.lock())?), self.timeout)
            .map_err(|e| match e {
                // lost a race with stop_playback, which destroys after removing
                EngineError::Backend(BackendError::VoiceDestroyed) => {
                    EngineError::SessionNotFound(handle)
                }
                e => e,
            })
    }
}
