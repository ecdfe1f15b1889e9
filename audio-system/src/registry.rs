use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use asset_manager::SoundAsset;
use audio_backend::{PlaybackParams, PlaybackState, Voice};
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::handle::SessionHandle;

/// A native voice that can sit in the registry.
///
/// Only dispatched operations lock it, and those run one at a time on the worker,
/// so the lock is never contended.
#[derive(Clone)]
pub struct SharedVoice(Arc<Mutex<Box<dyn Voice>>>);

impl SharedVoice {
    pub fn new(voice: Box<dyn Voice>) -> Self {
        Self(Arc::new(Mutex::new(voice)))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Box<dyn Voice>> {
        self.0.lock()
    }
}

/// Everything known about one live playback.
pub struct SessionRecord {
    pub handle: SessionHandle,
    pub voice: SharedVoice,
    pub asset: Arc<SoundAsset>,
    params: ArcSwap<PlaybackParams>,
    started_at: Instant,
    cached_state: Mutex<PlaybackState>,
}

impl SessionRecord {
    pub fn new(
        handle: SessionHandle,
        voice: SharedVoice,
        asset: Arc<SoundAsset>,
        params: PlaybackParams,
    ) -> Self {
        Self {
            handle,
            voice,
            asset,
            params: ArcSwap::from_pointee(params),
            started_at: Instant::now(),
            cached_state: Mutex::new(PlaybackState::Playing),
        }
    }

    pub fn params(&self) -> PlaybackParams {
        **self.params.load()
    }

    pub(crate) fn update_params(&self, f: impl Fn(&mut PlaybackParams)) {
        self.params.rcu(|current| {
            let mut next = **current;
            f(&mut next);
            next
        });
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Last state observed from, or commanded to, the native voice.
    pub fn cached_state(&self) -> PlaybackState {
        *self.cached_state.lock()
    }

    pub(crate) fn set_cached_state(&self, state: PlaybackState) {
        *self.cached_state.lock() = state;
    }
}

/// Handle to record map. Pure bookkeeping: no native calls happen under its lock.
#[derive(Default)]
pub struct PlaybackRegistry {
    sessions: RwLock<HashMap<SessionHandle, Arc<SessionRecord>>>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: Arc<SessionRecord>) {
        self.sessions.write().insert(record.handle, record);
    }

    pub fn get(&self, handle: SessionHandle) -> Option<Arc<SessionRecord>> {
        self.sessions.read().get(&handle).cloned()
    }

    /// `None` means the handle was never registered or another caller removed it first.
    pub fn remove(&self, handle: SessionHandle) -> Option<Arc<SessionRecord>> {
        self.sessions.write().remove(&handle)
    }

    pub fn handles(&self) -> Vec<SessionHandle> {
        self.sessions.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn clear(&self) -> Vec<Arc<SessionRecord>> {
        self.sessions.write().drain().map(|(_, r)| r).collect()
    }
}
