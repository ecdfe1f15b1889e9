use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    AudioBackend, AudioFormat, BackendError, E_FAIL, PlaybackParams, PlaybackState, Voice,
};

/// A headless backend that simulates voice timing without producing sound.
///
/// Voices advance on the wall clock: a non-looping voice reports `Stopped` once its
/// buffer would have finished playing. Time spent paused does not count.
pub struct NullBackend {
    probe: NullBackendProbe,
    initialized: bool,
    voices: HashMap<u64, Arc<Mutex<VoiceClock>>>,
    next_voice_id: u64,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            probe: NullBackendProbe::default(),
            initialized: false,
            voices: HashMap::new(),
            next_voice_id: 0,
        }
    }

    /// Observation and fault-injection handle sharing state with this backend.
    pub fn probe(&self) -> NullBackendProbe {
        self.probe.clone()
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn initialize(&mut self) -> Result<(), BackendError> {
        let _call = self.probe.call("initialize")?;
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;
        self.probe.inner.initialized.store(true, Ordering::SeqCst);
        info!("null backend initialized");
        Ok(())
    }

    fn create_voice(
        &mut self,
        format: &AudioFormat,
        pcm: Arc<[u8]>,
        params: &PlaybackParams,
    ) -> Result<Box<dyn Voice>, BackendError> {
        let _call = self.probe.call("create_voice")?;
        if !self.initialized {
            return Err(BackendError::NotInitialized);
        }
        if self.probe.inner.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(injected("create_voice"));
        }
        if format.channels == 0 || format.sample_rate == 0 || format.frame_size() == 0 {
            return Err(BackendError::UnsupportedFormat(format.to_string()));
        }
        if pcm.len() % format.frame_size() != 0 {
            return Err(BackendError::UnsupportedFormat(format!(
                "{} bytes is not a whole number of {}-byte frames",
                pcm.len(),
                format.frame_size()
            )));
        }

        // destroyed voices need no shutdown bookkeeping
        self.voices.retain(|_, clock| !clock.lock().destroyed);

        let id = self.next_voice_id;
        self.next_voice_id += 1;

        let length = Duration::from_secs_f64(format.duration_of(pcm.len()));
        let mut clock = VoiceClock::new(length, params);
        clock.start();
        let clock = Arc::new(Mutex::new(clock));
        self.voices.insert(id, clock.clone());

        self.probe.inner.voices_created.fetch_add(1, Ordering::SeqCst);
        self.probe.inner.live_voices.fetch_add(1, Ordering::SeqCst);
        debug!(voice = id, %format, bytes = pcm.len(), "null voice created");

        Ok(Box::new(NullVoice {
            id,
            clock,
            probe: self.probe.clone(),
        }))
    }

    fn set_master_volume(&mut self, volume: f64) -> Result<(), BackendError> {
        let _call = self.probe.call("set_master_volume")?;
        if !self.initialized {
            return Err(BackendError::NotInitialized);
        }
        *self.probe.inner.master_volume.lock() = Some(volume);
        debug!(volume, "null backend master volume");
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), BackendError> {
        let _call = self.probe.call("shutdown")?;
        for (_, clock) in self.voices.drain() {
            let mut clock = clock.lock();
            if !clock.destroyed {
                clock.destroyed = true;
                self.probe.inner.live_voices.fetch_sub(1, Ordering::SeqCst);
            }
        }
        self.initialized = false;
        self.probe.inner.initialized.store(false, Ordering::SeqCst);
        info!("null backend shut down");
        Ok(())
    }
}

pub struct NullVoice {
    id: u64,
    clock: Arc<Mutex<VoiceClock>>,
    probe: NullBackendProbe,
}

impl NullVoice {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn with_clock<R>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut VoiceClock) -> R,
    ) -> Result<R, BackendError> {
        let _call = self.probe.call(op)?;
        let mut clock = self.clock.lock();
        if clock.destroyed {
            return Err(BackendError::VoiceDestroyed);
        }
        let out = f(&mut *clock);
        debug!(
            voice = self.id,
            op,
            state = %clock.state,
            volume = clock.volume,
            pan = clock.pan,
            "null voice"
        );
        Ok(out)
    }
}

impl Voice for NullVoice {
    fn start(&mut self) -> Result<(), BackendError> {
        self.with_clock("start", VoiceClock::start)
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.with_clock("stop", VoiceClock::stop)
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        self.with_clock("pause", VoiceClock::pause)
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        self.with_clock("resume", VoiceClock::resume)
    }

    fn set_volume(&mut self, volume: f64) -> Result<(), BackendError> {
        self.with_clock("set_volume", |c| c.volume = volume)
    }

    fn set_pan(&mut self, pan: f64) -> Result<(), BackendError> {
        self.with_clock("set_pan", |c| c.pan = pan)
    }

    fn state(&mut self) -> Result<PlaybackState, BackendError> {
        self.with_clock("state", |c| {
            c.refresh();
            c.state
        })
    }

    fn destroy(&mut self) {
        let _call = self.probe.track();
        let mut clock = self.clock.lock();
        if !clock.destroyed {
            clock.destroyed = true;
            self.probe.inner.live_voices.fetch_sub(1, Ordering::SeqCst);
            debug!(voice = self.id, "null voice destroyed");
        }
    }
}

/// Simulated play position of one voice.
struct VoiceClock {
    state: PlaybackState,
    resumed_at: Option<Instant>,
    played: Duration,
    length: Duration,
    looping: bool,
    volume: f64,
    pan: f64,
    destroyed: bool,
}

impl VoiceClock {
    fn new(length: Duration, params: &PlaybackParams) -> Self {
        Self {
            state: PlaybackState::Stopped,
            resumed_at: None,
            played: Duration::ZERO,
            length,
            looping: params.looping,
            volume: params.volume,
            pan: params.pan,
            destroyed: false,
        }
    }

    fn elapsed(&self) -> Duration {
        self.played + self.resumed_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    fn start(&mut self) {
        match self.state {
            PlaybackState::Playing => return,
            PlaybackState::Paused => {}
            PlaybackState::Stopped => self.played = Duration::ZERO,
        }
        self.resumed_at = Some(Instant::now());
        self.state = PlaybackState::Playing;
    }

    fn stop(&mut self) {
        self.bank();
        self.state = PlaybackState::Stopped;
    }

    fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.bank();
            self.state = PlaybackState::Paused;
        }
    }

    fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            self.resumed_at = Some(Instant::now());
            self.state = PlaybackState::Playing;
        }
    }

    fn refresh(&mut self) {
        if self.state == PlaybackState::Playing && !self.looping && self.elapsed() >= self.length {
            self.stop();
        }
    }

    fn bank(&mut self) {
        if let Some(t) = self.resumed_at.take() {
            self.played += t.elapsed();
        }
    }
}

/// Shared view into a [`NullBackend`] for tests and diagnostics.
#[derive(Clone, Default)]
pub struct NullBackendProbe {
    inner: Arc<ProbeInner>,
}

#[derive(Default)]
struct ProbeInner {
    initialized: AtomicBool,
    master_volume: Mutex<Option<f64>>,
    voices_created: AtomicUsize,
    live_voices: AtomicUsize,
    threads: Mutex<HashSet<ThreadId>>,
    active_calls: AtomicUsize,
    overlapping_calls: AtomicUsize,
    fail_next_create: AtomicBool,
    failing_ops: Mutex<HashSet<&'static str>>,
    call_latency: Mutex<Option<Duration>>,
}

impl NullBackendProbe {
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Last master volume applied, if any.
    pub fn master_volume(&self) -> Option<f64> {
        *self.inner.master_volume.lock()
    }

    pub fn voices_created(&self) -> usize {
        self.inner.voices_created.load(Ordering::SeqCst)
    }

    /// Voices created and not yet destroyed.
    pub fn live_voices(&self) -> usize {
        self.inner.live_voices.load(Ordering::SeqCst)
    }

    /// Every thread that has made a native call so far.
    pub fn calling_threads(&self) -> Vec<ThreadId> {
        self.inner.threads.lock().iter().copied().collect()
    }

    /// Native calls that started while another one was still running.
    pub fn overlapping_calls(&self) -> usize {
        self.inner.overlapping_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_voice_creation(&self) {
        self.inner.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Make every call of the named backend or voice operation fail until cleared.
    pub fn fail_op(&self, op: &'static str) {
        self.inner.failing_ops.lock().insert(op);
    }

    pub fn clear_faults(&self) {
        self.inner.fail_next_create.store(false, Ordering::SeqCst);
        self.inner.failing_ops.lock().clear();
    }

    /// Sleep inside every native call; widens the window for overlap detection.
    pub fn set_call_latency(&self, latency: Option<Duration>) {
        *self.inner.call_latency.lock() = latency;
    }

    fn track(&self) -> CallGuard {
        self.inner.threads.lock().insert(thread::current().id());
        if self.inner.active_calls.fetch_add(1, Ordering::SeqCst) > 0 {
            self.inner.overlapping_calls.fetch_add(1, Ordering::SeqCst);
        }
        let latency = *self.inner.call_latency.lock();
        if let Some(latency) = latency {
            thread::sleep(latency);
        }
        CallGuard {
            inner: self.inner.clone(),
        }
    }

    fn call(&self, op: &'static str) -> Result<CallGuard, BackendError> {
        let guard = self.track();
        if self.inner.failing_ops.lock().contains(op) {
            return Err(injected(op));
        }
        Ok(guard)
    }
}

struct CallGuard {
    inner: Arc<ProbeInner>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.inner.active_calls.fetch_sub(1, Ordering::SeqCst);
    }
}

fn injected(operation: &'static str) -> BackendError {
    BackendError::Native {
        operation,
        code: E_FAIL,
        message: "injected failure".into(),
    }
}
