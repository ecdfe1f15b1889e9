// Backend capability consumed by the audio system: the native engine and the
// per-playback voices it hands out. Nothing in here is thread-safe beyond `Send`;
// callers are expected to funnel every call through a single thread.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub mod null_backend;

/// Generic failure code used when a backend has no better native code to report.
pub const E_FAIL: u32 = 0x8000_4005;

/// A specialized error type for audio backend failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("no audio output device available")]
    DeviceNotFound,
    #[error("backend not initialized")]
    NotInitialized,
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("voice has been destroyed")]
    VoiceDestroyed,
    /// A native call failed; code and message are passed through untouched.
    #[error("{operation} failed (0x{code:08X}): {message}")]
    Native {
        operation: &'static str,
        code: u32,
        message: String,
    },
}

/// PCM layout of a sound buffer. Immutable once a decoder produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub block_align: u16,
    pub avg_bytes_per_sec: u32,
}

impl AudioFormat {
    /// Integer PCM format with the derived fields filled in. Derived fields saturate
    /// rather than overflow on absurd inputs.
    pub fn pcm(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        let block_align = channels.saturating_mul(bits_per_sample / 8);
        Self {
            sample_rate,
            channels,
            bits_per_sample,
            block_align,
            avg_bytes_per_sec: sample_rate.saturating_mul(u32::from(block_align)),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.block_align as usize
    }

    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample / 8) as usize
    }

    /// Whole frames contained in `bytes` of PCM data.
    pub fn frames_in(&self, bytes: usize) -> usize {
        match self.frame_size() {
            0 => 0,
            frame => bytes / frame,
        }
    }

    /// Playback length in seconds of `bytes` of PCM data.
    pub fn duration_of(&self, bytes: usize) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames_in(bytes) as f64 / self.sample_rate as f64
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ch {}Hz {}bit",
            self.channels, self.sample_rate, self.bits_per_sample
        )
    }
}

/// Per-voice playback parameters. `volume` is in [0, 1], `pan` in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParams {
    pub volume: f64,
    pub pan: f64,
    pub looping: bool,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pan: 0.0,
            looping: false,
        }
    }
}

impl PlaybackParams {
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_pan(mut self, pan: f64) -> Self {
        self.pan = pan;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn is_playing(self) -> bool {
        self == PlaybackState::Playing
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// A native per-playback object.
///
/// Implementations may wrap handles that must only be touched from the thread
/// that created them; the trait only promises the object can be moved there.
pub trait Voice: Send {
    fn start(&mut self) -> Result<(), BackendError>;
    /// Stop playback and flush queued buffers.
    fn stop(&mut self) -> Result<(), BackendError>;
    fn pause(&mut self) -> Result<(), BackendError>;
    fn resume(&mut self) -> Result<(), BackendError>;
    fn set_volume(&mut self, volume: f64) -> Result<(), BackendError>;
    fn set_pan(&mut self, pan: f64) -> Result<(), BackendError>;
    /// Current native state. This is the authoritative source for playback state.
    fn state(&mut self) -> Result<PlaybackState, BackendError>;
    /// Release native resources. Further calls fail with `VoiceDestroyed`.
    fn destroy(&mut self);
}

/// The core trait defining the audio backend's contract.
///
/// The backend is not reentrant: every method, and every method of the voices it
/// creates, must be called from one thread at a time.
pub trait AudioBackend: Send {
    fn name(&self) -> &str;
    fn initialize(&mut self) -> Result<(), BackendError>;
    /// Create a voice for `pcm` and start it. Creation implies playback.
    fn create_voice(
        &mut self,
        format: &AudioFormat,
        pcm: Arc<[u8]>,
        params: &PlaybackParams,
    ) -> Result<Box<dyn Voice>, BackendError>;
    fn set_master_volume(&mut self, volume: f64) -> Result<(), BackendError>;
    /// Destroy all voices and release the device.
    fn shutdown(&mut self) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_format_derives_alignment() {
        let fmt = AudioFormat::pcm(44_100, 2, 16);
        assert_eq!(fmt.block_align, 4);
        assert_eq!(fmt.avg_bytes_per_sec, 176_400);
        assert_eq!(fmt.frame_size(), 4);
        assert_eq!(fmt.bytes_per_sample(), 2);
    }

    #[test]
    fn duration_counts_whole_frames_only() {
        let fmt = AudioFormat::pcm(48_000, 1, 16);
        assert_eq!(fmt.frames_in(96_001), 48_000);
        assert!((fmt.duration_of(96_000) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn oversized_format_saturates() {
        let fmt = AudioFormat::pcm(u32::MAX, u16::MAX, 32);
        assert_eq!(fmt.block_align, u16::MAX);
        assert_eq!(fmt.avg_bytes_per_sec, u32::MAX);
    }

    #[test]
    fn zeroed_format_has_no_duration() {
        let fmt = AudioFormat::pcm(0, 0, 16);
        assert_eq!(fmt.frames_in(1024), 0);
        assert_eq!(fmt.duration_of(1024), 0.0);
    }

    #[test]
    fn native_error_shows_code_in_hex() {
        let err = BackendError::Native {
            operation: "create_voice",
            code: 0x8889_0004,
            message: "device invalidated".into(),
        };
        assert_eq!(
            err.to_string(),
            "create_voice failed (0x88890004): device invalidated"
        );
    }

    #[test]
    fn params_builder() {
        let p = PlaybackParams::default().with_volume(0.5).with_pan(-0.25).with_looping(true);
        assert_eq!(p, PlaybackParams { volume: 0.5, pan: -0.25, looping: true });
    }
}
