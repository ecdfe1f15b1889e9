use std::path::{Path, PathBuf};
use std::sync::Arc;

use audio_backend::AudioFormat;

/// Decoded PCM plus the format describing it.
///
/// The PCM buffer is shared, so any number of playback sessions can reference one
/// asset without copying the samples.
#[derive(Debug, Clone)]
pub struct SoundAsset {
    pub format: AudioFormat,
    pub pcm: Arc<[u8]>,
    pub duration_seconds: f64,
    pub source_path: PathBuf,
}

impl SoundAsset {
    /// Build an asset whose duration is derived from the whole frames in `pcm`.
    pub fn new(
        format: AudioFormat,
        pcm: impl Into<Arc<[u8]>>,
        source_path: impl AsRef<Path>,
    ) -> Self {
        let pcm = pcm.into();
        let duration_seconds = format.duration_of(pcm.len());
        Self {
            format,
            pcm,
            duration_seconds,
            source_path: source_path.as_ref().to_path_buf(),
        }
    }

    pub fn with_duration(
        format: AudioFormat,
        pcm: impl Into<Arc<[u8]>>,
        duration_seconds: f64,
        source_path: impl AsRef<Path>,
    ) -> Self {
        Self {
            format,
            pcm: pcm.into(),
            duration_seconds,
            source_path: source_path.as_ref().to_path_buf(),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.pcm.len()
    }

    pub fn frames(&self) -> usize {
        self.format.frames_in(self.pcm.len())
    }
}
