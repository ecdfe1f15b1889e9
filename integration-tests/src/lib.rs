//! Shared fixtures for the cross-crate tests and the demo binary.

use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use audio_backend::null_backend::{NullBackend, NullBackendProbe};
use audio_system::{AudioEngine, DispatcherConfig, EngineConfig};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once per process. `RUST_LOG` overrides the filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Engine settings with short shutdown waits so failing tests don't hang.
pub fn quick_config() -> EngineConfig {
    EngineConfig {
        dispatcher: DispatcherConfig {
            shutdown_timeout_ms: 1000,
            shutdown_retry_timeout_ms: 250,
            poll_interval_ms: 10,
            ..DispatcherConfig::default()
        },
        ..EngineConfig::default()
    }
}

/// A started engine on a fresh [`NullBackend`], plus the backend's probe.
pub fn started_engine() -> anyhow::Result<(Arc<AudioEngine>, NullBackendProbe)> {
    init_logging();
    let backend = NullBackend::new();
    let probe = backend.probe();
    let engine = Arc::new(AudioEngine::with_config(Box::new(backend), quick_config()));
    engine.start()?;
    Ok((engine, probe))
}

/// Write a 16-bit sine tone.
pub fn write_tone_wav(
    path: &Path,
    channels: u16,
    sample_rate: u32,
    seconds: f32,
    freq: f32,
) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    let frames = (sample_rate as f32 * seconds) as u32;
    for n in 0..frames {
        let t = n as f32 / sample_rate as f32;
        let value = ((2.0 * PI * freq * t).sin() * 0.2 * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(value)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Temporary directory holding generated sound files; removed on drop.
pub struct SoundDir {
    dir: TempDir,
}

impl SoundDir {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Stereo 44.1kHz tone of the given length.
    pub fn tone(&self, name: &str, seconds: f32) -> anyhow::Result<PathBuf> {
        let path = self.dir.path().join(name);
        write_tone_wav(&path, 2, 44_100, seconds, 440.0)?;
        Ok(path)
    }
}
