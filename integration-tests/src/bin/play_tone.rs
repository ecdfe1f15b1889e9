//! Headless demo: generate a tone, play it on the null backend, and log progress.
//!
//! `cargo run -p integration-tests --bin play_tone -- [seconds] [--loop]`

use std::thread::sleep;
use std::time::{Duration, Instant};

use audio_backend::null_backend::NullBackend;
use audio_system::{AudioEngine, PlaybackParams};
use integration_tests::{init_logging, SoundDir};
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_logging();

    let mut seconds = 1.0f32;
    let mut looping = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--loop" => looping = true,
            s => seconds = s.parse()?,
        }
    }

    let sounds = SoundDir::new()?;
    let path = sounds.tone("tone.wav", seconds)?;

    let engine = AudioEngine::new(Box::new(NullBackend::new()));
    engine.start()?;
    let asset = engine.load(&path)?;
    info!(format = %asset.format, seconds = asset.duration_seconds, "loaded");

    let params = PlaybackParams::default()
        .with_volume(0.8)
        .with_looping(looping);
    let handle = engine.play(&asset, params)?;
    let started = Instant::now();
    // looping playback never finishes by itself; give it twice the tone length
    let limit = Duration::from_secs_f32(seconds.max(0.0) * 2.0 + 0.5);
    while engine.is_playing(handle)? && started.elapsed() < limit {
        sleep(Duration::from_millis(100));
        info!(%handle, elapsed = ?started.elapsed(), "playing");
    }

    if engine.is_playing(handle)? {
        engine.stop(handle)?;
        info!(%handle, "stopped");
    } else {
        info!(%handle, "finished");
    }
    engine.shutdown();
    Ok(())
}
