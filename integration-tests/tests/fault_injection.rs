use std::time::Duration;

use audio_backend::null_backend::NullBackend;
use audio_backend::{BackendError, E_FAIL};
use audio_system::{AudioEngine, EngineConfig, EngineError, PlaybackParams};
use integration_tests::{init_logging, quick_config, started_engine, SoundDir};

fn is_injected(err: &EngineError, op: &str) -> bool {
    matches!(
        err,
        EngineError::Backend(BackendError::Native { operation, code, .. })
            if *operation == op && *code == E_FAIL
    )
}

#[test]
fn failed_voice_creation_registers_nothing() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let (engine, probe) = started_engine()?;
    let asset = engine.load(sounds.tone("a.wav", 1.0)?)?;

    probe.fail_next_voice_creation();
    let err = engine.play(&asset, PlaybackParams::default()).unwrap_err();
    assert!(is_injected(&err, "create_voice"), "{err}");
    assert_eq!(engine.active_sessions()?, 0);

    // the fault was one-shot
    engine.play(&asset, PlaybackParams::default())?;
    assert_eq!(engine.active_sessions()?, 1);
    Ok(())
}

#[test]
fn failed_stop_keeps_the_session_for_retry() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let (engine, probe) = started_engine()?;
    let asset = engine.load(sounds.tone("a.wav", 5.0)?)?;
    let handle = engine.play(&asset, PlaybackParams::default())?;

    probe.fail_op("stop");
    let err = engine.stop(handle).unwrap_err();
    assert!(is_injected(&err, "stop"), "{err}");
    assert_eq!(engine.active_sessions()?, 1);
    assert!(engine.is_playing(handle)?);

    probe.clear_faults();
    engine.stop(handle)?;
    assert_eq!(engine.active_sessions()?, 0);
    assert_eq!(probe.live_voices(), 0);
    Ok(())
}

#[test]
fn native_error_text_is_passed_through() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let (engine, probe) = started_engine()?;
    let asset = engine.load(sounds.tone("a.wav", 5.0)?)?;
    let handle = engine.play(&asset, PlaybackParams::default())?;

    probe.fail_op("pause");
    let err = engine.pause(handle).unwrap_err();
    assert_eq!(err.to_string(), "pause failed (0x80004005): injected failure");
    Ok(())
}

#[test]
fn failed_setter_leaves_params_unchanged() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let (engine, probe) = started_engine()?;
    let asset = engine.load(sounds.tone("a.wav", 5.0)?)?;
    let handle = engine.play(&asset, PlaybackParams::default().with_volume(0.7))?;
    let playback = engine.lifecycle().playback()?;

    probe.fail_op("set_volume");
    assert!(engine.set_volume(handle, 0.1).is_err());
    assert_eq!(playback.session_params(handle).map(|p| p.volume), Some(0.7));
    Ok(())
}

#[test]
fn state_query_failure_uses_cached_state() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let (engine, probe) = started_engine()?;
    let asset = engine.load(sounds.tone("a.wav", 5.0)?)?;
    let handle = engine.play(&asset, PlaybackParams::default())?;

    probe.fail_op("state");
    assert!(engine.is_playing(handle)?);
    probe.clear_faults();

    engine.pause(handle)?;
    probe.fail_op("state");
    assert!(!engine.is_playing(handle)?);
    Ok(())
}

#[test]
fn stop_all_skips_failures_and_continues() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let (engine, probe) = started_engine()?;
    let asset = engine.load(sounds.tone("a.wav", 5.0)?)?;
    for _ in 0..3 {
        engine.play(&asset, PlaybackParams::default())?;
    }
    let playback = engine.lifecycle().playback()?;

    probe.fail_op("stop");
    assert_eq!(playback.stop_all(), 0);
    assert_eq!(engine.active_sessions()?, 3);

    probe.clear_faults();
    assert_eq!(playback.stop_all(), 3);
    Ok(())
}

#[test]
fn shutdown_survives_backend_failures() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let (engine, probe) = started_engine()?;
    let asset = engine.load(sounds.tone("a.wav", 5.0)?)?;
    engine.play(&asset, PlaybackParams::default())?;

    probe.fail_op("stop");
    probe.fail_op("shutdown");
    engine.shutdown();
    assert!(!engine.is_started());
    Ok(())
}

#[test]
fn failed_initialize_is_reported_by_start() {
    init_logging();
    let backend = NullBackend::new();
    let probe = backend.probe();
    probe.fail_op("initialize");
    let engine = AudioEngine::with_config(Box::new(backend), quick_config());

    let err = engine.start().unwrap_err();
    assert!(is_injected(&err, "initialize"), "{err}");
    assert!(!engine.is_started());

    probe.clear_faults();
    assert!(engine.start().is_ok());
}

#[test]
fn slow_operation_times_out_without_breaking_the_engine() -> anyhow::Result<()> {
    init_logging();
    let sounds = SoundDir::new()?;
    let backend = NullBackend::new();
    let probe = backend.probe();
    let config = EngineConfig {
        operation_timeout_ms: Some(50),
        ..quick_config()
    };
    let engine = AudioEngine::with_config(Box::new(backend), config);
    engine.start()?;
    let asset = engine.load(sounds.tone("a.wav", 5.0)?)?;
    let handle = engine.play(&asset, PlaybackParams::default())?;

    probe.set_call_latency(Some(Duration::from_millis(200)));
    assert!(matches!(engine.pause(handle), Err(EngineError::Timeout(_))));

    probe.set_call_latency(None);
    // the timed-out pause still ran in the background
    std::thread::sleep(Duration::from_millis(300));
    assert!(!engine.is_playing(handle)?);
    engine.resume(handle)?;
    assert!(engine.is_playing(handle)?);
    Ok(())
}
