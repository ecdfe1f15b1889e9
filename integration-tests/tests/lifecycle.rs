use audio_backend::null_backend::NullBackend;
use audio_system::{AudioEngine, EngineError, PlaybackParams, SessionHandle};
use integration_tests::{init_logging, quick_config, started_engine, SoundDir};

#[test]
fn shutdown_before_start_is_a_noop() {
    init_logging();
    let engine = AudioEngine::with_config(Box::new(NullBackend::new()), quick_config());
    engine.shutdown();
    engine.shutdown();
    assert!(!engine.is_started());
}

#[test]
fn start_and_shutdown_twice() -> anyhow::Result<()> {
    let (engine, probe) = started_engine()?;
    engine.start()?;
    assert!(engine.is_started());
    assert!(probe.is_initialized());

    engine.shutdown();
    engine.shutdown();
    assert!(!engine.is_started());
    assert!(!probe.is_initialized());
    Ok(())
}

#[test]
fn operations_after_shutdown_are_not_started() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let (engine, _) = started_engine()?;
    let asset = engine.load(sounds.tone("a.wav", 0.5)?)?;
    let handle = engine.play(&asset, PlaybackParams::default())?;
    engine.shutdown();

    assert!(matches!(engine.is_playing(handle), Err(EngineError::NotStarted)));
    assert!(matches!(engine.stop(handle), Err(EngineError::NotStarted)));
    assert!(matches!(
        engine.play(&asset, PlaybackParams::default()),
        Err(EngineError::NotStarted)
    ));
    assert!(matches!(engine.set_master_volume(0.5), Err(EngineError::NotStarted)));
    Ok(())
}

#[test]
fn shutdown_releases_every_voice() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let (engine, probe) = started_engine()?;
    let asset = engine.load(sounds.tone("a.wav", 2.0)?)?;
    for i in 0..4 {
        engine.play(&asset, PlaybackParams::default().with_looping(i % 2 == 0))?;
    }
    assert_eq!(probe.live_voices(), 4);
    engine.shutdown();
    assert_eq!(probe.live_voices(), 0);
    assert_eq!(probe.voices_created(), 4);
    Ok(())
}

#[test]
fn engine_restarts_with_fresh_sessions() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let (engine, _) = started_engine()?;
    let asset = engine.load(sounds.tone("a.wav", 2.0)?)?;
    let before = engine.play(&asset, PlaybackParams::default())?;
    engine.shutdown();

    engine.start()?;
    assert_eq!(engine.active_sessions()?, 0);
    assert!(!engine.is_playing(before)?);
    let after = engine.play(&asset, PlaybackParams::default())?;
    assert!(engine.is_playing(after)?);
    Ok(())
}

#[test]
fn master_volume_reaches_backend_clamped() -> anyhow::Result<()> {
    let (engine, probe) = started_engine()?;
    engine.set_master_volume(0.4)?;
    assert_eq!(probe.master_volume(), Some(0.4));
    engine.set_master_volume(-3.0)?;
    assert_eq!(probe.master_volume(), Some(0.0));
    Ok(())
}

#[test]
fn fabricated_handle_before_start_is_not_started() {
    init_logging();
    let engine = AudioEngine::new(Box::new(NullBackend::new()));
    assert!(matches!(
        engine.is_playing(SessionHandle::generate()),
        Err(EngineError::NotStarted)
    ));
}
