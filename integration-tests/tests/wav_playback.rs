use std::sync::Arc;

use asset_manager::AssetError;
use audio_system::{EngineError, PlaybackParams};
use integration_tests::{started_engine, write_tone_wav, SoundDir};

#[test]
fn wav_round_trip_through_engine() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let path = sounds.path().join("mono.wav");
    write_tone_wav(&path, 1, 48_000, 0.5, 880.0)?;

    let (engine, probe) = started_engine()?;
    let asset = engine.load(&path)?;
    assert_eq!(asset.format.channels, 1);
    assert_eq!(asset.format.sample_rate, 48_000);
    assert_eq!(asset.format.block_align, 2);
    assert!((asset.duration_seconds - 0.5).abs() < 1e-3);

    let handle = engine.play(&asset, PlaybackParams::default())?;
    assert!(engine.is_playing(handle)?);
    assert_eq!(probe.voices_created(), 1);
    Ok(())
}

#[test]
fn repeated_loads_share_the_decoded_asset() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let path = sounds.tone("a.wav", 0.2)?;
    let (engine, _) = started_engine()?;
    let first = engine.load(&path)?;
    let second = engine.load(&path)?;
    assert!(Arc::ptr_eq(&first, &second));
    Ok(())
}

#[test]
fn unsupported_wav_layout_is_invalid_format() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let path = sounds.path().join("low-rate.wav");
    write_tone_wav(&path, 2, 22_050, 0.1, 440.0)?;

    let (engine, _) = started_engine()?;
    match engine.load(&path) {
        Err(EngineError::Asset(AssetError::InvalidFormat(msg))) => {
            assert!(msg.contains("22050"), "{msg}");
        }
        other => panic!("expected InvalidFormat, got {other:?}"),
    }
    Ok(())
}

#[test]
fn unknown_container_lists_supported_extensions() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let path = sounds.path().join("song.ogg");
    std::fs::write(&path, b"OggS\0\x02\0\0\0\0\0\0\0\0\0\0")?;

    let (engine, _) = started_engine()?;
    match engine.load(&path) {
        Err(EngineError::Asset(AssetError::Unsupported { supported, .. })) => {
            assert!(supported.iter().any(|e| e == "wav"));
            let mut sorted = supported.clone();
            sorted.sort();
            assert_eq!(supported, sorted);
        }
        other => panic!("expected Unsupported, got {other:?}"),
    }
    Ok(())
}

#[test]
fn missing_file_is_not_found() -> anyhow::Result<()> {
    let sounds = SoundDir::new()?;
    let (engine, _) = started_engine()?;
    let err = engine.load(sounds.path().join("missing.wav")).unwrap_err();
    assert!(matches!(err, EngineError::Asset(AssetError::NotFound(_))));
    Ok(())
}
