use std::fs::File;
use std::path::Path;

use audio_backend::AudioFormat;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use crate::decoder::Decoder;
use crate::sound::SoundAsset;
use crate::util::AssetError;

/// MPEG layer III via symphonia, decoded eagerly to interleaved 16-bit PCM.
pub struct Mp3Decoder;

impl Decoder for Mp3Decoder {
    fn name(&self) -> &'static str {
        "mp3"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["mp3"]
    }

    fn sniff(&self, header: &[u8]) -> bool {
        // ID3v2 tag, or a bare MPEG frame sync
        header.starts_with(b"ID3")
            || (header.len() >= 2 && header[0] == 0xFF && header[1] & 0xE0 == 0xE0)
    }

    fn load(&self, path: &Path) -> Result<SoundAsset, AssetError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(path.to_path_buf()),
            _ => AssetError::Io(e),
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        hint.with_extension("mp3");

        let probed = get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AssetError::Decode(format!("probe error: {e}")))?;
        let mut reader = probed.format;
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AssetError::Decode("no audio track".into()))?;
        let track_id = track.id;
        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AssetError::Decode(format!("codec make error: {e}")))?;

        let mut pcm: Vec<u8> = Vec::new();
        let mut layout: Option<(u32, usize)> = None;
        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(AssetError::Decode(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(buf) => buf,
                Err(SymphoniaError::DecodeError(msg)) => {
                    warn!(path = %path.display(), msg, "skipping undecodable mp3 packet");
                    continue;
                }
                Err(e) => return Err(AssetError::Decode(e.to_string())),
            };
            let spec = *decoded.spec();
            layout.get_or_insert((spec.rate, spec.channels.count()));
            let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            samples.copy_interleaved_ref(decoded);
            for s in samples.samples() {
                pcm.extend_from_slice(&s.to_le_bytes());
            }
        }

        let (rate, channels) =
            layout.ok_or_else(|| AssetError::Decode("no audio frames decoded".into()))?;
        if !(1..=2).contains(&channels) {
            return Err(AssetError::InvalidFormat(format!(
                "unsupported channel count: {channels} (only mono or stereo)"
            )));
        }
        let format = AudioFormat::pcm(rate, channels as u16, 16);
        let asset = SoundAsset::new(format, pcm, path);
        debug!(path = %path.display(), %format, seconds = asset.duration_seconds, "loaded mp3");
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_id3_and_frame_sync() {
        assert!(Mp3Decoder.sniff(b"ID3\x04\0\0\0\0\0\0"));
        assert!(Mp3Decoder.sniff(&[0xFF, 0xFB, 0x90, 0x64]));
        assert!(!Mp3Decoder.sniff(b"RIFF\0\0\0\0WAVE"));
    }

    #[test]
    fn garbage_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.mp3");
        std::fs::write(&path, b"ID3 this is not really an mp3").unwrap();
        assert!(Mp3Decoder.load(&path).is_err());
    }
}
