//! RIFF/WAVE decoder for 16-bit integer PCM.

use std::path::Path;

use audio_backend::AudioFormat;
use tracing::{debug, warn};

use crate::decoder::Decoder;
use crate::sound::SoundAsset;
use crate::util::AssetError;

const WAVE_FORMAT_PCM: u16 = 1;
const SUPPORTED_RATES: [u32; 2] = [44_100, 48_000];

pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["wav", "wave"]
    }

    fn sniff(&self, header: &[u8]) -> bool {
        header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE"
    }

    fn load(&self, path: &Path) -> Result<SoundAsset, AssetError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(path.to_path_buf()),
            _ => AssetError::Io(e),
        })?;
        parse_wav(&bytes, path)
    }
}

fn read_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn read_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn invalid(msg: impl Into<String>) -> AssetError {
    AssetError::InvalidFormat(msg.into())
}

/// Parse an in-memory WAV file. `source_path` is only recorded on the asset.
pub fn parse_wav(bytes: &[u8], source_path: &Path) -> Result<SoundAsset, AssetError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" {
        return Err(invalid("not a RIFF file"));
    }
    if &bytes[8..12] != b"WAVE" {
        return Err(invalid("not a WAVE file"));
    }

    let mut format: Option<AudioFormat> = None;
    let mut pos = 12usize;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = read_u32(bytes, pos + 4) as usize;
        let body = pos + 8;

        match id {
            b"fmt " => {
                if size < 16 || body + 16 > bytes.len() {
                    return Err(invalid("fmt chunk too short"));
                }
                format = Some(parse_fmt(&bytes[body..body + 16])?);
            }
            b"data" => {
                let format = format.ok_or_else(|| invalid("data chunk before fmt chunk"))?;
                let available = bytes.len() - body;
                let mut len = size.min(available);
                if len < size {
                    warn!(
                        path = %source_path.display(),
                        declared = size,
                        available,
                        "wav data chunk truncated"
                    );
                }
                len -= len % format.frame_size();
                let asset = SoundAsset::new(format, &bytes[body..body + len], source_path);
                debug!(
                    path = %source_path.display(),
                    %format,
                    seconds = asset.duration_seconds,
                    "loaded wav"
                );
                return Ok(asset);
            }
            _ => {}
        }

        // chunks are word aligned; odd sizes carry one pad byte
        pos = body.saturating_add(size).saturating_add(size & 1);
    }

    match format {
        None => Err(invalid("missing fmt chunk")),
        Some(_) => Err(invalid("missing data chunk")),
    }
}

fn parse_fmt(fmt: &[u8]) -> Result<AudioFormat, AssetError> {
    let tag = read_u16(fmt, 0);
    let channels = read_u16(fmt, 2);
    let sample_rate = read_u32(fmt, 4);
    let block_align = read_u16(fmt, 12);
    let bits = read_u16(fmt, 14);

    if tag != WAVE_FORMAT_PCM {
        return Err(invalid(format!(
            "unsupported format tag {tag} (only PCM is supported)"
        )));
    }
    if bits != 16 {
        return Err(invalid(format!(
            "unsupported bits per sample: {bits} (only 16-bit is supported)"
        )));
    }
    if !(1..=2).contains(&channels) {
        return Err(invalid(format!(
            "unsupported channel count: {channels} (only mono or stereo)"
        )));
    }
    if !SUPPORTED_RATES.contains(&sample_rate) {
        return Err(invalid(format!(
            "unsupported sample rate: {sample_rate} Hz (only 44100 or 48000)"
        )));
    }

    let format = AudioFormat::pcm(sample_rate, channels, bits);
    if block_align != format.block_align {
        return Err(invalid(format!(
            "block align {block_align} does not match {channels}ch 16-bit"
        )));
    }
    Ok(format)
}
