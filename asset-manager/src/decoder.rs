use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::sound::SoundAsset;
use crate::util::{extension_of, AssetError, HEADER_PROBE_LEN};

/// A container decoder producing 16-bit PCM.
pub trait Decoder: Send + Sync {
    fn name(&self) -> &'static str;
    /// Lowercase extensions handled, without the leading dot.
    fn extensions(&self) -> &'static [&'static str];
    /// Whether the first bytes of a file look like this container.
    fn sniff(&self, header: &[u8]) -> bool;
    fn load(&self, path: &Path) -> Result<SoundAsset, AssetError>;
}

/// Explicit table of decoders, looked up by extension first and by signature second.
#[derive(Default, Clone)]
pub struct DecoderRegistry {
    decoders: Vec<Arc<dyn Decoder>>,
    by_extension: HashMap<String, Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// WAV always; MP3 when built with the `mp3` feature.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::wav::WavDecoder));
        #[cfg(feature = "mp3")]
        registry.register(Arc::new(crate::mp3::Mp3Decoder));
        registry
    }

    pub fn register(&mut self, decoder: Arc<dyn Decoder>) {
        for ext in decoder.extensions() {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            if let Some(previous) = self.by_extension.insert(ext.clone(), decoder.clone()) {
                warn!(
                    extension = %ext,
                    previous = previous.name(),
                    decoder = decoder.name(),
                    "decoder extension overwritten"
                );
            }
        }
        debug!(decoder = decoder.name(), extensions = ?decoder.extensions(), "registered decoder");
        self.decoders.push(decoder);
    }

    /// Sorted list of every registered extension.
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.by_extension.keys().cloned().collect();
        exts.sort();
        exts
    }

    pub fn decoder_for(&self, path: &Path) -> Result<Arc<dyn Decoder>, AssetError> {
        let header = read_header(path)?;

        if let Some(decoder) = extension_of(path).and_then(|ext| self.by_extension.get(&ext)) {
            if decoder.sniff(&header) {
                return Ok(decoder.clone());
            }
        }

        self.decoders
            .iter()
            .find(|d| d.sniff(&header))
            .cloned()
            .ok_or_else(|| AssetError::Unsupported {
                path: path.to_path_buf(),
                supported: self.supported_extensions(),
            })
    }

    pub fn load(&self, path: &Path) -> Result<SoundAsset, AssetError> {
        let decoder = self.decoder_for(path)?;
        debug!(path = %path.display(), decoder = decoder.name(), "decoding");
        decoder.load(path)
    }
}

fn read_header(path: &Path) -> Result<Vec<u8>, AssetError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AssetError::NotFound(path.to_path_buf()),
        _ => AssetError::Io(e),
    })?;
    let mut header = Vec::with_capacity(HEADER_PROBE_LEN);
    file.take(HEADER_PROBE_LEN as u64).read_to_end(&mut header)?;
    Ok(header)
}
