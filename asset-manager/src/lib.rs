//! Sound asset loading: container decoders and a memory-budgeted cache.
pub mod decoder;
pub mod loader;
#[cfg(feature = "mp3")]
pub mod mp3;
pub mod sound;
pub mod util;
pub mod wav;

pub use decoder::{Decoder, DecoderRegistry};
pub use loader::SoundLoader;
pub use sound::SoundAsset;
pub use util::{AssetError, DEFAULT_CACHE_BUDGET_BYTES};
pub use wav::{parse_wav, WavDecoder};
