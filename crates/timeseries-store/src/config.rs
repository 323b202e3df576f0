//! Cell store settings.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::codec::BytesToBytesCodecTraits;

use crate::error::{StoreError, StoreResult};

/// Default time steps per chunk.
pub const DEFAULT_TIME_CHUNK: usize = 1000;

/// How cell arrays are chunked and compressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Time steps per chunk.
    pub time_chunk: usize,

    pub compression: ZarrCompression,

    /// Blosc level, 1-9.
    pub compression_level: u8,

    /// Blosc byte shuffle.
    pub shuffle: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            time_chunk: DEFAULT_TIME_CHUNK,
            compression: ZarrCompression::default(),
            compression_level: 1,
            shuffle: true,
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by `TS_TIME_CHUNK`, `TS_COMPRESSION`,
    /// `TS_COMPRESSION_LEVEL` and `TS_SHUFFLE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(chunk) = env_parse("TS_TIME_CHUNK") {
            config.time_chunk = chunk;
        }
        if let Some(compression) = env_parse("TS_COMPRESSION") {
            config.compression = compression;
        }
        if let Some(level) = env_parse("TS_COMPRESSION_LEVEL") {
            config.compression_level = level;
        }
        if let Ok(val) = std::env::var("TS_SHUFFLE") {
            config.shuffle = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.time_chunk == 0 {
            return Err("time_chunk must be > 0".to_string());
        }
        if !(1..=9).contains(&self.compression_level) {
            return Err(format!(
                "compression_level must be 1-9, got {}",
                self.compression_level
            ));
        }
        Ok(())
    }

    /// Bytes-to-bytes codec for elements of `typesize` bytes, `None` when
    /// compression is off.
    pub(crate) fn compression_codec(
        &self,
        typesize: usize,
    ) -> StoreResult<Option<Arc<dyn BytesToBytesCodecTraits>>> {
        let compressor = match self.compression {
            ZarrCompression::None => return Ok(None),
            ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let level = BloscCompressionLevel::try_from(self.compression_level).map_err(|_| {
            StoreError::Config(format!("bad compression level {}", self.compression_level))
        })?;
        let (shuffle, typesize) = if self.shuffle {
            (BloscShuffleMode::Shuffle, Some(typesize))
        } else {
            (BloscShuffleMode::NoShuffle, None)
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(Some(Arc::new(codec)))
    }
}

fn env_parse<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let val = std::env::var(name).ok()?;
    match val.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(variable = name, value = %val, error = %e, "Ignoring invalid environment value");
            None
        }
    }
}

/// Compression of the cell arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ZarrCompression {
    None,
    BloscLz4,
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl FromStr for ZarrCompression {
    type Err = String;

    /// Case-insensitive; `lz4` and `zstd` select the Blosc variants.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "lz4" | "blosc_lz4" => Ok(Self::BloscLz4),
            "zstd" | "blosc_zstd" => Ok(Self::BloscZstd),
            other => Err(format!("unknown compression '{}'", other)),
        }
    }
}

impl fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
