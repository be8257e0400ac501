use std::io::Read;
use std::path::Path;

use bytes::Bytes;

use crate::error::{Result, SessionError};

/// Bytes of image data carried by one firmware packet.
pub const CHUNK_SIZE: usize = 240;

/// Largest image whose chunk indices fit the 16-bit wire field.
pub const MAX_IMAGE_SIZE: usize = CHUNK_SIZE * u16::MAX as usize;

/// A firmware binary split into fixed-size transfer chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    data: Bytes,
}

impl FirmwareImage {
    /// Wrap an in-memory image.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.is_empty() {
            return Err(SessionError::EmptyImage);
        }
        if data.len() > MAX_IMAGE_SIZE {
            return Err(SessionError::ImageTooLarge {
                size: data.len(),
                max: MAX_IMAGE_SIZE,
            });
        }
        Ok(Self { data })
    }

    /// Read an image to the end of `reader`.
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Load an image file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Image size in bytes, before padding.
    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    /// Number of packets needed to carry the image.
    pub fn chunk_count(&self) -> u16 {
        // Bounded by MAX_IMAGE_SIZE at construction.
        self.data.len().div_ceil(CHUNK_SIZE) as u16
    }

    /// Raw image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Chunks in transfer order, the last one zero-padded.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        self.data.chunks(CHUNK_SIZE).enumerate().map(|(i, slice)| {
            let mut data = [0u8; CHUNK_SIZE];
            data[..slice.len()].copy_from_slice(slice);
            Chunk {
                index: i as u16 + 1,
                data,
            }
        })
    }
}

/// One packet's worth of image data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the image, starting at 1.
    pub index: u16,
    pub data: [u8; CHUNK_SIZE],
}
