//! The native decoding engine surface.
//!
//! Everything that actually turns RAW bytes into pixels sits behind
//! [`RawEngine`]. The call sequence mirrors the classic LibRaw flow:
//!
//! 1. `open_file` / `open_buffer` - identify the image and fill geometry
//! 2. `unpack` - decode sensor data into an internal buffer
//! 3. `dcraw_process` - demosaic, white balance, colour conversion
//! 4. `make_mem_image` - hand out the processed pixels
//!
//! plus the thumbnail pair `unpack_thumb` / `make_mem_thumb` and `recycle`.
//!
//! Engines are not thread-safe on their own; callers must serialize access
//! to a single instance. They are `Send` so an instance can be moved onto a
//! worker thread for the duration of a call.

#[cfg(test)]
mod dng;
mod libraw;
mod types;

use std::path::Path;

use crate::params::ProcessingParams;

pub use libraw::LibRawEngine;
pub use types::{
    CameraMetadata, ColorInfo, EngineError, ErrorCode, ImageSizes, LensInfo, ThumbnailFormat,
    ThumbnailGeometry,
};

/// The fixed API surface of a RAW decoding engine.
pub trait RawEngine: Send + 'static {
    /// Open a file on disk. Any previously opened image must be recycled
    /// by the caller first.
    fn open_file(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Open an in-memory RAW file. The engine takes ownership of the bytes.
    fn open_buffer(&mut self, data: Vec<u8>) -> Result<(), EngineError>;

    /// Decode sensor data.
    fn unpack(&mut self) -> Result<(), EngineError>;

    /// Whether sensor data is currently unpacked.
    fn is_unpacked(&self) -> bool;

    /// Run the full processing pipeline with the given parameters.
    fn dcraw_process(&mut self, params: &ProcessingParams) -> Result<(), EngineError>;

    /// Produce the processed image. `Ok(None)` is a success status that
    /// carried no image.
    fn make_mem_image(&mut self) -> Result<Option<NativeImage>, EngineError>;

    /// Locate and unpack the embedded thumbnail.
    fn unpack_thumb(&mut self) -> Result<(), EngineError>;

    /// Produce the unpacked thumbnail.
    fn make_mem_thumb(&mut self) -> Result<Option<NativeImage>, EngineError>;

    /// Release every buffer and forget the current image.
    fn recycle(&mut self);

    fn sizes(&self) -> ImageSizes;
    fn metadata(&self) -> CameraMetadata;
    fn lens(&self) -> LensInfo;
    fn color(&self) -> ColorInfo;
    fn thumbnail(&self) -> ThumbnailGeometry;
}

/// Storage owned by an engine. Dropping the value releases it.
pub trait NativeAllocation: Send {
    fn as_bytes(&self) -> &[u8];
}

impl NativeAllocation for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

/// Pixel layout tag of a [`NativeImage`], numerically `LibRaw_image_formats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum ImageKind {
    /// Encoded JPEG stream.
    Jpeg = 1,
    /// Interleaved bitmap, `colors` samples of `bits` each per pixel.
    Bitmap = 2,
}

/// An image living in engine memory.
///
/// The bytes are only reachable by borrow; whoever needs to keep them must
/// copy them out before the value is dropped.
pub struct NativeImage {
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    pub colors: u16,
    pub bits: u16,
    allocation: Box<dyn NativeAllocation>,
}

impl NativeImage {
    pub fn new(
        kind: ImageKind,
        width: u32,
        height: u32,
        colors: u16,
        bits: u16,
        allocation: Box<dyn NativeAllocation>,
    ) -> Self {
        Self {
            kind,
            width,
            height,
            colors,
            bits,
            allocation,
        }
    }

    /// Size of the image payload in bytes.
    pub fn data_size(&self) -> usize {
        self.allocation.as_bytes().len()
    }

    pub fn data(&self) -> &[u8] {
        self.allocation.as_bytes()
    }
}

impl std::fmt::Debug for NativeImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeImage")
            .field("kind", &self.kind)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("colors", &self.colors)
            .field("bits", &self.bits)
            .field("data_size", &self.data_size())
            .finish()
    }
}
