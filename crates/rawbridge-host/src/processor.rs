//! Exclusive owner of one engine instance and its lifecycle state.

use std::path::PathBuf;

use rawbridge_core::{
    CameraMetadata, ColorInfo, EngineError, ErrorCode, ImageSizes, LensInfo, NativeImage,
    ProcessingParams, RawEngine, ThumbnailGeometry,
};
use serde::Serialize;

use crate::error::BridgeError;

/// Progress of the current image through the decode pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LifecycleState {
    #[default]
    Empty,
    Loaded,
    Unpacked,
    Processed,
}

/// Input of an open call. Both variants own their data.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    File(PathBuf),
    Buffer(Vec<u8>),
}

/// The most recent engine failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub code: i32,
    pub message: String,
}

/// Values copied out of the engine after a completed operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub sizes: ImageSizes,
    pub metadata: CameraMetadata,
    pub lens: LensInfo,
    pub color: ColorInfo,
    pub thumbnail: ThumbnailGeometry,
}

/// One engine plus the state machine gating which calls are legal.
///
/// Not synchronized; callers hand it to one job at a time.
pub struct NativeProcessor<E: RawEngine> {
    engine: E,
    state: LifecycleState,
    last_error: Option<LastError>,
}

impl<E: RawEngine> NativeProcessor<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: LifecycleState::Empty,
            last_error: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Log an engine failure and keep it as the last error.
    fn record(&mut self, prefix: &str, err: &EngineError) {
        tracing::warn!(code = err.code.code(), detail = %err.detail, "{}", prefix);
        self.last_error = Some(LastError {
            code: err.code.code(),
            message: BridgeError::decode(prefix, err).to_string(),
        });
    }

    fn fail(&mut self, prefix: &str, err: EngineError) -> BridgeError {
        self.record(prefix, &err);
        BridgeError::decode(prefix, &err)
    }

    fn require(&self, minimum: LifecycleState) -> Result<(), BridgeError> {
        if self.state >= minimum {
            Ok(())
        } else {
            Err(BridgeError::InvalidState("No file loaded".to_string()))
        }
    }

    /// Open a new image, discarding whatever was loaded before.
    pub fn open(&mut self, source: Source) -> Result<ImageSizes, BridgeError> {
        self.recycle();
        let (prefix, result) = match source {
            Source::File(path) => ("Failed to open file", self.engine.open_file(&path)),
            Source::Buffer(data) => ("Failed to open buffer", self.engine.open_buffer(data)),
        };
        match result {
            Ok(()) => {
                self.state = LifecycleState::Loaded;
                Ok(self.engine.sizes())
            }
            Err(e) => {
                self.engine.recycle();
                Err(self.fail(prefix, e))
            }
        }
    }

    /// Decode sensor data. Re-running it repeats the full decode.
    pub fn unpack(&mut self) -> Result<(), BridgeError> {
        self.require(LifecycleState::Loaded)?;
        match self.engine.unpack() {
            Ok(()) => {
                self.state = LifecycleState::Unpacked;
                Ok(())
            }
            Err(e) => Err(self.fail("Failed to unpack", e)),
        }
    }

    /// Run the processing pipeline, unpacking first when needed.
    pub fn process(&mut self, params: &ProcessingParams) -> Result<ImageSizes, BridgeError> {
        self.require(LifecycleState::Loaded)?;
        if !self.engine.is_unpacked() {
            self.unpack()?;
        }
        match self.engine.dcraw_process(params) {
            Ok(()) => {
                self.state = LifecycleState::Processed;
                Ok(self.engine.sizes())
            }
            Err(e) => Err(self.fail("Failed to process", e)),
        }
    }

    pub fn make_memory_image(&mut self) -> Result<Option<NativeImage>, BridgeError> {
        self.engine
            .make_mem_image()
            .map_err(|e| self.fail("Failed to make memory image", e))
    }

    /// Locate the embedded thumbnail. A file without one reports
    /// [`BridgeError::NoThumbnail`].
    pub fn unpack_thumbnail(&mut self) -> Result<ThumbnailGeometry, BridgeError> {
        self.require(LifecycleState::Loaded)?;
        match self.engine.unpack_thumb() {
            Ok(()) => Ok(self.engine.thumbnail()),
            Err(e) if e.code == ErrorCode::NoThumbnail => {
                self.record("Failed to unpack thumbnail", &e);
                Err(BridgeError::NoThumbnail)
            }
            Err(e) => Err(self.fail("Failed to unpack thumbnail", e)),
        }
    }

    pub fn make_memory_thumbnail(&mut self) -> Result<Option<NativeImage>, BridgeError> {
        self.engine
            .make_mem_thumb()
            .map_err(|e| self.fail("Failed to make memory thumbnail", e))
    }

    /// Unpack the thumbnail unless already done, then produce it.
    pub fn thumbnail_image(&mut self) -> Result<Option<NativeImage>, BridgeError> {
        self.require(LifecycleState::Loaded)?;
        if self.engine.thumbnail().format == rawbridge_core::ThumbnailFormat::Unknown {
            self.unpack_thumbnail()?;
        }
        self.make_memory_thumbnail()
    }

    /// Release every engine buffer. Safe in any state.
    pub fn recycle(&mut self) {
        self.engine.recycle();
        self.state = LifecycleState::Empty;
    }

    /// Copy of the engine's metadata, or `None` when nothing is loaded.
    pub fn snapshot(&self) -> Option<ImageInfo> {
        if self.state == LifecycleState::Empty {
            return None;
        }
        Some(ImageInfo {
            sizes: self.engine.sizes(),
            metadata: self.engine.metadata(),
            lens: self.engine.lens(),
            color: self.engine.color(),
            thumbnail: self.engine.thumbnail(),
        })
    }
}

impl<E: RawEngine> Drop for NativeProcessor<E> {
    fn drop(&mut self) {
        self.recycle();
    }
}
