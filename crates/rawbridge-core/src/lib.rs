//! rawbridge core - RAW decoding engine surface
//!
//! This crate holds everything on the native side of the boundary: the
//! [`RawEngine`] API, the LibRaw-backed engine, processing
//! parameters with their constant tables, and the module-level registry.

pub mod engine;
pub mod params;
pub mod registry;

pub use engine::{
    CameraMetadata, ColorInfo, EngineError, ErrorCode, ImageKind, ImageSizes, LensInfo,
    LibRawEngine, NativeAllocation, NativeImage, RawEngine, ThumbnailFormat, ThumbnailGeometry,
};
pub use params::{
    ColorSpace, DemosaicQuality, Gamma, HighlightMode, OutputBits, ProcessingParams, UnknownCode,
};
pub use registry::{ConstantTable, VersionInfo};
