//! Core types shared by every engine implementation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Native status codes, numerically identical to LibRaw's `LibRaw_errors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    Unspecified = -1,
    FileUnsupported = -2,
    RequestForNonexistentImage = -3,
    OutOfOrderCall = -4,
    NoThumbnail = -5,
    UnsupportedThumbnail = -6,
    InputClosed = -7,
    NotImplemented = -8,
    InsufficientMemory = -100007,
    DataError = -100008,
    IoError = -100009,
    CancelledByCallback = -100010,
    BadCrop = -100011,
    TooBig = -100012,
}

impl ErrorCode {
    /// Numeric value of the code.
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Human-readable description of the code.
    pub fn strerror(self) -> &'static str {
        match self {
            ErrorCode::Success => "No error",
            ErrorCode::Unspecified => "Unspecified error",
            ErrorCode::FileUnsupported => "Unsupported file format or not RAW file",
            ErrorCode::RequestForNonexistentImage => "Request for nonexisting image number",
            ErrorCode::OutOfOrderCall => "Out of order call of libraw function",
            ErrorCode::NoThumbnail => "No thumbnail in file",
            ErrorCode::UnsupportedThumbnail => "Unsupported thumbnail format",
            ErrorCode::InputClosed => "No input stream, or input stream closed",
            ErrorCode::NotImplemented => "Decoder not implemented for this data format",
            ErrorCode::InsufficientMemory => "Unsufficient memory",
            ErrorCode::DataError => "Corrupted data or unexpected EOF",
            ErrorCode::IoError => "Input/output error",
            ErrorCode::CancelledByCallback => "Cancelled by user callback",
            ErrorCode::BadCrop => "Bad crop box",
            ErrorCode::TooBig => "Image too big for processing",
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(value: i32) -> Self {
        match value {
            0 => ErrorCode::Success,
            -2 => ErrorCode::FileUnsupported,
            -3 => ErrorCode::RequestForNonexistentImage,
            -4 => ErrorCode::OutOfOrderCall,
            -5 => ErrorCode::NoThumbnail,
            -6 => ErrorCode::UnsupportedThumbnail,
            -7 => ErrorCode::InputClosed,
            -8 => ErrorCode::NotImplemented,
            -100007 => ErrorCode::InsufficientMemory,
            -100008 => ErrorCode::DataError,
            -100009 => ErrorCode::IoError,
            -100010 => ErrorCode::CancelledByCallback,
            -100011 => ErrorCode::BadCrop,
            -100012 => ErrorCode::TooBig,
            _ => ErrorCode::Unspecified,
        }
    }
}

/// Error reported by an engine call.
///
/// `detail` carries engine-specific context for logs; the code alone decides
/// how the failure is surfaced.
#[derive(Debug, Clone, Error)]
#[error("{} ({})", code.strerror(), detail)]
pub struct EngineError {
    pub code: ErrorCode,
    pub detail: String,
}

impl EngineError {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    /// Error with no additional detail.
    pub fn bare(code: ErrorCode) -> Self {
        Self::new(code, code.strerror())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::new(ErrorCode::IoError, e.to_string())
    }
}

/// Image geometry as reported after open/unpack/process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSizes {
    pub raw_width: u32,
    pub raw_height: u32,
    /// Visible width after the crop box.
    pub width: u32,
    /// Visible height after the crop box.
    pub height: u32,
    /// Output width (halved when half-size decoding is on).
    pub iwidth: u32,
    /// Output height (halved when half-size decoding is on).
    pub iheight: u32,
    pub top_margin: u32,
    pub left_margin: u32,
    pub flip: i32,
    pub pixel_aspect: f64,
}

/// Camera identification and shot parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraMetadata {
    pub make: String,
    pub model: String,
    pub normalized_make: String,
    pub normalized_model: String,
    pub software: String,
    pub raw_count: u32,
    pub dng_version: u32,
    pub is_foveon: bool,
    pub colors: u32,
    /// Colour description, e.g. "RGBG".
    pub cdesc: String,
    pub xmp_len: u32,
    pub iso: f32,
    /// Exposure time in seconds.
    pub shutter: f32,
    pub aperture: f32,
    pub focal_length: f32,
    /// Capture time as seconds since the Unix epoch.
    pub timestamp: i64,
    pub shot_order: u32,
    pub artist: String,
    pub desc: String,
    /// Raw GPS words: latitude, longitude and altitude rationals followed by
    /// the reference letters and a validity flag.
    pub gps_data: [u32; 32],
}

/// Lens description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LensInfo {
    pub min_focal: f32,
    pub max_focal: f32,
    pub max_ap_at_min_focal: f32,
    pub max_ap_at_max_focal: f32,
    pub exif_max_ap: f32,
    pub lens_make: String,
    pub lens: String,
    pub lens_serial: String,
    pub internal_lens_serial: String,
    pub focal_length_in_35mm: u16,
}

/// Sensor colour data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorInfo {
    /// As-shot white balance multipliers (R, G1, B, G2).
    pub camera_multipliers: [f32; 4],
    /// Daylight multipliers derived from the colour matrix.
    pub pre_multipliers: [f32; 4],
    pub black: u32,
    pub maximum: u32,
    pub fmaximum: f32,
    pub fnorm: f32,
}

/// Encoding of an embedded thumbnail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ThumbnailFormat {
    #[default]
    Unknown = 0,
    Jpeg = 1,
    Bitmap = 2,
}

/// Geometry of an unpacked thumbnail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailGeometry {
    pub width: u32,
    pub height: u32,
    pub format: ThumbnailFormat,
}
