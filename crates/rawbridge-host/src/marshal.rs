//! Conversion of job outcomes into host-owned values.
//!
//! Engine images never reach the host by reference: their bytes are copied
//! into a fresh `Vec` and the engine allocation is released before the
//! value is handed on.

use rawbridge_core::{ImageKind, ImageSizes, NativeImage, ThumbnailFormat, ThumbnailGeometry};
use serde::Serialize;

use crate::dispatch::NativeOutcome;
use crate::error::BridgeError;

/// Geometry reported by a completed open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenResult {
    pub width: u32,
    pub height: u32,
    pub raw_width: u32,
    pub raw_height: u32,
}

/// Geometry reported by a completed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub width: u32,
    pub height: u32,
    pub iwidth: u32,
    pub iheight: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailInfo {
    pub width: u32,
    pub height: u32,
    pub format: ThumbnailFormat,
}

/// An image or thumbnail copied out of engine memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemImage {
    #[serde(rename = "type")]
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    pub colors: u16,
    pub bits: u16,
    pub data_size: usize,
    pub data: Vec<u8>,
}

/// Value delivered to a completion sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum TaskOutput {
    Opened(OpenResult),
    Unpacked,
    Processed(ProcessResult),
    Image(MemImage),
    ThumbnailUnpacked(ThumbnailInfo),
    Thumbnail(MemImage),
    Recycled,
}

/// Build the host value for a finished job.
pub fn marshal(outcome: NativeOutcome) -> Result<TaskOutput, BridgeError> {
    Ok(match outcome {
        NativeOutcome::Opened(sizes) => TaskOutput::Opened(open_result(&sizes)),
        NativeOutcome::Unpacked => TaskOutput::Unpacked,
        NativeOutcome::Processed(sizes) => TaskOutput::Processed(process_result(&sizes)),
        NativeOutcome::Image(image) => TaskOutput::Image(copy_out(image, "image")?),
        NativeOutcome::ThumbnailUnpacked(geometry) => {
            TaskOutput::ThumbnailUnpacked(thumbnail_info(&geometry))
        }
        NativeOutcome::Thumbnail(image) => TaskOutput::Thumbnail(copy_out(image, "thumbnail")?),
        NativeOutcome::Recycled => TaskOutput::Recycled,
    })
}

fn open_result(sizes: &ImageSizes) -> OpenResult {
    OpenResult {
        width: sizes.width,
        height: sizes.height,
        raw_width: sizes.raw_width,
        raw_height: sizes.raw_height,
    }
}

fn process_result(sizes: &ImageSizes) -> ProcessResult {
    ProcessResult {
        width: sizes.width,
        height: sizes.height,
        iwidth: sizes.iwidth,
        iheight: sizes.iheight,
    }
}

fn thumbnail_info(geometry: &ThumbnailGeometry) -> ThumbnailInfo {
    ThumbnailInfo {
        width: geometry.width,
        height: geometry.height,
        format: geometry.format,
    }
}

/// Copy the bytes into host memory, then release the engine allocation.
/// A missing or empty image is an error even though the engine call
/// succeeded.
fn copy_out(image: Option<NativeImage>, what: &'static str) -> Result<MemImage, BridgeError> {
    let image = image.ok_or(BridgeError::EmptyResult(what))?;
    let data_size = image.data_size();
    if data_size == 0 {
        return Err(BridgeError::EmptyResult(what));
    }

    let mut data = Vec::with_capacity(data_size);
    data.extend_from_slice(image.data());
    let copied = MemImage {
        kind: image.kind,
        width: image.width,
        height: image.height,
        colors: image.colors,
        bits: image.bits,
        data_size,
        data,
    };
    drop(image);
    Ok(copied)
}

impl TryFrom<TaskOutput> for OpenResult {
    type Error = BridgeError;

    fn try_from(output: TaskOutput) -> Result<Self, Self::Error> {
        match output {
            TaskOutput::Opened(v) => Ok(v),
            other => Err(mismatch("open", &other)),
        }
    }
}

impl TryFrom<TaskOutput> for ProcessResult {
    type Error = BridgeError;

    fn try_from(output: TaskOutput) -> Result<Self, Self::Error> {
        match output {
            TaskOutput::Processed(v) => Ok(v),
            other => Err(mismatch("process", &other)),
        }
    }
}

impl TryFrom<TaskOutput> for ThumbnailInfo {
    type Error = BridgeError;

    fn try_from(output: TaskOutput) -> Result<Self, Self::Error> {
        match output {
            TaskOutput::ThumbnailUnpacked(v) => Ok(v),
            other => Err(mismatch("thumbnail unpack", &other)),
        }
    }
}

impl TryFrom<TaskOutput> for MemImage {
    type Error = BridgeError;

    fn try_from(output: TaskOutput) -> Result<Self, Self::Error> {
        match output {
            TaskOutput::Image(v) | TaskOutput::Thumbnail(v) => Ok(v),
            other => Err(mismatch("memory image", &other)),
        }
    }
}

impl TryFrom<TaskOutput> for () {
    type Error = BridgeError;

    fn try_from(output: TaskOutput) -> Result<Self, Self::Error> {
        match output {
            TaskOutput::Unpacked | TaskOutput::Recycled => Ok(()),
            other => Err(mismatch("unpack", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &TaskOutput) -> BridgeError {
    BridgeError::Worker(format!("expected {} output, got {:?}", expected, got))
}
