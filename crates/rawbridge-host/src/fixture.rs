//! Scripted engine standing in for a real decoder in tests.
//!
//! It accepts exactly [`FIXTURE_MAGIC`] and reports a 100x100 image with
//! camera multipliers `[2.0, 1.0, 1.5, 1.0]` and, unless configured
//! otherwise, no embedded thumbnail.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rawbridge_core::{
    CameraMetadata, ColorInfo, EngineError, ErrorCode, ImageKind, ImageSizes, LensInfo,
    NativeImage, ProcessingParams, RawEngine, ThumbnailFormat, ThumbnailGeometry,
};

pub(crate) const FIXTURE_MAGIC: &[u8] = b"RAWBRIDGE-FIXTURE-100x100";

const SIDE: u32 = 100;
const THUMB_SIDE: u32 = 16;

/// Route `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub(crate) struct FixtureEngine {
    loaded: bool,
    unpacked: bool,
    half_size: bool,
    /// Output bits of the last successful process.
    processed_bits: Option<u16>,
    thumbnail: Option<Vec<u8>>,
    thumbnail_unpacked: bool,
    open_delay: Option<Duration>,
    panic_on_unpack: bool,
    process_error: Option<ErrorCode>,
    unpack_calls: usize,
    recycled: Arc<AtomicUsize>,
}

impl FixtureEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_thumbnail(mut self, jpeg: Vec<u8>) -> Self {
        self.thumbnail = Some(jpeg);
        self
    }

    pub(crate) fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub(crate) fn panicking_on_unpack(mut self) -> Self {
        self.panic_on_unpack = true;
        self
    }

    pub(crate) fn failing_process(mut self, code: ErrorCode) -> Self {
        self.process_error = Some(code);
        self
    }

    pub(crate) fn unpack_calls(&self) -> usize {
        self.unpack_calls
    }

    pub(crate) fn recycle_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.recycled)
    }

    fn out_of_order(what: &str) -> EngineError {
        EngineError::new(ErrorCode::OutOfOrderCall, what)
    }
}

impl RawEngine for FixtureEngine {
    fn open_file(&mut self, path: &Path) -> Result<(), EngineError> {
        let data = std::fs::read(path)?;
        self.open_buffer(data)
    }

    fn open_buffer(&mut self, data: Vec<u8>) -> Result<(), EngineError> {
        if let Some(delay) = self.open_delay {
            std::thread::sleep(delay);
        }
        if data != FIXTURE_MAGIC {
            return Err(EngineError::new(ErrorCode::FileUnsupported, "not a fixture"));
        }
        self.loaded = true;
        Ok(())
    }

    fn unpack(&mut self) -> Result<(), EngineError> {
        if !self.loaded {
            return Err(Self::out_of_order("unpack before open"));
        }
        if self.panic_on_unpack {
            panic!("fixture unpack exploded");
        }
        self.unpack_calls += 1;
        self.unpacked = true;
        Ok(())
    }

    fn is_unpacked(&self) -> bool {
        self.unpacked
    }

    fn dcraw_process(&mut self, params: &ProcessingParams) -> Result<(), EngineError> {
        if !self.unpacked {
            return Err(Self::out_of_order("process before unpack"));
        }
        if let Some(code) = self.process_error {
            return Err(EngineError::bare(code));
        }
        self.half_size = params.half_size;
        self.processed_bits = Some(params.output_bps.bits());
        Ok(())
    }

    fn make_mem_image(&mut self) -> Result<Option<NativeImage>, EngineError> {
        // Like the native library, an unprocessed image yields a success
        // status with no data.
        let Some(bits) = self.processed_bits else {
            return Ok(None);
        };
        let sizes = self.sizes();
        let len = (sizes.iwidth * sizes.iheight * 3) as usize * (bits as usize / 8);
        Ok(Some(NativeImage::new(
            ImageKind::Bitmap,
            sizes.iwidth,
            sizes.iheight,
            3,
            bits,
            Box::new(vec![0x80u8; len]),
        )))
    }

    fn unpack_thumb(&mut self) -> Result<(), EngineError> {
        if !self.loaded {
            return Err(Self::out_of_order("thumbnail before open"));
        }
        if self.thumbnail.is_none() {
            return Err(EngineError::bare(ErrorCode::NoThumbnail));
        }
        self.thumbnail_unpacked = true;
        Ok(())
    }

    fn make_mem_thumb(&mut self) -> Result<Option<NativeImage>, EngineError> {
        if !self.thumbnail_unpacked {
            return Err(Self::out_of_order("thumbnail not unpacked"));
        }
        Ok(self.thumbnail.clone().map(|jpeg| {
            NativeImage::new(ImageKind::Jpeg, THUMB_SIDE, THUMB_SIDE, 3, 8, Box::new(jpeg))
        }))
    }

    fn recycle(&mut self) {
        self.loaded = false;
        self.unpacked = false;
        self.half_size = false;
        self.processed_bits = None;
        self.thumbnail_unpacked = false;
        self.recycled.fetch_add(1, Ordering::SeqCst);
    }

    fn sizes(&self) -> ImageSizes {
        if !self.loaded {
            return ImageSizes::default();
        }
        let shift = u32::from(self.half_size);
        ImageSizes {
            raw_width: SIDE,
            raw_height: SIDE,
            width: SIDE,
            height: SIDE,
            iwidth: SIDE >> shift,
            iheight: SIDE >> shift,
            top_margin: 0,
            left_margin: 0,
            flip: 0,
            pixel_aspect: 1.0,
        }
    }

    fn metadata(&self) -> CameraMetadata {
        if !self.loaded {
            return CameraMetadata::default();
        }
        CameraMetadata {
            make: "Rawbridge".to_string(),
            model: "Synthetic 100".to_string(),
            normalized_make: "Rawbridge".to_string(),
            normalized_model: "Synthetic 100".to_string(),
            raw_count: 1,
            colors: 3,
            cdesc: "RGBG".to_string(),
            iso: 100.0,
            shutter: 1.0 / 125.0,
            aperture: 8.0,
            focal_length: 35.0,
            ..CameraMetadata::default()
        }
    }

    fn lens(&self) -> LensInfo {
        LensInfo::default()
    }

    fn color(&self) -> ColorInfo {
        if !self.loaded {
            return ColorInfo::default();
        }
        ColorInfo {
            camera_multipliers: [2.0, 1.0, 1.5, 1.0],
            pre_multipliers: [1.0; 4],
            black: 0,
            maximum: 4095,
            fmaximum: 4095.0,
            fnorm: 1.0 / 4095.0,
        }
    }

    fn thumbnail(&self) -> ThumbnailGeometry {
        if !self.thumbnail_unpacked {
            return ThumbnailGeometry::default();
        }
        ThumbnailGeometry {
            width: THUMB_SIDE,
            height: THUMB_SIDE,
            format: ThumbnailFormat::Jpeg,
        }
    }
}
