//! Engine backed by LibRaw through `rsraw-sys`.

use std::ffi::{c_char, c_int};
use std::path::Path;
use std::ptr::NonNull;

use rsraw_sys as sys;

use crate::params::ProcessingParams;

use super::{
    CameraMetadata, ColorInfo, EngineError, ErrorCode, ImageKind, ImageSizes, LensInfo,
    NativeAllocation, NativeImage, RawEngine, ThumbnailFormat, ThumbnailGeometry,
};

/// [`RawEngine`] implementation over one `libraw_data_t` handle.
///
/// LibRaw keeps reading the opened buffer until the next recycle, so the
/// engine owns it for that long. Stage flags are tracked here as well and
/// calls made out of order fail with [`ErrorCode::OutOfOrderCall`] before
/// they reach LibRaw.
pub struct LibRawEngine {
    handle: NonNull<sys::libraw_data_t>,
    source: Option<Vec<u8>>,
    unpacked: bool,
    processed: bool,
    thumb_unpacked: bool,
}

// SAFETY: a LibRaw handle has no thread affinity, and every call goes
// through `&mut self`, so only one thread touches it at a time.
unsafe impl Send for LibRawEngine {}

impl LibRawEngine {
    pub fn new() -> Result<Self, EngineError> {
        // SAFETY: no preconditions; a null return means allocation failed.
        let raw = unsafe { sys::libraw_init(0) };
        let handle = NonNull::new(raw).ok_or_else(|| {
            EngineError::new(ErrorCode::InsufficientMemory, "libraw_init returned null")
        })?;
        Ok(Self {
            handle,
            source: None,
            unpacked: false,
            processed: false,
            thumb_unpacked: false,
        })
    }

    fn data(&self) -> &sys::libraw_data_t {
        // SAFETY: the handle is valid from `new` until drop.
        unsafe { self.handle.as_ref() }
    }

    fn is_open(&self) -> bool {
        self.source.is_some()
    }

    fn require(&self, ready: bool, what: &str) -> Result<(), EngineError> {
        if ready {
            Ok(())
        } else {
            Err(EngineError::new(ErrorCode::OutOfOrderCall, what))
        }
    }
}

impl Drop for LibRawEngine {
    fn drop(&mut self) {
        // SAFETY: the handle came from libraw_init and is closed exactly once.
        unsafe { sys::libraw_close(self.handle.as_ptr()) };
    }
}

fn check(call: &str, status: c_int) -> Result<(), EngineError> {
    if status == 0 {
        Ok(())
    } else {
        Err(EngineError::new(
            ErrorCode::from(status),
            format!("{} returned {}", call, status),
        ))
    }
}

/// Copy a NUL-terminated LibRaw string field.
fn text(field: &[c_char]) -> String {
    let bytes: Vec<u8> = field
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).trim_end().to_string()
}

/// Every processing knob goes to LibRaw as-is.
fn apply_params(out: &mut sys::libraw_output_params_t, params: &ProcessingParams) {
    out.output_color = params.output_color.code() as _;
    out.output_bps = params.output_bps.bits() as _;
    out.gamm[0] = params.gamma.power;
    out.gamm[1] = params.gamma.slope;
    out.user_mul = params.user_mul.unwrap_or([0.0; 4]);
    out.use_camera_wb = params.use_camera_wb as _;
    out.use_auto_wb = params.use_auto_wb as _;
    out.half_size = params.half_size as _;
    out.no_auto_bright = params.no_auto_bright as _;
    out.user_qual = params.quality.code() as _;
    out.highlight = params.highlight.code() as _;
}

/// A `libraw_processed_image_t` released with `libraw_dcraw_clear_mem`.
struct LibRawImage(NonNull<sys::libraw_processed_image_t>);

// SAFETY: the allocation is plain heap memory, independent of the handle.
unsafe impl Send for LibRawImage {}

impl NativeAllocation for LibRawImage {
    fn as_bytes(&self) -> &[u8] {
        let image = self.0.as_ptr();
        // SAFETY: LibRaw allocates `data_size` bytes inline from `data`.
        unsafe {
            std::slice::from_raw_parts(
                std::ptr::addr_of!((*image).data).cast::<u8>(),
                (*image).data_size as usize,
            )
        }
    }
}

impl Drop for LibRawImage {
    fn drop(&mut self) {
        // SAFETY: pointer came from a make_mem call and is freed once.
        unsafe { sys::libraw_dcraw_clear_mem(self.0.as_ptr()) };
    }
}

fn wrap_image(
    call: &str,
    image: *mut sys::libraw_processed_image_t,
    errc: c_int,
) -> Result<Option<NativeImage>, EngineError> {
    let allocation = NonNull::new(image).map(LibRawImage);
    check(call, errc)?;
    let Some(allocation) = allocation else {
        return Ok(None);
    };
    // SAFETY: non-null result of a successful make_mem call.
    let header = unsafe { allocation.0.as_ref() };
    let kind = if header.type_ as i32 == ImageKind::Jpeg as i32 {
        ImageKind::Jpeg
    } else {
        ImageKind::Bitmap
    };
    let (width, height) = (header.width as u32, header.height as u32);
    let (colors, bits) = (header.colors as u16, header.bits as u16);
    Ok(Some(NativeImage::new(
        kind,
        width,
        height,
        colors,
        bits,
        Box::new(allocation),
    )))
}

impl RawEngine for LibRawEngine {
    fn open_file(&mut self, path: &Path) -> Result<(), EngineError> {
        let data = std::fs::read(path)?;
        self.open_buffer(data)
    }

    fn open_buffer(&mut self, data: Vec<u8>) -> Result<(), EngineError> {
        self.recycle();
        if data.is_empty() {
            return Err(EngineError::new(ErrorCode::FileUnsupported, "empty buffer"));
        }
        let source = self.source.insert(data);
        let (ptr, len) = (source.as_ptr(), source.len());
        // SAFETY: `source` stays alive and unmodified until recycle, which
        // tells LibRaw to drop its reference first.
        let status = unsafe { sys::libraw_open_buffer(self.handle.as_ptr(), ptr.cast(), len as _) };
        if let Err(e) = check("libraw_open_buffer", status) {
            self.recycle();
            return Err(e);
        }
        let idata = &self.data().idata;
        tracing::debug!(
            make = %text(&idata.make),
            model = %text(&idata.model),
            width = self.data().sizes.width,
            height = self.data().sizes.height,
            "identified RAW container"
        );
        Ok(())
    }

    fn unpack(&mut self) -> Result<(), EngineError> {
        self.require(self.is_open(), "no image is open")?;
        // SAFETY: valid handle with an opened image.
        check("libraw_unpack", unsafe {
            sys::libraw_unpack(self.handle.as_ptr())
        })?;
        self.unpacked = true;
        self.processed = false;
        Ok(())
    }

    fn is_unpacked(&self) -> bool {
        self.unpacked
    }

    fn dcraw_process(&mut self, params: &ProcessingParams) -> Result<(), EngineError> {
        self.require(self.unpacked, "sensor data is not unpacked")?;
        // SAFETY: exclusive access through `&mut self`.
        apply_params(unsafe { &mut self.handle.as_mut().params }, params);
        self.processed = false;
        // SAFETY: valid handle with unpacked sensor data.
        check("libraw_dcraw_process", unsafe {
            sys::libraw_dcraw_process(self.handle.as_ptr())
        })?;
        self.processed = true;
        Ok(())
    }

    fn make_mem_image(&mut self) -> Result<Option<NativeImage>, EngineError> {
        self.require(self.processed, "image has not been processed")?;
        let mut errc: c_int = 0;
        // SAFETY: valid handle with a processed image.
        let image = unsafe { sys::libraw_dcraw_make_mem_image(self.handle.as_ptr(), &mut errc) };
        wrap_image("libraw_dcraw_make_mem_image", image, errc)
    }

    fn unpack_thumb(&mut self) -> Result<(), EngineError> {
        self.require(self.is_open(), "no image is open")?;
        // SAFETY: valid handle with an opened image.
        check("libraw_unpack_thumb", unsafe {
            sys::libraw_unpack_thumb(self.handle.as_ptr())
        })?;
        self.thumb_unpacked = true;
        Ok(())
    }

    fn make_mem_thumb(&mut self) -> Result<Option<NativeImage>, EngineError> {
        self.require(self.thumb_unpacked, "thumbnail is not unpacked")?;
        let mut errc: c_int = 0;
        // SAFETY: valid handle with an unpacked thumbnail.
        let image = unsafe { sys::libraw_dcraw_make_mem_thumb(self.handle.as_ptr(), &mut errc) };
        wrap_image("libraw_dcraw_make_mem_thumb", image, errc)
    }

    fn recycle(&mut self) {
        // SAFETY: valid handle. LibRaw drops its view of `source` here, so
        // the buffer is released only afterwards.
        unsafe { sys::libraw_recycle(self.handle.as_ptr()) };
        self.source = None;
        self.unpacked = false;
        self.processed = false;
        self.thumb_unpacked = false;
    }

    fn sizes(&self) -> ImageSizes {
        if !self.is_open() {
            return ImageSizes::default();
        }
        let s = &self.data().sizes;
        ImageSizes {
            raw_width: s.raw_width as u32,
            raw_height: s.raw_height as u32,
            width: s.width as u32,
            height: s.height as u32,
            iwidth: s.iwidth as u32,
            iheight: s.iheight as u32,
            top_margin: s.top_margin as u32,
            left_margin: s.left_margin as u32,
            flip: s.flip as i32,
            pixel_aspect: s.pixel_aspect as f64,
        }
    }

    fn metadata(&self) -> CameraMetadata {
        if !self.is_open() {
            return CameraMetadata::default();
        }
        let (idata, other) = (&self.data().idata, &self.data().other);
        CameraMetadata {
            make: text(&idata.make),
            model: text(&idata.model),
            normalized_make: text(&idata.normalized_make),
            normalized_model: text(&idata.normalized_model),
            software: text(&idata.software),
            raw_count: idata.raw_count as u32,
            dng_version: idata.dng_version as u32,
            is_foveon: idata.is_foveon != 0,
            colors: idata.colors as u32,
            cdesc: text(&idata.cdesc),
            xmp_len: idata.xmplen as u32,
            iso: other.iso_speed as f32,
            shutter: other.shutter as f32,
            aperture: other.aperture as f32,
            focal_length: other.focal_len as f32,
            timestamp: other.timestamp as i64,
            shot_order: other.shot_order as u32,
            artist: text(&other.artist),
            desc: text(&other.desc),
            gps_data: other.gpsdata.map(|word| word as u32),
        }
    }

    fn lens(&self) -> LensInfo {
        if !self.is_open() {
            return LensInfo::default();
        }
        let lens = &self.data().lens;
        LensInfo {
            min_focal: lens.MinFocal as f32,
            max_focal: lens.MaxFocal as f32,
            max_ap_at_min_focal: lens.MaxAp4MinFocal as f32,
            max_ap_at_max_focal: lens.MaxAp4MaxFocal as f32,
            exif_max_ap: lens.EXIF_MaxAp as f32,
            lens_make: text(&lens.LensMake),
            lens: text(&lens.Lens),
            lens_serial: text(&lens.LensSerial),
            internal_lens_serial: text(&lens.InternalLensSerial),
            focal_length_in_35mm: lens.FocalLengthIn35mmFormat as u16,
        }
    }

    fn color(&self) -> ColorInfo {
        if !self.is_open() {
            return ColorInfo::default();
        }
        let color = &self.data().color;
        ColorInfo {
            camera_multipliers: color.cam_mul.map(|m| m as f32),
            pre_multipliers: color.pre_mul.map(|m| m as f32),
            black: color.black as u32,
            maximum: color.maximum as u32,
            fmaximum: color.fmaximum as f32,
            fnorm: color.fnorm as f32,
        }
    }

    fn thumbnail(&self) -> ThumbnailGeometry {
        if !self.thumb_unpacked {
            return ThumbnailGeometry::default();
        }
        let thumb = &self.data().thumbnail;
        let format = match thumb.tformat as i32 {
            1 => ThumbnailFormat::Jpeg,
            2 | 3 => ThumbnailFormat::Bitmap,
            _ => ThumbnailFormat::Unknown,
        };
        ThumbnailGeometry {
            width: thumb.twidth as u32,
            height: thumb.theight as u32,
            format,
        }
    }
}
