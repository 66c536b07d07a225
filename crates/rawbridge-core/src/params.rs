//! Processing parameters and the constant tables exposed to hosts.
//!
//! The numeric codes match LibRaw's `output_color`, `user_qual` and
//! `highlight` values so hosts written against the native library keep
//! working unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A numeric code that is not part of a constant table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {table} code: {code}")]
pub struct UnknownCode {
    pub table: &'static str,
    pub code: i32,
}

macro_rules! code_table {
    (
        $(#[$meta:meta])*
        $name:ident, $table:literal {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(i32)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $code),+
        }

        impl $name {
            /// Every entry, in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Numeric value as understood by the native library.
            #[inline]
            pub fn code(self) -> i32 {
                self as i32
            }

            /// Constant name as exposed to hosts.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl TryFrom<i32> for $name {
            type Error = UnknownCode;

            fn try_from(code: i32) -> Result<Self, Self::Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err(UnknownCode { table: $table, code }),
                }
            }
        }
    };
}

code_table! {
    /// Output colour space.
    ColorSpace, "color space" {
        Raw = 0 => "RAW",
        Srgb = 1 => "SRGB",
        Adobe = 2 => "ADOBE",
        Wide = 3 => "WIDE",
        ProPhoto = 4 => "PROPHOTO",
        Xyz = 5 => "XYZ",
        Aces = 6 => "ACES",
        DciP3 = 7 => "DCIP3",
        Rec2020 = 8 => "REC2020",
    }
}

code_table! {
    /// Demosaic interpolation quality.
    DemosaicQuality, "demosaic quality" {
        Linear = 0 => "LINEAR",
        Vng = 1 => "VNG",
        Ppg = 2 => "PPG",
        Ahd = 3 => "AHD",
        Dcb = 4 => "DCB",
        Dht = 11 => "DHT",
        Aahd = 12 => "AAHD",
    }
}

code_table! {
    /// Policy for clipped highlights.
    HighlightMode, "highlight mode" {
        Clip = 0 => "CLIP",
        Unclip = 1 => "UNCLIP",
        Blend = 2 => "BLEND",
        Rebuild3 = 3 => "REBUILD_3",
        Rebuild5 = 5 => "REBUILD_5",
        Rebuild7 = 7 => "REBUILD_7",
        Rebuild9 = 9 => "REBUILD_9",
    }
}

/// Output sample depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OutputBits {
    Eight,
    #[default]
    Sixteen,
}

impl OutputBits {
    pub fn bits(self) -> u16 {
        match self {
            OutputBits::Eight => 8,
            OutputBits::Sixteen => 16,
        }
    }
}

impl TryFrom<u8> for OutputBits {
    type Error = UnknownCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(OutputBits::Eight),
            16 => Ok(OutputBits::Sixteen),
            other => Err(UnknownCode {
                table: "output bits",
                code: other as i32,
            }),
        }
    }
}

impl From<OutputBits> for u8 {
    fn from(value: OutputBits) -> Self {
        value.bits() as u8
    }
}

/// Two-parameter gamma curve: inverse power and toe slope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gamma {
    pub power: f64,
    pub slope: f64,
}

impl Default for Gamma {
    /// sRGB-like curve.
    fn default() -> Self {
        Self {
            power: 1.0 / 2.4,
            slope: 12.92,
        }
    }
}

/// Parameters consumed by `dcraw_process`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingParams {
    pub output_color: ColorSpace,
    pub output_bps: OutputBits,
    pub gamma: Gamma,
    /// Manual white balance multipliers (R, G1, B, G2).
    pub user_mul: Option<[f32; 4]>,
    pub use_camera_wb: bool,
    pub use_auto_wb: bool,
    pub half_size: bool,
    pub no_auto_bright: bool,
    pub quality: DemosaicQuality,
    pub highlight: HighlightMode,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            output_color: ColorSpace::Srgb,
            output_bps: OutputBits::Sixteen,
            gamma: Gamma::default(),
            user_mul: None,
            use_camera_wb: true,
            use_auto_wb: false,
            half_size: false,
            no_auto_bright: true,
            quality: DemosaicQuality::Ahd,
            highlight: HighlightMode::Clip,
        }
    }
}

impl ProcessingParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to manual white balance. Camera and auto white balance are
    /// turned off, as the multipliers would otherwise be overridden.
    pub fn set_user_multipliers(&mut self, multipliers: [f32; 4]) {
        self.user_mul = Some(multipliers);
        self.use_camera_wb = false;
        self.use_auto_wb = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_color_space_codes() {
        assert_eq!(ColorSpace::Raw.code(), 0);
        assert_eq!(ColorSpace::Rec2020.code(), 8);
        assert_eq!(ColorSpace::DciP3.name(), "DCIP3");
        assert_eq!(ColorSpace::ALL.len(), 9);
    }

    #[test]
    fn test_quality_codes_skip_unused_values() {
        assert_eq!(DemosaicQuality::Dht.code(), 11);
        assert_eq!(DemosaicQuality::Aahd.code(), 12);
        assert!(DemosaicQuality::try_from(5).is_err());
        assert_eq!(DemosaicQuality::ALL.len(), 7);
    }

    #[test]
    fn test_highlight_rebuild_levels() {
        let rebuild: Vec<i32> = HighlightMode::ALL
            .iter()
            .filter(|m| m.name().starts_with("REBUILD"))
            .map(|m| m.code())
            .collect();
        assert_eq!(rebuild, vec![3, 5, 7, 9]);
    }

    #[test]
    fn test_unknown_code_error() {
        let err = HighlightMode::try_from(4).unwrap_err();
        assert_eq!(err.to_string(), "unknown highlight mode code: 4");
    }

    #[test]
    fn test_output_bits() {
        assert_eq!(OutputBits::try_from(8), Ok(OutputBits::Eight));
        assert_eq!(OutputBits::try_from(16), Ok(OutputBits::Sixteen));
        assert!(OutputBits::try_from(12).is_err());
        assert_eq!(u8::from(OutputBits::Eight), 8);
    }

    #[test]
    fn test_default_params_match_native_constructor() {
        let params = ProcessingParams::default();
        assert_eq!(params.output_bps, OutputBits::Sixteen);
        assert_eq!(params.output_color, ColorSpace::Srgb);
        assert!(params.use_camera_wb);
        assert!(params.no_auto_bright);
        assert!(!params.half_size);
        assert!((params.gamma.power - 1.0 / 2.4).abs() < 1e-12);
        assert!((params.gamma.slope - 12.92).abs() < 1e-12);
    }

    #[test]
    fn test_user_multipliers_disable_other_wb() {
        let mut params = ProcessingParams::default();
        params.use_auto_wb = true;
        params.set_user_multipliers([2.0, 1.0, 1.5, 1.0]);
        assert_eq!(params.user_mul, Some([2.0, 1.0, 1.5, 1.0]));
        assert!(!params.use_camera_wb);
        assert!(!params.use_auto_wb);
    }

    proptest! {
        #[test]
        fn prop_color_space_try_from_agrees_with_code(code in -5i32..20) {
            match ColorSpace::try_from(code) {
                Ok(space) => prop_assert_eq!(space.code(), code),
                Err(e) => prop_assert_eq!(e.code, code),
            }
        }
    }
}
