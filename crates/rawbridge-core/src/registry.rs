//! Module-level queries that need no processor instance.

use std::ffi::CStr;
use std::sync::LazyLock;

use rsraw_sys as sys;
use serde::{Deserialize, Serialize};

use crate::params::{ColorSpace, DemosaicQuality, HighlightMode};

/// Library version, as a display string and a packed number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    /// `major << 16 | minor << 8 | patch`
    pub version_number: u32,
}

/// LibRaw's supported model list, in "Make Model" form.
static CAMERAS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    // SAFETY: both calls read static tables; the list holds `count`
    // pointers to NUL-terminated strings that live for the whole program.
    let (list, count) = unsafe { (sys::libraw_cameraList(), sys::libraw_cameraCount()) };
    if list.is_null() {
        return Vec::new();
    }
    (0..count.max(0) as usize)
        .map(|i| unsafe { *list.add(i) })
        .take_while(|name| !name.is_null())
        .filter_map(|name| unsafe { CStr::from_ptr(name) }.to_str().ok())
        .collect()
});

/// Version of the linked LibRaw.
pub fn version() -> VersionInfo {
    // SAFETY: LibRaw returns a static NUL-terminated string.
    let text = unsafe { CStr::from_ptr(sys::libraw_version()) };
    VersionInfo {
        version: text.to_string_lossy().into_owned(),
        version_number: unsafe { sys::libraw_versionNumber() } as u32,
    }
}

pub fn camera_list() -> &'static [&'static str] {
    CAMERAS.as_slice()
}

pub fn camera_count() -> usize {
    CAMERAS.len()
}

/// Exact, case-sensitive lookup in [`camera_list`].
pub fn is_supported_camera(name: &str) -> bool {
    CAMERAS.iter().any(|c| *c == name)
}

/// One host-visible constant table: `(name, code)` pairs in code order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstantTable {
    pub name: &'static str,
    pub entries: Vec<(&'static str, i32)>,
}

/// The color space, demosaic quality and highlight mode tables.
pub fn constant_tables() -> Vec<ConstantTable> {
    vec![
        ConstantTable {
            name: "ColorSpace",
            entries: ColorSpace::ALL.iter().map(|v| (v.name(), v.code())).collect(),
        },
        ConstantTable {
            name: "DemosaicQuality",
            entries: DemosaicQuality::ALL
                .iter()
                .map(|v| (v.name(), v.code()))
                .collect(),
        },
        ConstantTable {
            name: "HighlightMode",
            entries: HighlightMode::ALL
                .iter()
                .map(|v| (v.name(), v.code()))
                .collect(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_matches_number() {
        let info = version();
        let n = info.version_number;
        let dotted = format!("{}.{}.{}", n >> 16, (n >> 8) & 0xFF, n & 0xFF);
        assert!(info.version.starts_with(&dotted), "{} vs {}", info.version, dotted);
        assert!(n >= 0x0014_00, "LibRaw {} is too old", info.version);
    }

    #[test]
    fn test_camera_membership() {
        assert!(camera_count() > 100);
        assert_eq!(camera_count(), camera_list().len());
        assert!(!is_supported_camera("NonexistentModel9999"));
        assert!(is_supported_camera(camera_list()[0]));
        assert!(camera_list().iter().any(|c| c.starts_with("Canon ")));
    }

    #[test]
    fn test_camera_membership_is_case_sensitive() {
        let mixed = camera_list()
            .iter()
            .find(|c| c.to_uppercase() != **c)
            .unwrap();
        assert!(!is_supported_camera(&mixed.to_uppercase()));
        assert!(!is_supported_camera(&format!("{} ", mixed)));
    }

    #[test]
    fn test_constant_tables() {
        let tables = constant_tables();
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[0].entries[1], ("SRGB", 1));
        assert_eq!(tables[1].entries.last(), Some(&("AAHD", 12)));
        assert_eq!(tables[2].entries[0], ("CLIP", 0));
    }
}
