//! Minimal uncompressed Bayer DNG writer for engine tests.
//!
//! The file is a single little-endian IFD: 16-bit RGGB samples in one strip,
//! plus the DNG tags LibRaw needs to identify and colour-correct it.

pub(crate) const MAKE: &str = "Rawbridge";
pub(crate) const MODEL: &str = "Synthetic DNG";
pub(crate) const DATE_TIME: &str = "2021:07:04 12:30:15";
pub(crate) const BLACK_LEVEL: u32 = 64;
pub(crate) const WHITE_LEVEL: u32 = 4095;
/// Neutral of `[0.5, 1.0, 0.667]`, so camera multipliers come out as
/// `R/G = 2.0` and `B/G = 1.5`.
pub(crate) const AS_SHOT_NEUTRAL: [(u32, u32); 3] = [(1, 2), (1, 1), (2, 3)];

const COLOR_MATRIX: [(i32, i32); 9] = [
    (7000, 10000),
    (-1000, 10000),
    (-500, 10000),
    (-3000, 10000),
    (11000, 10000),
    (2000, 10000),
    (-500, 10000),
    (1500, 10000),
    (6000, 10000),
];

const BYTE: u16 = 1;
const ASCII: u16 = 2;
const SHORT: u16 = 3;
const LONG: u16 = 4;
const RATIONAL: u16 = 5;
const SRATIONAL: u16 = 10;

const STRIP_OFFSETS: u16 = 273;

struct Entry {
    tag: u16,
    typ: u16,
    count: u32,
    payload: Vec<u8>,
}

fn shorts(tag: u16, values: &[u16]) -> Entry {
    Entry {
        tag,
        typ: SHORT,
        count: values.len() as u32,
        payload: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}

fn longs(tag: u16, values: &[u32]) -> Entry {
    Entry {
        tag,
        typ: LONG,
        count: values.len() as u32,
        payload: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}

fn bytes(tag: u16, values: &[u8]) -> Entry {
    Entry {
        tag,
        typ: BYTE,
        count: values.len() as u32,
        payload: values.to_vec(),
    }
}

fn ascii(tag: u16, text: &str) -> Entry {
    let mut payload = text.as_bytes().to_vec();
    payload.push(0);
    Entry {
        tag,
        typ: ASCII,
        count: payload.len() as u32,
        payload,
    }
}

fn rationals(tag: u16, values: &[(u32, u32)]) -> Entry {
    Entry {
        tag,
        typ: RATIONAL,
        count: values.len() as u32,
        payload: values
            .iter()
            .flat_map(|(n, d)| n.to_le_bytes().into_iter().chain(d.to_le_bytes()))
            .collect(),
    }
}

fn srationals(tag: u16, values: &[(i32, i32)]) -> Entry {
    Entry {
        tag,
        typ: SRATIONAL,
        count: values.len() as u32,
        payload: values
            .iter()
            .flat_map(|(n, d)| n.to_le_bytes().into_iter().chain(d.to_le_bytes()))
            .collect(),
    }
}

/// RGGB mosaic with a gentle gradient on the red and blue sites.
fn mosaic(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 2) as usize);
    for y in 0..height {
        for x in 0..width {
            let value: u16 = match (y % 2, x % 2) {
                (0, 0) => 900 + (x * 8) as u16,
                (1, 1) => 1100 + (y * 8) as u16,
                _ => 1600,
            };
            pixels.extend_from_slice(&value.to_le_bytes());
        }
    }
    pixels
}

/// Build a `width` x `height` DNG. LibRaw rejects anything under 22x22.
pub(crate) fn synthetic_dng(width: u32, height: u32) -> Vec<u8> {
    let pixels = mosaic(width, height);
    let mut entries = vec![
        longs(254, &[0]),
        longs(256, &[width]),
        longs(257, &[height]),
        shorts(258, &[16]),
        shorts(259, &[1]),
        shorts(262, &[32803]),
        ascii(271, MAKE),
        ascii(272, MODEL),
        longs(STRIP_OFFSETS, &[0]),
        shorts(274, &[1]),
        shorts(277, &[1]),
        longs(278, &[height]),
        longs(279, &[pixels.len() as u32]),
        shorts(284, &[1]),
        ascii(306, DATE_TIME),
        shorts(33421, &[2, 2]),
        bytes(33422, &[0, 1, 1, 2]),
        bytes(50706, &[1, 4, 0, 0]),
        bytes(50707, &[1, 1, 0, 0]),
        ascii(50708, "Rawbridge Synthetic DNG"),
        longs(50714, &[BLACK_LEVEL]),
        longs(50717, &[WHITE_LEVEL]),
        srationals(50721, &COLOR_MATRIX),
        rationals(50728, &AS_SHOT_NEUTRAL),
        shorts(50778, &[21]),
    ];

    // Out-of-line payloads follow the IFD, each padded to an even length.
    let table_end = 8 + 2 + 12 * entries.len() + 4;
    let extra: usize = entries
        .iter()
        .filter(|e| e.payload.len() > 4)
        .map(|e| e.payload.len() + e.payload.len() % 2)
        .sum();
    let pixel_offset = (table_end + extra) as u32;
    if let Some(strip) = entries.iter_mut().find(|e| e.tag == STRIP_OFFSETS) {
        strip.payload = pixel_offset.to_le_bytes().to_vec();
    }

    let mut out = b"II".to_vec();
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    let mut data = Vec::with_capacity(extra);
    for e in &entries {
        out.extend_from_slice(&e.tag.to_le_bytes());
        out.extend_from_slice(&e.typ.to_le_bytes());
        out.extend_from_slice(&e.count.to_le_bytes());
        if e.payload.len() <= 4 {
            let mut inline = e.payload.clone();
            inline.resize(4, 0);
            out.extend_from_slice(&inline);
        } else {
            out.extend_from_slice(&((table_end + data.len()) as u32).to_le_bytes());
            data.extend_from_slice(&e.payload);
            if data.len() % 2 == 1 {
                data.push(0);
            }
        }
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&pixels);
    out
}

#[test]
fn test_layout_points_strip_at_pixels() {
    let dng = synthetic_dng(24, 24);
    assert_eq!(&dng[..4], b"II*\0");
    assert_eq!(dng.len() % 2, 0);
    let pixel_bytes = 24 * 24 * 2;
    let first = u16::from_le_bytes([dng[dng.len() - pixel_bytes], dng[dng.len() - pixel_bytes + 1]]);
    assert_eq!(first, 900);
}
